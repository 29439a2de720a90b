//! Template formatting: the `cellXfs` style table from `xl/styles.xml` and, per
//! worksheet, cell style ids, column widths, row heights and merged ranges.
//!
//! calamine reads values only, so an `.xlsx` template is opened a second time
//! as a ZIP archive to recover how it looks.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatUnderline};
use zip::ZipArchive;

use dsr_report::cellmap::parse_cell_address;

// =============================================================================
// Public types
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum NumFormat {
    #[default]
    General,
    /// Excel built-in format id (1..=163).
    Builtin(u8),
    Custom(String),
}

/// One resolved `<xf>` entry of `cellXfs`. Colors are `0xRRGGBB`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_size: Option<f64>,
    pub font_name: Option<String>,
    pub font_color: Option<u32>,
    pub fill_color: Option<u32>,
    pub num_format: NumFormat,
    pub h_align: Option<String>,
    pub v_align: Option<String>,
    pub wrap: bool,
    /// Border style names (`thin`, `medium`, ...) for top, right, bottom, left.
    pub borders: [Option<String>; 4],
}

impl CellStyle {
    pub fn to_format(&self) -> Format {
        let mut format = Format::new();

        if self.bold {
            format = format.set_bold();
        }
        if self.italic {
            format = format.set_italic();
        }
        if self.underline {
            format = format.set_underline(FormatUnderline::Single);
        }
        if self.strikethrough {
            format = format.set_font_strikethrough();
        }
        if let Some(size) = self.font_size {
            format = format.set_font_size(size);
        }
        if let Some(ref name) = self.font_name {
            format = format.set_font_name(name);
        }
        if let Some(rgb) = self.font_color {
            format = format.set_font_color(Color::RGB(rgb));
        }
        if let Some(rgb) = self.fill_color {
            format = format.set_background_color(Color::RGB(rgb));
        }

        format = match self.num_format {
            NumFormat::General => format,
            NumFormat::Builtin(id) => format.set_num_format_index(id),
            NumFormat::Custom(ref code) => format.set_num_format(code),
        };

        if let Some(align) = self.h_align.as_deref().and_then(horizontal_align) {
            format = format.set_align(align);
        }
        if let Some(align) = self.v_align.as_deref().and_then(vertical_align) {
            format = format.set_align(align);
        }
        if self.wrap {
            format = format.set_text_wrap();
        }

        let [top, right, bottom, left] = &self.borders;
        if let Some(border) = top.as_deref().and_then(border_kind) {
            format = format.set_border_top(border);
        }
        if let Some(border) = right.as_deref().and_then(border_kind) {
            format = format.set_border_right(border);
        }
        if let Some(border) = bottom.as_deref().and_then(border_kind) {
            format = format.set_border_bottom(border);
        }
        if let Some(border) = left.as_deref().and_then(border_kind) {
            format = format.set_border_left(border);
        }

        format
    }
}

/// A merged range, 0-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl MergeRange {
    /// Parse `D1:I1`.
    pub fn parse(reference: &str) -> Option<Self> {
        let (first, last) = reference.split_once(':')?;
        let (first_row, first_col) = parse_cell_address(first)?;
        let (last_row, last_col) = parse_cell_address(last)?;
        Some(Self {
            first_row: first_row - 1,
            first_col: first_col - 1,
            last_row: last_row - 1,
            last_col: last_col - 1,
        })
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

/// Layout of one worksheet. Positions are 0-based (row, col).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    /// Index into [`TemplateStyles::styles`]; style 0 (the default) is not stored.
    pub cell_styles: BTreeMap<(u32, u16), usize>,
    /// Widths in Excel character units, as shown in Excel's column width dialog.
    pub col_widths: BTreeMap<u16, f64>,
    /// Heights in points.
    pub row_heights: BTreeMap<u32, f64>,
    pub merges: Vec<MergeRange>,
}

/// Formatting of a whole template workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateStyles {
    pub styles: Vec<CellStyle>,
    /// One layout per sheet, in the order the sheet names were given.
    pub sheets: Vec<SheetLayout>,
}

/// Read the formatting of an `.xlsx` template.
///
/// `sheet_names` must be in workbook order; sheets whose XML cannot be found get an
/// empty layout.
pub fn read_template_styles(path: &Path, sheet_names: &[String]) -> Result<TemplateStyles, String> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Failed to open '{}' for formatting: {}", path.display(), e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| format!("'{}' is not an xlsx package: {}", path.display(), e))?;

    let styles = match read_zip_file(&mut archive, "xl/styles.xml") {
        Ok(xml) => parse_styles_xml(&xml),
        Err(e) => {
            log::debug!("{}", e);
            Vec::new()
        }
    };

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let parts = worksheet_parts(&workbook_xml, &rels_xml);

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let layout = match parts.get(name) {
            Some(part) => match read_zip_file(&mut archive, part) {
                Ok(xml) => parse_sheet_layout(&xml),
                Err(e) => {
                    log::debug!("sheet '{}': {}", name, e);
                    SheetLayout::default()
                }
            },
            None => SheetLayout::default(),
        };
        sheets.push(layout);
    }

    Ok(TemplateStyles { styles, sheets })
}

// =============================================================================
// styles.xml
// =============================================================================

#[derive(Debug, Clone, Default)]
struct FontEntry {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    size: Option<f64>,
    name: Option<String>,
    color: Option<u32>,
}

#[derive(Debug, Clone, Default)]
struct XfEntry {
    num_fmt_id: u16,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    h_align: Option<String>,
    v_align: Option<String>,
    wrap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
    /// `cellStyleXfs`, `dxfs` and anything else holding look-alike children.
    Skipped,
}

/// Sequential reader over styles.xml. Container elements (`font`, `fill`,
/// `border`, `xf`) are committed on their end tag.
#[derive(Default)]
struct StyleParser {
    section: Option<Section>,
    num_fmts: HashMap<u16, String>,
    fonts: Vec<FontEntry>,
    font: FontEntry,
    fills: Vec<Option<u32>>,
    fill: Option<u32>,
    solid_pattern: bool,
    borders: Vec<[Option<String>; 4]>,
    border: [Option<String>; 4],
    xfs: Vec<XfEntry>,
    xf: XfEntry,
}

impl StyleParser {
    fn section(&self) -> Section {
        self.section.unwrap_or(Section::Outside)
    }

    fn open(&mut self, e: &BytesStart) {
        let name = e.local_name();
        let name = name.as_ref();

        if self.section() == Section::Outside {
            self.section = Some(match name {
                b"numFmts" => Section::NumFmts,
                b"fonts" => Section::Fonts,
                b"fills" => Section::Fills,
                b"borders" => Section::Borders,
                b"cellXfs" => Section::CellXfs,
                b"cellStyleXfs" | b"dxfs" | b"tableStyles" | b"colors" | b"extLst" => Section::Skipped,
                _ => Section::Outside,
            });
            return;
        }

        match (self.section(), name) {
            (Section::NumFmts, b"numFmt") => {
                if let (Some(id), Some(code)) = (attr_parse(e, b"numFmtId"), attr(e, b"formatCode")) {
                    self.num_fmts.insert(id, code);
                }
            }

            (Section::Fonts, b"font") => self.font = FontEntry::default(),
            (Section::Fonts, b"b") => self.font.bold = flag_on(e),
            (Section::Fonts, b"i") => self.font.italic = flag_on(e),
            (Section::Fonts, b"strike") => self.font.strikethrough = flag_on(e),
            (Section::Fonts, b"u") => {
                self.font.underline = attr(e, b"val").map_or(true, |v| v != "none");
            }
            (Section::Fonts, b"sz") => self.font.size = attr_parse(e, b"val"),
            (Section::Fonts, b"name") => self.font.name = attr(e, b"val"),
            (Section::Fonts, b"color") => self.font.color = parse_color(e),

            (Section::Fills, b"fill") => {
                self.fill = None;
                self.solid_pattern = false;
            }
            (Section::Fills, b"patternFill") => {
                self.solid_pattern = attr(e, b"patternType").as_deref() == Some("solid");
            }
            (Section::Fills, b"fgColor") if self.solid_pattern => self.fill = parse_color(e),

            (Section::Borders, b"border") => self.border = Default::default(),
            (Section::Borders, side @ (b"top" | b"right" | b"bottom" | b"left")) => {
                let slot = match side {
                    b"top" => 0,
                    b"right" => 1,
                    b"bottom" => 2,
                    _ => 3,
                };
                self.border[slot] = attr(e, b"style").filter(|s| s != "none");
            }

            (Section::CellXfs, b"xf") => {
                self.xf = XfEntry {
                    num_fmt_id: attr_parse(e, b"numFmtId").unwrap_or(0),
                    font_id: attr_parse(e, b"fontId").unwrap_or(0),
                    fill_id: attr_parse(e, b"fillId").unwrap_or(0),
                    border_id: attr_parse(e, b"borderId").unwrap_or(0),
                    ..XfEntry::default()
                };
            }
            (Section::CellXfs, b"alignment") => {
                self.xf.h_align = attr(e, b"horizontal");
                self.xf.v_align = attr(e, b"vertical");
                self.xf.wrap = attr(e, b"wrapText").is_some_and(|v| v == "1" || v == "true");
            }

            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match (self.section(), name) {
            (Section::Fonts, b"font") => self.fonts.push(std::mem::take(&mut self.font)),
            (Section::Fills, b"fill") => self.fills.push(self.fill.take()),
            (Section::Fills, b"patternFill") => self.solid_pattern = false,
            (Section::Borders, b"border") => self.borders.push(std::mem::take(&mut self.border)),
            (Section::CellXfs, b"xf") => self.xfs.push(std::mem::take(&mut self.xf)),
            (
                section,
                b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs" | b"cellStyleXfs" | b"dxfs"
                | b"tableStyles" | b"colors" | b"extLst",
            ) if section != Section::Outside => self.section = None,
            _ => {}
        }
    }

    fn resolve(self) -> Vec<CellStyle> {
        self.xfs
            .iter()
            .map(|xf| {
                let font = self.fonts.get(xf.font_id).cloned().unwrap_or_default();
                let num_format = match self.num_fmts.get(&xf.num_fmt_id) {
                    Some(code) => NumFormat::Custom(code.clone()),
                    None => match u8::try_from(xf.num_fmt_id) {
                        Ok(0) | Err(_) => NumFormat::General,
                        Ok(id) if id < 164 => NumFormat::Builtin(id),
                        Ok(_) => NumFormat::General,
                    },
                };
                CellStyle {
                    bold: font.bold,
                    italic: font.italic,
                    underline: font.underline,
                    strikethrough: font.strikethrough,
                    font_size: font.size,
                    font_name: font.name,
                    font_color: font.color,
                    fill_color: self.fills.get(xf.fill_id).copied().flatten(),
                    num_format,
                    h_align: xf.h_align.clone(),
                    v_align: xf.v_align.clone(),
                    wrap: xf.wrap,
                    borders: self.borders.get(xf.border_id).cloned().unwrap_or_default(),
                }
            })
            .collect()
    }
}

/// Parse styles.xml into the `cellXfs` table; cell `s="N"` attributes index into it.
fn parse_styles_xml(xml: &str) -> Vec<CellStyle> {
    let mut parser = StyleParser::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => parser.open(e),
            Ok(Event::Empty(ref e)) => {
                parser.open(e);
                parser.close(e.local_name().as_ref());
            }
            Ok(Event::End(ref e)) => parser.close(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("styles.xml: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    parser.resolve()
}

// =============================================================================
// Worksheet XML
// =============================================================================

/// Cell styles, custom column widths and row heights, and merged ranges of one sheet.
fn parse_sheet_layout(xml: &str) -> SheetLayout {
    let mut layout = SheetLayout::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    let custom = attr(e, b"customHeight").is_some_and(|v| v == "1" || v == "true");
                    if let (true, Some(row), Some(height)) =
                        (custom, attr_parse::<u32>(e, b"r"), attr_parse::<f64>(e, b"ht"))
                    {
                        if row > 0 {
                            layout.row_heights.insert(row - 1, height);
                        }
                    }
                }
                b"c" => {
                    let style = attr_parse::<usize>(e, b"s").unwrap_or(0);
                    if style > 0 {
                        if let Some((row, col)) = attr(e, b"r").as_deref().and_then(parse_cell_address) {
                            layout.cell_styles.insert((row - 1, col - 1), style);
                        }
                    }
                }
                b"col" => {
                    let custom = attr(e, b"customWidth").is_some_and(|v| v == "1" || v == "true");
                    if let (true, Some(min), Some(max), Some(width)) = (
                        custom,
                        attr_parse::<u16>(e, b"min"),
                        attr_parse::<u16>(e, b"max"),
                        attr_parse::<f64>(e, b"width"),
                    ) {
                        for col in min.max(1)..=max {
                            layout.col_widths.insert(col - 1, character_width(width));
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attr(e, b"ref").as_deref().and_then(MergeRange::parse) {
                        layout.merges.push(range);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("worksheet xml: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    layout
}

/// `<col width>` includes 5 pixels of cell padding (at 7 pixels per character)
/// that `set_column_width` adds back.
fn character_width(stored: f64) -> f64 {
    (stored - 5.0 / 7.0).max(0.0)
}

/// Sheet name → ZIP part, via workbook.xml and its relationships.
fn worksheet_parts(workbook_xml: &str, rels_xml: &str) -> HashMap<String, String> {
    let mut targets: HashMap<String, String> = HashMap::new();
    for_each_element(rels_xml, b"Relationship", |e| {
        if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
            let part = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{}", target),
            };
            targets.insert(id, part);
        }
    });

    let mut parts = HashMap::new();
    for_each_element(workbook_xml, b"sheet", |e| {
        // `r:id`; the namespace prefix varies between writers
        let rel_id = e
            .attributes()
            .flatten()
            .find(|a| a.key.local_name().as_ref() == b"id")
            .map(|a| String::from_utf8_lossy(&a.value).into_owned());
        if let (Some(name), Some(part)) = (attr(e, b"name"), rel_id.and_then(|id| targets.get(&id))) {
            parts.insert(name, part.clone());
        }
    });
    parts
}

// =============================================================================
// Helpers
// =============================================================================

fn for_each_element(xml: &str, element: &[u8], mut f: impl FnMut(&BytesStart)) {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.local_name().as_ref() == element => f(e),
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
}

/// Raw attribute value with the predefined XML entities unescaped.
fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape_xml(&String::from_utf8_lossy(&a.value)))
}

fn attr_parse<T: std::str::FromStr>(e: &BytesStart, key: &[u8]) -> Option<T> {
    attr(e, key).and_then(|v| v.trim().parse().ok())
}

/// `<b/>` is on, `<b val="0"/>` is off.
fn flag_on(e: &BytesStart) -> bool {
    attr(e, b"val").map_or(true, |v| v != "0" && v != "false")
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// `rgb="FFRRGGBB"`, `indexed="N"` or `theme="N"` (untinted Office theme).
fn parse_color(e: &BytesStart) -> Option<u32> {
    if let Some(argb) = attr(e, b"rgb") {
        let hex = argb.trim_start_matches('#');
        let rgb = if hex.len() == 8 { hex.get(2..)? } else { hex };
        if rgb.len() != 6 {
            return None;
        }
        return u32::from_str_radix(rgb, 16).ok();
    }
    if let Some(idx) = attr_parse::<usize>(e, b"indexed") {
        return INDEXED_COLORS.get(idx).copied();
    }
    if let Some(idx) = attr_parse::<usize>(e, b"theme") {
        return THEME_COLORS.get(idx).copied();
    }
    None
}

/// Excel's default indexed palette (64 entries).
const INDEXED_COLORS: [u32; 64] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF, // 0-7
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF, // 8-15
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080, // 16-23
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF, // 24-31
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF, // 32-39
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99, // 40-47
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696, // 48-55
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333, // 56-63
];

/// Office theme: lt1, dk1, lt2, dk2, accent1-6.
const THEME_COLORS: [u32; 10] = [
    0xFFFFFF, 0x000000, 0xEEECE1, 0x1F497D, 0x4F81BD, 0xC0504D, 0x9BBB59, 0x8064A2, 0x4BACC6, 0xF79646,
];

fn horizontal_align(value: &str) -> Option<FormatAlign> {
    match value {
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "centerContinuous" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        _ => None,
    }
}

fn vertical_align(value: &str) -> Option<FormatAlign> {
    match value {
        "top" => Some(FormatAlign::Top),
        "center" => Some(FormatAlign::VerticalCenter),
        "bottom" => Some(FormatAlign::Bottom),
        "justify" => Some(FormatAlign::VerticalJustify),
        "distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn border_kind(style: &str) -> Option<FormatBorder> {
    match style {
        "thin" => Some(FormatBorder::Thin),
        "medium" => Some(FormatBorder::Medium),
        "thick" => Some(FormatBorder::Thick),
        "dashed" => Some(FormatBorder::Dashed),
        "dotted" => Some(FormatBorder::Dotted),
        "double" => Some(FormatBorder::Double),
        "hair" => Some(FormatBorder::Hair),
        "mediumDashed" => Some(FormatBorder::MediumDashed),
        "dashDot" => Some(FormatBorder::DashDot),
        "mediumDashDot" => Some(FormatBorder::MediumDashDot),
        "dashDotDot" => Some(FormatBorder::DashDotDot),
        "mediumDashDotDot" => Some(FormatBorder::MediumDashDotDot),
        "slantDashDot" => Some(FormatBorder::SlantDashDot),
        _ => None,
    }
}

fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("'{}' not found in xlsx: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}
