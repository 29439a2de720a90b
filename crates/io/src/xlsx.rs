// Excel import (POS exports, report templates) and report workbook export

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet, XlsxError};

use dsr_report::cellmap::cell_address;
use dsr_report::model::{CellValue, PlacedCell, RawRow, RawTable};

use crate::xlsx_styles::{read_template_styles, CellStyle, SheetLayout};

/// Sheet name of the blueprint used when no template is given.
pub const BLANK_SHEET_NAME: &str = "Report";

/// A template cell as read from the source workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateCell {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Formula source without the leading `=`.
    Formula(String),
}

/// One worksheet of a blueprint. Positions are 0-based (row, col).
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSheet {
    pub name: String,
    pub cells: BTreeMap<(u32, u16), TemplateCell>,
    pub layout: SheetLayout,
}

impl TemplateSheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
            layout: SheetLayout::default(),
        }
    }

    /// Write a placed (1-based) cell over whatever the template holds there.
    pub fn place(&mut self, cell: &PlacedCell) -> Result<(), String> {
        let (row, col) = match (cell.row.checked_sub(1), cell.col.checked_sub(1)) {
            (Some(row), Some(col)) => (row, col),
            _ => {
                return Err(format!(
                    "cell ({}, {}) is outside the sheet; positions are 1-based",
                    cell.row, cell.col
                ))
            }
        };
        let value = match &cell.value {
            CellValue::Number(n) => TemplateCell::Number(*n),
            CellValue::Text(s) => TemplateCell::Text(s.clone()),
        };
        self.cells.insert((row, col), value);
        Ok(())
    }
}

/// Immutable copy of a template workbook: values, formulas and formatting of every sheet.
///
/// Loaded once per run; each branch renders into its own clone of the sheets.
/// Formatting (cell styles, column widths, row heights, merges) is only read
/// from `.xlsx`/`.xlsm` templates.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateBlueprint {
    sheets: Vec<TemplateSheet>,
    /// Style table shared by all sheets; `SheetLayout::cell_styles` indexes into it.
    styles: Vec<CellStyle>,
}

impl TemplateBlueprint {
    /// A single empty sheet named `Report`.
    pub fn blank() -> Self {
        Self {
            sheets: vec![TemplateSheet::new(BLANK_SHEET_NAME)],
            styles: Vec::new(),
        }
    }

    /// Read every sheet of an Excel file (xlsx, xls, xlsb, ods).
    pub fn load(path: &Path) -> Result<Self, String> {
        let mut workbook: Sheets<_> = open_workbook_auto(path)
            .map_err(|e| format!("Failed to open template '{}': {}", path.display(), e))?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(format!("Template '{}' contains no sheets", path.display()));
        }

        let mut sheets = Vec::with_capacity(sheet_names.len());
        for sheet_name in &sheet_names {
            let mut sheet = TemplateSheet::new(sheet_name);

            let range = workbook
                .worksheet_range(sheet_name)
                .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;
            // Range start offset (data may not begin at A1)
            let (start_row, start_col) = range.start().unwrap_or((0, 0));
            for (row_idx, col_idx, data) in range.used_cells() {
                let row = start_row + row_idx as u32;
                let col = to_col(start_col + col_idx as u32)?;
                if let Some(cell) = template_cell(data) {
                    sheet.cells.insert((row, col), cell);
                }
            }

            // Formulas replace their cached values
            if let Ok(formula_range) = workbook.worksheet_formula(sheet_name) {
                let (start_row, start_col) = formula_range.start().unwrap_or((0, 0));
                for (row_idx, col_idx, formula) in formula_range.used_cells() {
                    if formula.is_empty() {
                        continue;
                    }
                    let row = start_row + row_idx as u32;
                    let col = to_col(start_col + col_idx as u32)?;
                    let source = formula.strip_prefix('=').unwrap_or(formula);
                    sheet.cells.insert((row, col), TemplateCell::Formula(source.to_string()));
                }
            }

            log::debug!("template sheet '{}': {} cells", sheet.name, sheet.cells.len());
            sheets.push(sheet);
        }

        let mut blueprint = Self { sheets, styles: Vec::new() };
        if has_xml_package(path) {
            match read_template_styles(path, &sheet_names) {
                Ok(formatting) => {
                    for (sheet, layout) in blueprint.sheets.iter_mut().zip(formatting.sheets) {
                        sheet.layout = layout;
                    }
                    blueprint.styles = formatting.styles;
                }
                Err(e) => log::warn!("{}; template formatting is not kept", e),
            }
        } else {
            log::debug!("'{}' is not an xlsx package; template formatting is not kept", path.display());
        }

        Ok(blueprint)
    }

    pub fn sheets(&self) -> &[TemplateSheet] {
        &self.sheets
    }

    /// Index of the named sheet, or of the first sheet when no name is given.
    pub fn sheet_index(&self, name: Option<&str>) -> Result<usize, String> {
        match name {
            None => Ok(0),
            Some(name) => self.sheets.iter().position(|s| s.name == name).ok_or_else(|| {
                let available: Vec<&str> = self.sheets.iter().map(|s| s.name.as_str()).collect();
                format!("sheet '{}' not found (available: {})", name, available.join(", "))
            }),
        }
    }

    /// Write `cells` into a fresh copy of sheet `target` and save the whole workbook to `path`.
    ///
    /// Returns the number of cells written.
    pub fn render(&self, target: usize, cells: &[PlacedCell], path: &Path) -> Result<usize, String> {
        let mut sheets = self.sheets.clone();
        let sheet = sheets
            .get_mut(target)
            .ok_or_else(|| format!("sheet index {} out of range", target))?;
        for cell in cells {
            sheet.place(cell)?;
        }
        write_workbook(&sheets, &self.styles, path)
    }
}

fn has_xml_package(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"))
}

fn to_col(col: u32) -> Result<u16, String> {
    u16::try_from(col).map_err(|_| format!("column {} exceeds the sheet width", col))
}

fn template_cell(data: &Data) -> Option<TemplateCell> {
    match data {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(TemplateCell::Text(s.clone())),
        Data::Float(n) => Some(TemplateCell::Number(*n)),
        Data::Int(n) => Some(TemplateCell::Number(*n as f64)),
        Data::Bool(b) => Some(TemplateCell::Bool(*b)),
        Data::Error(e) => Some(TemplateCell::Text(format!("#{:?}", e))),
        // Dates stay serial numbers; the cell style carries the date format
        Data::DateTime(dt) => Some(TemplateCell::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(TemplateCell::Text(s.clone())),
    }
}

fn write_workbook(sheets: &[TemplateSheet], styles: &[CellStyle], path: &Path) -> Result<usize, String> {
    let formats: Vec<Format> = styles.iter().map(CellStyle::to_format).collect();
    let mut xlsx_workbook = XlsxWorkbook::new();
    let mut written = 0;

    for sheet in sheets {
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;
        let style_at = |row: u32, col: u16| {
            sheet
                .layout
                .cell_styles
                .get(&(row, col))
                .and_then(|&idx| formats.get(idx))
        };

        apply_layout(worksheet, &sheet.layout)
            .map_err(|e| format!("Failed to lay out sheet '{}': {}", sheet.name, e))?;

        // merge_range blanks the whole range; the origin value is written below
        let plain = Format::new();
        for merge in sheet.layout.merges.iter().filter(|m| !m.is_single_cell()) {
            let format = style_at(merge.first_row, merge.first_col).unwrap_or(&plain);
            worksheet
                .merge_range(
                    merge.first_row,
                    merge.first_col,
                    merge.last_row,
                    merge.last_col,
                    "",
                    format,
                )
                .map_err(|e| {
                    format!(
                        "Failed to merge {}!{}:{}: {}",
                        sheet.name,
                        cell_address(merge.first_row + 1, merge.first_col + 1),
                        cell_address(merge.last_row + 1, merge.last_col + 1),
                        e
                    )
                })?;
        }

        for (&(row, col), cell) in &sheet.cells {
            let wrote = write_cell(worksheet, row, col, cell, style_at(row, col)).map_err(|e| {
                format!(
                    "Failed to write {}!{}: {}",
                    sheet.name,
                    cell_address(row + 1, col + 1),
                    e
                )
            })?;
            if wrote {
                written += 1;
            }
        }

        // Styled cells without a value (borders, fills of empty grid cells)
        for (&(row, col), &idx) in &sheet.layout.cell_styles {
            if sheet.cells.contains_key(&(row, col)) {
                continue;
            }
            if let Some(format) = formats.get(idx) {
                worksheet.write_blank(row, col, format).map_err(|e| {
                    format!(
                        "Failed to format {}!{}: {}",
                        sheet.name,
                        cell_address(row + 1, col + 1),
                        e
                    )
                })?;
            }
        }
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;
    Ok(written)
}

fn apply_layout(worksheet: &mut Worksheet, layout: &SheetLayout) -> Result<(), XlsxError> {
    for (&col, &width) in &layout.col_widths {
        worksheet.set_column_width(col, width)?;
    }
    for (&row, &height) in &layout.row_heights {
        worksheet.set_row_height(row, height)?;
    }
    Ok(())
}

/// Write one value, keeping its template format. Returns false when the cell holds no value.
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &TemplateCell,
    format: Option<&Format>,
) -> Result<bool, XlsxError> {
    match (cell, format) {
        (TemplateCell::Text(s), Some(format)) if s.is_empty() => {
            worksheet.write_blank(row, col, format)?;
            return Ok(false);
        }
        (TemplateCell::Text(s), None) if s.is_empty() => return Ok(false),
        (TemplateCell::Number(n), Some(format)) => worksheet.write_number_with_format(row, col, *n, format)?,
        (TemplateCell::Number(n), None) => worksheet.write_number(row, col, *n)?,
        (TemplateCell::Text(s), Some(format)) => worksheet.write_string_with_format(row, col, s, format)?,
        (TemplateCell::Text(s), None) => worksheet.write_string(row, col, s)?,
        (TemplateCell::Bool(b), Some(format)) => worksheet.write_boolean_with_format(row, col, *b, format)?,
        (TemplateCell::Bool(b), None) => worksheet.write_boolean(row, col, *b)?,
        (TemplateCell::Formula(f), Some(format)) => {
            worksheet.write_formula_with_format(row, col, f.as_str(), format)?
        }
        (TemplateCell::Formula(f), None) => worksheet.write_formula(row, col, f.as_str())?,
    };
    Ok(true)
}

// ---------------------------------------------------------------------------
// POS export input
// ---------------------------------------------------------------------------

/// Import the first sheet of an Excel export; its first row holds the headers.
///
/// Line numbers are 1-based sheet rows, so they match what a user sees in Excel.
pub fn import_table(path: &Path) -> Result<RawTable, String> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "Excel file contains no sheets".to_string())?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let (start_row, _) = range.start().unwrap_or((0, 0));
    let mut rows_iter = range.rows();

    let headers: Vec<String> = match rows_iter.next() {
        Some(header) => header.iter().map(|c| cell_text(c).trim().to_string()).collect(),
        None => return Err(format!("sheet '{}' is empty", sheet_name)),
    };

    let mut rows = Vec::new();
    for (idx, row) in rows_iter.enumerate() {
        let mut fields: Vec<String> = row.iter().map(|c| cell_text(c).trim().to_string()).collect();
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        fields.resize(headers.len(), String::new());
        rows.push(RawRow {
            // header row + 1-based
            line: start_row as usize + idx + 2,
            fields,
        });
    }

    Ok(RawTable { headers, rows })
}

fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Format nicely: integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => match serial_to_datetime(dt.as_f64()) {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("{}", dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Convert an Excel serial date (1900 system) to a timestamp.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    epoch
        .checked_add_signed(TimeDelta::try_days(days as i64)?)?
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)
}
