use serde::Serialize;

use crate::error::ReportError;
use crate::model::{CellValue, PlacedCell, SaleSegment, WideRow, DATE_COLUMN, GRAND_TOTAL_COLUMN};

/// A wide-table column and the label written when its block has a header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub source: String,
    pub label: String,
}

impl ColumnRef {
    pub fn named(source: &str) -> Self {
        Self {
            source: source.to_string(),
            label: source.to_string(),
        }
    }

    pub fn labelled(source: &str, label: &str) -> Self {
        Self {
            source: source.to_string(),
            label: label.to_string(),
        }
    }
}

/// A rectangular region of the report: columns laid left to right from (row, col).
///
/// Coordinates are 1-based, so (4, 1) is `A4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellBlock {
    pub row: u32,
    pub col: u16,
    pub header: bool,
    pub columns: Vec<ColumnRef>,
}

impl CellBlock {
    /// 1-based sheet column of the column at `offset`, or `None` past the last sheet column.
    pub fn col_at(&self, offset: usize) -> Option<u16> {
        let col = u32::from(self.col).checked_add(u32::try_from(offset).ok()?)?;
        u16::try_from(col).ok().filter(|c| *c <= MAX_COL)
    }

    /// Check that the block, with `data_rows` rows below its optional header, fits on a sheet.
    pub fn check_bounds(&self, data_rows: u32) -> Result<(), String> {
        if self.row == 0 || self.col == 0 {
            return Err(format!(
                "row and col are 1-based, got ({}, {})",
                self.row, self.col
            ));
        }
        let height = u64::from(data_rows) + u64::from(self.header);
        let last_row = u64::from(self.row) + height.saturating_sub(1);
        let last_col = u64::from(self.col) + (self.columns.len() as u64).saturating_sub(1);
        if last_col > u64::from(MAX_COL) || last_row > u64::from(MAX_ROW) {
            return Err(format!(
                "block at {} needs {} columns and {} rows, past the sheet limit of {} columns and {} rows",
                cell_address(self.row, self.col),
                self.columns.len(),
                height,
                MAX_COL,
                MAX_ROW
            ));
        }
        Ok(())
    }
}

/// Where the dynamic app-channel block starts and what closes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelBlock {
    pub row: u32,
    pub col: u16,
    pub header: bool,
    pub total_column: String,
}

/// Static layout of one branch-month sheet plus the app-channel extension rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellMap {
    pub blocks: Vec<CellBlock>,
    pub channels: ChannelBlock,
}

impl Default for CellMap {
    fn default() -> Self {
        Self::standard()
    }
}

/// Last 1-based row of an xlsx sheet.
pub const MAX_ROW: u32 = 1_048_576;
/// Last 1-based column of an xlsx sheet (`XFD`).
pub const MAX_COL: u16 = 16_384;

/// Payment and measure columns of the fixed six-wide Product / Grooming blocks.
const SHOP_BLOCK_COLUMNS: [&str; 6] = ["Cash", "Card", "Credit|Note", "Loyalty Points", "TotalDiscount", "Refunds"];

impl CellMap {
    /// The daily sales report layout: dates in column A, Product from D, Grooming from L,
    /// app channels from Z with a header row above.
    pub fn standard() -> Self {
        let shop_block = |col: u16, segment: SaleSegment| CellBlock {
            row: 4,
            col,
            header: false,
            columns: SHOP_BLOCK_COLUMNS
                .iter()
                .map(|c| ColumnRef::named(&segment.column(c)))
                .collect(),
        };

        Self {
            blocks: vec![
                CellBlock {
                    row: 4,
                    col: 1,
                    header: false,
                    columns: vec![ColumnRef::named(DATE_COLUMN)],
                },
                shop_block(4, SaleSegment::Product),
                shop_block(12, SaleSegment::Grooming),
            ],
            channels: ChannelBlock {
                row: 3,
                col: 26,
                header: true,
                total_column: GRAND_TOTAL_COLUMN.to_string(),
            },
        }
    }

    /// Static blocks followed by one block holding every app channel and the trailing total.
    pub fn with_channels(&self, channels: &[String]) -> Vec<CellBlock> {
        let mut columns: Vec<ColumnRef> = channels
            .iter()
            .map(|label| ColumnRef::labelled(&SaleSegment::App.column(label), label))
            .collect();
        columns.push(ColumnRef::named(&self.channels.total_column));

        let mut blocks = self.blocks.clone();
        blocks.push(CellBlock {
            row: self.channels.row,
            col: self.channels.col,
            header: self.channels.header,
            columns,
        });
        blocks
    }
}

/// Lay `rows` out over `blocks`. Header rows come first when requested;
/// every value goes through numeric coercion.
pub fn place_cells(blocks: &[CellBlock], rows: &[WideRow]) -> Result<Vec<PlacedCell>, ReportError> {
    let mut cells = Vec::new();

    for block in blocks {
        let out_of_sheet = || {
            ReportError::ConfigValidation(format!(
                "block at {} does not fit on the sheet",
                cell_address(block.row, block.col)
            ))
        };
        let cols: Vec<u16> = (0..block.columns.len())
            .map(|offset| block.col_at(offset).ok_or_else(out_of_sheet))
            .collect::<Result<_, _>>()?;

        let mut row = block.row;
        if block.header {
            for (column, &col) in block.columns.iter().zip(&cols) {
                cells.push(PlacedCell {
                    row,
                    col,
                    value: CellValue::Text(column.label.clone()).coerce(),
                });
            }
            row = row.checked_add(1).ok_or_else(out_of_sheet)?;
        }

        for wide_row in rows {
            for (column, &col) in block.columns.iter().zip(&cols) {
                cells.push(PlacedCell {
                    row,
                    col,
                    value: wide_row.cell(&column.source).coerce(),
                });
            }
            row = row.checked_add(1).ok_or_else(out_of_sheet)?;
        }
    }

    Ok(cells)
}

/// Convert a 1-based column number to letters (1 -> A, 26 -> Z, 27 -> AA).
pub fn col_to_letter(col: u16) -> String {
    let mut result = String::new();
    let mut n = col as u32;
    while n > 0 {
        let rem = (n - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result
}

/// A1-style address of a 1-based (row, col).
pub fn cell_address(row: u32, col: u16) -> String {
    format!("{}{}", col_to_letter(col), row)
}

/// Parse an A1-style address (`$` anchors allowed) into a 1-based (row, col).
pub fn parse_cell_address(address: &str) -> Option<(u32, u16)> {
    let address = address.replace('$', "");
    let split = address.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = address.split_at(split);
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > MAX_ROW || col > MAX_COL as u32 {
        return None;
    }
    Some((row, col as u16))
}
