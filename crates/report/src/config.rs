use std::path::PathBuf;

use serde::Deserialize;

use crate::cellmap::{CellBlock, CellMap, ChannelBlock, ColumnRef};
use crate::error::ReportError;
use crate::model::GRAND_TOTAL_COLUMN;

pub const DEFAULT_PREFIX: &str = "DSR_";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Template workbook, relative to the config file when not absolute.
    #[serde(default)]
    pub template: Option<PathBuf>,
    /// Sheet of the template that receives the report. Defaults to the first sheet.
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub layout: Option<LayoutConfig>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            template: None,
            sheet: None,
            layout: None,
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    pub blocks: Vec<BlockConfig>,
    pub channels: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockConfig {
    pub row: u32,
    pub col: u16,
    #[serde(default)]
    pub header: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub row: u32,
    pub col: u16,
    #[serde(default = "default_true")]
    pub header: bool,
    #[serde(default = "default_total")]
    pub total: String,
}

fn default_true() -> bool {
    true
}

fn default_total() -> String {
    GRAND_TOTAL_COLUMN.to_string()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReportConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReportError> {
        let config: ReportConfig =
            toml::from_str(input).map_err(|e| ReportError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.prefix.contains(|c: char| c == '/' || c == '\\') {
            return Err(ReportError::ConfigValidation(format!(
                "prefix must not contain path separators, got '{}'",
                self.prefix
            )));
        }

        if let Some(ref sheet) = self.sheet {
            if sheet.trim().is_empty() {
                return Err(ReportError::ConfigValidation("sheet name is empty".into()));
            }
        }

        if let Some(ref layout) = self.layout {
            let map = self.cell_map();
            for (i, (block, config)) in map.blocks.iter().zip(&layout.blocks).enumerate() {
                if config.columns.is_empty() {
                    return Err(ReportError::ConfigValidation(format!(
                        "layout.blocks[{i}]: columns must not be empty"
                    )));
                }
                check_block(&format!("layout.blocks[{i}]"), block)?;
            }
            if layout.channels.total.trim().is_empty() {
                return Err(ReportError::ConfigValidation(
                    "layout.channels: total column is empty".into(),
                ));
            }
            // Channel columns are only known per run; the total column must fit at least
            let channels = map.with_channels(&[]);
            if let Some(block) = channels.last() {
                check_block("layout.channels", block)?;
            }
        }

        Ok(())
    }

    /// The configured layout, or the standard one.
    pub fn cell_map(&self) -> CellMap {
        match self.layout {
            Some(ref layout) => CellMap {
                blocks: layout
                    .blocks
                    .iter()
                    .map(|b| CellBlock {
                        row: b.row,
                        col: b.col,
                        header: b.header,
                        columns: b.columns.iter().map(|c| ColumnRef::named(c)).collect(),
                    })
                    .collect(),
                channels: ChannelBlock {
                    row: layout.channels.row,
                    col: layout.channels.col,
                    header: layout.channels.header,
                    total_column: layout.channels.total.clone(),
                },
            },
            None => CellMap::standard(),
        }
    }
}

/// Longest month, in data rows below a block's header.
const MAX_MONTH_DAYS: u32 = 31;

fn check_block(name: &str, block: &CellBlock) -> Result<(), ReportError> {
    block
        .check_bounds(MAX_MONTH_DAYS)
        .map_err(|msg| ReportError::ConfigValidation(format!("{name}: {msg}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
