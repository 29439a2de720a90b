use crate::aggregate::aggregate_lines;
use crate::cellmap::{place_cells, CellBlock, CellMap};
use crate::classify::classify_all;
use crate::error::ReportError;
use crate::model::{AggregatedRow, PlacedCell, RawTable, RunStats, WideRow};
use crate::month::YearMonth;
use crate::normalize::normalize;
use crate::pivot::build_wide_table;

/// One branch's month of wide rows, ready to be laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchReport {
    pub branch: String,
    /// One row per calendar day of the month, ascending.
    pub rows: Vec<WideRow>,
}

/// Everything needed to render the workbooks of one run.
#[derive(Debug, Clone)]
pub struct ReportPlan {
    pub month: YearMonth,
    /// Static layout blocks plus the app-channel block discovered from the data.
    pub blocks: Vec<CellBlock>,
    /// Value columns of the wide table in layout order.
    pub columns: Vec<String>,
    pub branches: Vec<BranchReport>,
    pub stats: RunStats,
}

impl ReportPlan {
    pub fn cells_for(&self, branch: &BranchReport) -> Result<Vec<PlacedCell>, ReportError> {
        place_cells(&self.blocks, &branch.rows)
    }

    pub fn branch(&self, name: &str) -> Option<&BranchReport> {
        self.branches.iter().find(|b| b.branch == name)
    }
}

/// Normalize, classify and aggregate a raw table.
pub fn aggregate_table(table: &RawTable, stats: &mut RunStats) -> Result<Vec<AggregatedRow>, ReportError> {
    let lines = normalize(table, stats)?;
    let classified = classify_all(&lines)?;
    stats.classified_rows = classified.len();

    let aggregated = aggregate_lines(&classified);
    stats.aggregated_rows = aggregated.len();
    Ok(aggregated)
}

/// Run the pipeline for `month`. Returns one month-filled branch report per branch in the input.
pub fn run(table: &RawTable, month: YearMonth, layout: &CellMap) -> Result<ReportPlan, ReportError> {
    let mut stats = RunStats::default();
    let aggregated = aggregate_table(table, &mut stats)?;
    let wide = build_wide_table(&aggregated);

    stats.branches = wide.branches.len();
    stats.app_channels = wide.app_channels.clone();

    // The app block grows with the data, so its width is only known here
    let blocks = layout.with_channels(&wide.app_channels);
    let days = month.days().len() as u32;
    for block in &blocks {
        block.check_bounds(days).map_err(ReportError::ConfigValidation)?;
    }

    let branches = wide
        .branches
        .iter()
        .map(|branch| BranchReport {
            branch: branch.clone(),
            rows: wide.month_rows(branch, month),
        })
        .collect();

    Ok(ReportPlan {
        month,
        blocks,
        columns: wide.columns,
        branches,
        stats,
    })
}
