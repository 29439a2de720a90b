// File I/O operations

pub mod csv;
pub mod report;
pub mod xlsx;
pub mod xlsx_styles;

pub use report::{generate_report, read_table, BranchFailure, ReportOptions, ReportOutcome};
pub use xlsx::TemplateBlueprint;
