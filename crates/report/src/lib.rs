//! `dsr-report`: daily sales report pipeline.
//!
//! Pure engine crate: receives a raw point-of-sale table, returns per-branch
//! month tables and their cell layout. No filesystem or workbook IO.

pub mod aggregate;
pub mod cellmap;
pub mod classify;
pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod month;
pub mod normalize;
pub mod pivot;
pub mod table;

pub use cellmap::CellMap;
pub use config::ReportConfig;
pub use engine::{run, BranchReport, ReportPlan};
pub use error::ReportError;
pub use model::{CellValue, RawTable, RunStats, WideRow};
pub use month::YearMonth;
