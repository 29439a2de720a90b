use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One raw input row. `line` is the 1-based source line (header = line 1).
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Header names plus raw string rows, exactly as read from the export.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// A cleaned order line. Text fields are forward-filled, numbers coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub line: usize,
    pub order_date: String,
    pub pos_name: String,
    pub salesperson: String,
    pub journal_name: String,
    pub product_name: String,
    pub category: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub discount_percent: f64,
    pub discount_fixed: f64,
    pub subtotal: f64,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SaleType {
    Grooming,
    Product,
    /// App / aggregator channel, labelled by its simplified payment type.
    Channel(String),
}

/// Loyalty / discount / refund amounts derived from one order line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Buckets {
    pub loyalty_points: f64,
    pub total_discount: f64,
    pub refund: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    pub date: NaiveDate,
    pub branch: String,
    pub salesperson: String,
    pub payment_type: String,
    pub sale_type: SaleType,
    pub subtotal: f64,
    pub buckets: Buckets,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregate key = (date, branch, salesperson, payment type, sale type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub date: NaiveDate,
    pub branch: String,
    pub salesperson: String,
    pub payment_type: String,
    pub sale_type: SaleType,
}

/// The four summed measures carried through aggregation and pivoting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measures {
    pub total: f64,
    pub loyalty_points: f64,
    pub total_discount: f64,
    pub refund: f64,
}

impl Measures {
    pub fn add(&mut self, other: &Measures) {
        self.total += other.total;
        self.loyalty_points += other.loyalty_points;
        self.total_discount += other.total_discount;
        self.refund += other.refund;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub key: AggregateKey,
    pub measures: Measures,
}

// ---------------------------------------------------------------------------
// Wide table
// ---------------------------------------------------------------------------

/// The three disjoint sale-type tables merged into the wide table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SaleSegment {
    Product,
    Grooming,
    App,
}

impl SaleSegment {
    pub const ALL: [SaleSegment; 3] = [Self::Product, Self::Grooming, Self::App];

    pub fn of(sale_type: &SaleType) -> Self {
        match sale_type {
            SaleType::Product => Self::Product,
            SaleType::Grooming => Self::Grooming,
            SaleType::Channel(_) => Self::App,
        }
    }

    /// Column-name suffix keeping the merged segments disjoint.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Product => "P",
            Self::Grooming => "G",
            Self::App => "App",
        }
    }

    pub fn column(&self, name: &str) -> String {
        format!("{name}_{}", self.suffix())
    }
}

pub const DATE_COLUMN: &str = "Date";
pub const BRANCH_COLUMN: &str = "Branch";
pub const GRAND_TOTAL_COLUMN: &str = "Total";

pub const LOYALTY_MEASURE: &str = "Loyalty Points";
pub const DISCOUNT_MEASURE: &str = "TotalDiscount";
pub const REFUND_MEASURE: &str = "Refunds";
pub const TOTAL_MEASURE: &str = "Total";

/// One (branch, date) row of the wide table.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub branch: String,
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
}

impl WideRow {
    pub fn empty(branch: &str, date: NaiveDate) -> Self {
        Self {
            branch: branch.to_string(),
            date,
            values: BTreeMap::new(),
        }
    }

    /// Numeric value of a column; absent columns read as zero.
    pub fn value(&self, column: &str) -> f64 {
        self.values.get(column).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, column: &str, amount: f64) {
        *self.values.entry(column.to_string()).or_insert(0.0) += amount;
    }

    /// Cell content for a named column, including the `Date`/`Branch` pseudo-columns.
    pub fn cell(&self, column: &str) -> CellValue {
        match column {
            DATE_COLUMN => CellValue::Text(self.date.format("%Y-%m-%d").to_string()),
            BRANCH_COLUMN => CellValue::Text(self.branch.clone()),
            _ => CellValue::Number(self.value(column)),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numbers stay numbers; text becomes a number when it parses as one.
    pub fn coerce(self) -> Self {
        match self {
            Self::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Self::Number(n),
                _ => Self::Text(s),
            },
            number => number,
        }
    }
}

/// A value destined for a 1-based (row, col) spreadsheet position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub rows_read: usize,
    pub dropped_missing_subtotal: usize,
    pub excluded_gift_coupon: usize,
    pub excluded_bathclub: usize,
    pub forward_filled_cells: usize,
    pub classified_rows: usize,
    pub aggregated_rows: usize,
    pub branches: usize,
    pub app_channels: Vec<String>,
}
