//! Pivoting aggregated rows into the per-branch, per-day wide table.
//!
//! Aggregated rows are split into three disjoint segments (Product, Grooming,
//! App). Each segment is pivoted on payment type with the four measures
//! joined back per (branch, date, salesperson). The segments are then merged
//! with suffixed column names, salesperson is summed away, and finally each
//! branch is laid over the calendar days of the target month.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::model::{
    AggregatedRow, Measures, SaleSegment, WideRow, DISCOUNT_MEASURE, GRAND_TOTAL_COLUMN, LOYALTY_MEASURE,
    REFUND_MEASURE, TOTAL_MEASURE,
};
use crate::month::YearMonth;

/// Rows-key of a segment pivot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PivotKey {
    pub branch: String,
    pub date: NaiveDate,
    pub salesperson: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentRow {
    /// Total per payment type. Payment types absent for this key are absent here.
    pub by_payment: BTreeMap<String, f64>,
    pub measures: Measures,
}

/// One segment pivoted by payment type.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTable {
    pub segment: SaleSegment,
    pub payment_types: BTreeSet<String>,
    pub rows: BTreeMap<PivotKey, SegmentRow>,
}

impl SegmentTable {
    /// Suffixed output columns: payment types (sorted) then the four measures.
    pub fn columns(&self) -> Vec<String> {
        self.payment_types
            .iter()
            .map(|p| self.segment.column(p))
            .chain(
                [LOYALTY_MEASURE, DISCOUNT_MEASURE, REFUND_MEASURE, TOTAL_MEASURE]
                    .iter()
                    .map(|m| self.segment.column(m)),
            )
            .collect()
    }
}

/// Pivot the rows of one segment. Rows from other segments are ignored.
pub fn pivot_segment(segment: SaleSegment, rows: &[AggregatedRow]) -> SegmentTable {
    let mut table = SegmentTable {
        segment,
        payment_types: BTreeSet::new(),
        rows: BTreeMap::new(),
    };

    for row in rows.iter().filter(|r| SaleSegment::of(&r.key.sale_type) == segment) {
        let key = PivotKey {
            branch: row.key.branch.clone(),
            date: row.key.date,
            salesperson: row.key.salesperson.clone(),
        };
        table.payment_types.insert(row.key.payment_type.clone());

        let entry = table.rows.entry(key).or_default();
        *entry.by_payment.entry(row.key.payment_type.clone()).or_insert(0.0) += row.measures.total;
        entry.measures.add(&row.measures);
    }

    table
}

/// Outer-merge segment tables on (branch, date, salesperson).
///
/// Columns carry the segment suffix; a grand `Total` sums the segment totals.
pub fn merge_segments(tables: &[SegmentTable]) -> BTreeMap<PivotKey, BTreeMap<String, f64>> {
    let mut merged: BTreeMap<PivotKey, BTreeMap<String, f64>> = BTreeMap::new();

    for table in tables {
        let segment = table.segment;
        for (key, row) in &table.rows {
            let values = merged.entry(key.clone()).or_default();
            for (payment, amount) in &row.by_payment {
                *values.entry(segment.column(payment)).or_insert(0.0) += amount;
            }
            let measures = [
                (LOYALTY_MEASURE, row.measures.loyalty_points),
                (DISCOUNT_MEASURE, row.measures.total_discount),
                (REFUND_MEASURE, row.measures.refund),
                (TOTAL_MEASURE, row.measures.total),
            ];
            for (name, amount) in measures {
                *values.entry(segment.column(name)).or_insert(0.0) += amount;
            }
            *values.entry(GRAND_TOTAL_COLUMN.to_string()).or_insert(0.0) += row.measures.total;
        }
    }

    merged
}

/// Sum salesperson away, leaving one row per (branch, date).
pub fn collapse_salesperson(merged: &BTreeMap<PivotKey, BTreeMap<String, f64>>) -> Vec<WideRow> {
    let mut collapsed: BTreeMap<(String, NaiveDate), WideRow> = BTreeMap::new();

    for (key, values) in merged {
        let row = collapsed
            .entry((key.branch.clone(), key.date))
            .or_insert_with(|| WideRow::empty(&key.branch, key.date));
        for (column, amount) in values {
            row.add(column, *amount);
        }
    }

    collapsed.into_values().collect()
}

/// The merged wide table over every branch and date in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    /// Known value columns in layout order (Product, Grooming, App, grand Total).
    pub columns: Vec<String>,
    /// Rows ordered by (branch, date).
    pub rows: Vec<WideRow>,
    /// Distinct app channel labels, sorted.
    pub app_channels: Vec<String>,
    /// Distinct branches, sorted.
    pub branches: Vec<String>,
}

impl WideTable {
    /// The branch's rows for every day of `month`, zero-filled where there was no activity.
    ///
    /// Rows outside the month are left out.
    pub fn month_rows(&self, branch: &str, month: YearMonth) -> Vec<WideRow> {
        let by_date: BTreeMap<NaiveDate, &WideRow> = self
            .rows
            .iter()
            .filter(|r| r.branch == branch && month.contains(r.date))
            .map(|r| (r.date, r))
            .collect();

        month
            .days()
            .into_iter()
            .map(|day| match by_date.get(&day) {
                Some(row) => (*row).clone(),
                None => WideRow::empty(branch, day),
            })
            .collect()
    }
}

pub fn build_wide_table(rows: &[AggregatedRow]) -> WideTable {
    let tables: Vec<SegmentTable> = SaleSegment::ALL
        .iter()
        .map(|segment| pivot_segment(*segment, rows))
        .collect();

    let mut columns: Vec<String> = tables.iter().flat_map(|t| t.columns()).collect();
    columns.push(GRAND_TOTAL_COLUMN.to_string());

    let app_channels: Vec<String> = tables
        .iter()
        .filter(|t| t.segment == SaleSegment::App)
        .flat_map(|t| t.payment_types.iter().cloned())
        .collect();
    if !app_channels.is_empty() {
        log::debug!("app channels: {}", app_channels.join(", "));
    }

    let branches: Vec<String> = rows
        .iter()
        .map(|r| r.key.branch.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let merged = merge_segments(&tables);

    WideTable {
        columns,
        rows: collapse_salesperson(&merged),
        app_channels,
        branches,
    }
}
