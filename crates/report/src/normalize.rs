use crate::columns;
use crate::error::ReportError;
use crate::model::{OrderLine, RawTable, RunStats};

/// Product names containing this marker are not sales.
pub const GIFT_COUPON_MARKER: &str = "Gift-Coupon";
/// Categories containing this marker are excluded from the report.
pub const BATHCLUB_MARKER: &str = "Service-Bathclub";

/// Cell values read as missing, the same set pandas treats as NA on import.
pub const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a raw cell holds no value.
pub fn is_missing(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw.trim())
}

/// Text fields patched by forward fill, in `OrderLine` order.
const FILLED_COLUMNS: [&str; 6] = [
    columns::ORDER_DATE,
    columns::POS_NAME,
    columns::SALESPERSON,
    columns::JOURNAL_NAME,
    columns::PRODUCT_NAME,
    columns::PRODUCT_CATEGORY,
];

struct ColumnIndex {
    text: [usize; 6],
    unit_price: usize,
    quantity: usize,
    discount_percent: usize,
    discount_fixed: usize,
    subtotal: usize,
}

impl ColumnIndex {
    fn resolve(table: &RawTable) -> Result<Self, ReportError> {
        let idx = |name: &str| -> Result<usize, ReportError> {
            table.column_index(name).ok_or_else(|| ReportError::MissingColumn {
                column: name.into(),
            })
        };

        let mut text = [0usize; 6];
        for (slot, name) in text.iter_mut().zip(FILLED_COLUMNS) {
            *slot = idx(name)?;
        }

        Ok(Self {
            text,
            unit_price: idx(columns::UNIT_PRICE)?,
            quantity: idx(columns::QUANTITY)?,
            discount_percent: idx(columns::DISCOUNT_PERCENT)?,
            discount_fixed: idx(columns::DISCOUNT_FIXED)?,
            subtotal: idx(columns::SUBTOTAL)?,
        })
    }
}

/// Clean raw rows into typed order lines.
///
/// Rows without a subtotal are dropped (empty and NA markers such as `NaN`
/// or `NULL` both count as missing), numbers are coerced (apostrophes
/// stripped, missing amounts become zero), missing text is forward-filled
/// from the preceding kept row, and gift-coupon / bathclub lines are removed.
/// Row order is significant: forward fill runs over rows as given.
pub fn normalize(table: &RawTable, stats: &mut RunStats) -> Result<Vec<OrderLine>, ReportError> {
    let cols = ColumnIndex::resolve(table)?;

    let mut last_seen: [Option<String>; 6] = Default::default();
    let mut lines = Vec::new();

    for row in &table.rows {
        stats.rows_read += 1;

        let subtotal_raw = field(&row.fields, cols.subtotal);
        if is_missing(&subtotal_raw) {
            stats.dropped_missing_subtotal += 1;
            continue;
        }

        let subtotal = parse_amount(&subtotal_raw, row.line, columns::SUBTOTAL)?.unwrap_or(0.0);
        let unit_price =
            parse_amount(&field(&row.fields, cols.unit_price), row.line, columns::UNIT_PRICE)?.unwrap_or(0.0);
        let quantity =
            parse_amount(&field(&row.fields, cols.quantity), row.line, columns::QUANTITY)?.unwrap_or(0.0);
        let discount_percent = parse_amount(
            &field(&row.fields, cols.discount_percent),
            row.line,
            columns::DISCOUNT_PERCENT,
        )?
        .unwrap_or(0.0);
        let discount_fixed = parse_amount(
            &field(&row.fields, cols.discount_fixed),
            row.line,
            columns::DISCOUNT_FIXED,
        )?
        .unwrap_or(0.0);

        let mut text: [String; 6] = Default::default();
        for (slot, (&i, last)) in text.iter_mut().zip(cols.text.iter().zip(last_seen.iter_mut())) {
            let value = field(&row.fields, i);
            if is_missing(&value) {
                if let Some(prev) = last.as_ref() {
                    *slot = prev.clone();
                    stats.forward_filled_cells += 1;
                }
            } else {
                *last = Some(value.clone());
                *slot = value;
            }
        }
        let [order_date, pos_name, salesperson, journal_name, product_name, category] = text;

        if product_name.contains(GIFT_COUPON_MARKER) {
            stats.excluded_gift_coupon += 1;
            continue;
        }
        if category.contains(BATHCLUB_MARKER) {
            stats.excluded_bathclub += 1;
            continue;
        }

        lines.push(OrderLine {
            line: row.line,
            order_date,
            pos_name,
            salesperson,
            journal_name,
            product_name,
            category,
            unit_price,
            quantity: quantity.trunc() as i64,
            discount_percent,
            discount_fixed,
            subtotal,
        });
    }

    if stats.dropped_missing_subtotal > 0 {
        log::warn!(
            "dropped {} row(s) without '{}'",
            stats.dropped_missing_subtotal,
            columns::SUBTOTAL
        );
    }
    if stats.forward_filled_cells > 0 {
        log::debug!("forward-filled {} missing cell(s)", stats.forward_filled_cells);
    }

    Ok(lines)
}

fn field(fields: &[String], i: usize) -> String {
    fields.get(i).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Parse an amount after stripping stray apostrophes.
///
/// Missing input (see [`is_missing`]) is `None`. Anything else must be a finite number.
pub fn parse_amount(raw: &str, line: usize, column: &str) -> Result<Option<f64>, ReportError> {
    let raw = raw.trim();
    if is_missing(raw) {
        return Ok(None);
    }

    let cleaned = raw.replace('\'', "");
    match cleaned.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(ReportError::NumberParse {
            line,
            column: column.into(),
            value: raw.into(),
        }),
    }
}
