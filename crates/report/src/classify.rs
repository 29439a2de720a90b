use chrono::NaiveDate;

use crate::error::ReportError;
use crate::model::{Buckets, ClassifiedLine, OrderLine, SaleType};

/// Basic payment methods, highest priority first.
pub const BASIC_PAYMENT_TYPES: [&str; 3] = ["Credit", "Cash", "Card"];

/// Sub-brand / channel tags, highest priority first.
pub const PAYMENT_SUB_TYPES: [&str; 12] = [
    "Talabat", "Insta", "Carriage", "Baqalaat", "BEC", "Jebly", "PKG", "HOMIEZ", "Note", "Henlo", "Feehla",
    "Dalooni",
];

/// Simplified payment types counted as in-shop product sales.
pub const PRODUCT_PAYMENT_TYPES: [&str; 3] = ["Cash", "Card", "Credit|Note"];

pub const GROOMING_CATEGORY: &str = "Grooming Service";

/// Derive loyalty / discount / refund amounts for one line.
///
/// A negative unit price is either a loyalty redemption (name mentions
/// `Loyalty`, category mentions `Discount`) or a discount line; otherwise a
/// negative quantity is a refund. Percent and fixed discounts are then added
/// on top of the discount bucket.
pub fn buckets(line: &OrderLine) -> Buckets {
    let mut buckets = base_buckets(line.unit_price, line.quantity, &line.product_name, &line.category);
    let gross = line.unit_price * line.quantity as f64;
    buckets.total_discount += gross * (line.discount_percent / 100.0);
    buckets.total_discount += line.discount_fixed;
    buckets
}

/// The sign-driven part of [`buckets`], before percent/fixed discounts.
pub fn base_buckets(unit_price: f64, quantity: i64, product_name: &str, category: &str) -> Buckets {
    let amount = -unit_price * quantity as f64;
    let mut buckets = Buckets::default();

    if unit_price < 0.0 {
        if product_name.contains("Loyalty") && category.contains("Discount") {
            buckets.loyalty_points = amount;
        } else {
            buckets.total_discount = amount;
        }
    } else if quantity < 0 {
        buckets.refund = amount;
    }

    buckets
}

/// Reduce a journal name to `Basic|SubType` using the first matching token of each list.
///
/// Returns an empty string when nothing matches.
pub fn simplify_payment(journal_name: &str) -> String {
    let basic = BASIC_PAYMENT_TYPES.iter().find(|t| journal_name.contains(*t));
    let sub = PAYMENT_SUB_TYPES.iter().find(|t| journal_name.contains(*t));

    basic
        .into_iter()
        .chain(sub)
        .copied()
        .collect::<Vec<_>>()
        .join("|")
}

pub fn sale_type(category: &str, payment_type: &str) -> SaleType {
    if category == GROOMING_CATEGORY {
        SaleType::Grooming
    } else if PRODUCT_PAYMENT_TYPES.contains(&payment_type) {
        SaleType::Product
    } else {
        SaleType::Channel(payment_type.to_string())
    }
}

/// Branch label: first space-delimited token of the point-of-sale name.
pub fn branch_of(pos_name: &str) -> String {
    pos_name.split(' ').next().unwrap_or_default().to_string()
}

/// Date-only part (first 10 characters) of an order timestamp.
pub fn order_day(order_date: &str, line: usize) -> Result<NaiveDate, ReportError> {
    let day: String = order_date.chars().take(10).collect();
    NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|_| ReportError::DateParse {
        line,
        value: order_date.into(),
    })
}

pub fn classify(line: &OrderLine) -> Result<ClassifiedLine, ReportError> {
    let payment_type = simplify_payment(&line.journal_name);
    if payment_type.is_empty() {
        log::debug!(
            "line {}: unrecognized payment journal '{}'",
            line.line,
            line.journal_name
        );
    }

    Ok(ClassifiedLine {
        date: order_day(&line.order_date, line.line)?,
        branch: branch_of(&line.pos_name),
        salesperson: line.salesperson.clone(),
        sale_type: sale_type(&line.category, &payment_type),
        payment_type,
        subtotal: line.subtotal,
        buckets: buckets(line),
    })
}

pub fn classify_all(lines: &[OrderLine]) -> Result<Vec<ClassifiedLine>, ReportError> {
    lines.iter().map(classify).collect()
}
