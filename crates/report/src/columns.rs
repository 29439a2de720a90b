//! Input column names of the point-of-sale export.
//!
//! The `/`-delimited names mirror the nested record layout of the source
//! system and are matched verbatim.

pub const ORDER_DATE: &str = "Order Date";
pub const POS_NAME: &str = "Point of Sale Name";
pub const SALESPERSON: &str = "Salesperson/Name";
pub const JOURNAL_NAME: &str = "Payments/Journal/Journal Name";
pub const PRODUCT_NAME: &str = "Order Lines/Product/Name";
pub const PRODUCT_CATEGORY: &str = "Order Lines/Product/Product Category";
pub const UNIT_PRICE: &str = "Order Lines/Unit Price";
pub const QUANTITY: &str = "Order Lines/Quantity";
pub const DISCOUNT_PERCENT: &str = "Order Lines/Discount (%)";
pub const DISCOUNT_FIXED: &str = "Order Lines/Discount Fixed";
pub const SUBTOTAL: &str = "Order Lines/Subtotal";

/// Every column the normalizer reads. Anything else in the export is ignored.
pub const REQUIRED: [&str; 11] = [
    ORDER_DATE,
    POS_NAME,
    SALESPERSON,
    JOURNAL_NAME,
    PRODUCT_NAME,
    PRODUCT_CATEGORY,
    UNIT_PRICE,
    QUANTITY,
    DISCOUNT_PERCENT,
    DISCOUNT_FIXED,
    SUBTOTAL,
];
