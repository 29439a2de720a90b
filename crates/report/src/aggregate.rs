use std::collections::BTreeMap;

use crate::model::{AggregateKey, AggregatedRow, ClassifiedLine, Measures};

/// Group lines by (date, branch, salesperson, payment type, sale type) and sum measures.
///
/// Output is ordered by key, one row per key present in the input.
pub fn aggregate_lines(lines: &[ClassifiedLine]) -> Vec<AggregatedRow> {
    let mut groups: BTreeMap<AggregateKey, Measures> = BTreeMap::new();

    for line in lines {
        let key = AggregateKey {
            date: line.date,
            branch: line.branch.clone(),
            salesperson: line.salesperson.clone(),
            payment_type: line.payment_type.clone(),
            sale_type: line.sale_type.clone(),
        };
        groups.entry(key).or_default().add(&Measures {
            total: line.subtotal,
            loyalty_points: line.buckets.loyalty_points,
            total_discount: line.buckets.total_discount,
            refund: line.buckets.refund,
        });
    }

    groups
        .into_iter()
        .map(|(key, measures)| AggregatedRow { key, measures })
        .collect()
}
