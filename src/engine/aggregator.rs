//! Grouping of normalized records into per-key aggregates

use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use std::str::FromStr;
use tracing::debug;

use crate::types::{Aggregate, AggregateKey, NormalizedRecord};

/// Aggregates whose debit and credit both stay within this band are
/// considered fully offset and dropped from matching
fn zero_sum_epsilon() -> BigDecimal {
    BigDecimal::from_str("0.000001").unwrap_or_default()
}

/// Group records by (account code, book) and sum debit/credit per group
///
/// Totals are order-independent; output ordering is the first-seen key
/// order, which downstream reporting relies on. Groups whose summed debit
/// and credit both net out to (effectively) zero are dropped, mirroring
/// how ledger exports cancel reversal pairs.
pub fn aggregate(records: &[NormalizedRecord]) -> Vec<Aggregate> {
    let mut groups: IndexMap<AggregateKey, Aggregate> = IndexMap::new();

    for record in records {
        let key = AggregateKey::new(record.account_code.clone(), record.book.clone());
        groups
            .entry(key.clone())
            .and_modify(|agg| {
                agg.total_debit += &record.debit;
                agg.total_credit += &record.credit;
                agg.record_count += 1;
            })
            .or_insert_with(|| Aggregate {
                key,
                total_debit: record.debit.clone(),
                total_credit: record.credit.clone(),
                record_count: 1,
            });
    }

    let epsilon = zero_sum_epsilon();
    let before = groups.len();
    let aggregates: Vec<Aggregate> = groups
        .into_values()
        .filter(|agg| {
            agg.total_debit.abs() > epsilon || agg.total_credit.abs() > epsilon
        })
        .collect();
    debug!(
        groups = before,
        kept = aggregates.len(),
        "aggregated records"
    );
    aggregates
}
