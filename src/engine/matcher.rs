//! Matching of JE aggregates against TB aggregates and classification

use bigdecimal::{BigDecimal, RoundingMode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Aggregate, AggregateKey, MatchCategory, MatchResult};

/// Full outer join of the two aggregate sets on (account code, book)
///
/// One [`MatchResult`] per key present on either side. Output ordering is
/// stable: JE-side keys in their first-seen order, then TB-only keys in
/// theirs. Differences within `threshold` (inclusive) classify as exact.
pub fn match_aggregates(
    je: Vec<Aggregate>,
    tb: Vec<Aggregate>,
    threshold: &BigDecimal,
) -> Vec<MatchResult> {
    let mut tb_by_key: IndexMap<AggregateKey, Aggregate> = tb
        .into_iter()
        .map(|agg| (agg.key.clone(), agg))
        .collect();

    let mut results = Vec::with_capacity(je.len() + tb_by_key.len());

    for je_agg in je {
        match tb_by_key.shift_remove(&je_agg.key) {
            Some(tb_agg) => {
                let debit_diff = &je_agg.total_debit - &tb_agg.total_debit;
                let credit_diff = &je_agg.total_credit - &tb_agg.total_credit;
                let category = if debit_diff.abs() <= *threshold
                    && credit_diff.abs() <= *threshold
                {
                    MatchCategory::Exact
                } else {
                    MatchCategory::Variance
                };
                results.push(MatchResult {
                    key: je_agg.key.clone(),
                    je: Some(je_agg),
                    tb: Some(tb_agg),
                    debit_diff,
                    credit_diff,
                    category,
                });
            }
            None => {
                // The whole JE amount counts as extra.
                results.push(MatchResult {
                    key: je_agg.key.clone(),
                    debit_diff: je_agg.total_debit.clone(),
                    credit_diff: je_agg.total_credit.clone(),
                    je: Some(je_agg),
                    tb: None,
                    category: MatchCategory::JeOnly,
                });
            }
        }
    }

    for (_, tb_agg) in tb_by_key {
        results.push(MatchResult {
            key: tb_agg.key.clone(),
            debit_diff: -tb_agg.total_debit.clone(),
            credit_diff: -tb_agg.total_credit.clone(),
            je: None,
            tb: Some(tb_agg),
            category: MatchCategory::TbOnly,
        });
    }

    debug!(results = results.len(), "matched aggregates");
    results
}

/// Human-readable difference breakdown for one match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceSummary {
    /// Signed debit difference (JE minus TB)
    pub debit_diff: BigDecimal,
    /// Signed credit difference (JE minus TB)
    pub credit_diff: BigDecimal,
    /// Debit difference as a percentage of the TB debit total, when that
    /// total exists and is non-zero
    pub debit_pct_of_tb: Option<BigDecimal>,
    /// Credit counterpart of `debit_pct_of_tb`
    pub credit_pct_of_tb: Option<BigDecimal>,
    /// One-line description for the reporting layer
    pub description: String,
}

/// Produce the reporting summary for a match result
///
/// Pure function: no state beyond the input. Percentages are rounded to
/// two decimal places, half-up.
pub fn summarize(result: &MatchResult) -> DifferenceSummary {
    let zero = BigDecimal::from(0);
    let pct = |diff: &BigDecimal, tb_total: Option<&BigDecimal>| -> Option<BigDecimal> {
        let total = tb_total?;
        if *total == zero {
            return None;
        }
        Some(
            (diff * BigDecimal::from(100) / total).with_scale_round(2, RoundingMode::HalfUp),
        )
    };

    let tb_debit = result.tb.as_ref().map(|agg| &agg.total_debit);
    let tb_credit = result.tb.as_ref().map(|agg| &agg.total_credit);
    let debit_pct_of_tb = pct(&result.debit_diff, tb_debit);
    let credit_pct_of_tb = pct(&result.credit_diff, tb_credit);

    let description = match result.category {
        MatchCategory::Exact => format!("{}: {}", result.key, result.category),
        MatchCategory::Variance => format!(
            "{}: {} (debit {} / credit {})",
            result.key, result.category, result.debit_diff, result.credit_diff
        ),
        MatchCategory::JeOnly | MatchCategory::TbOnly => format!(
            "{}: {} (debit {} / credit {})",
            result.key, result.category, result.debit_diff, result.credit_diff
        ),
    };

    DifferenceSummary {
        debit_diff: result.debit_diff.clone(),
        credit_diff: result.credit_diff.clone(),
        debit_pct_of_tb,
        credit_pct_of_tb,
        description,
    }
}
