// Property-based tests for aggregation and matching.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashSet;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use proptest::prelude::*;

use recon_core::engine::{aggregate, match_aggregates};
use recon_core::types::{Aggregate, AggregateKey, MatchCategory, NormalizedRecord};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Amounts as integer cents keep arithmetic exact under BigDecimal.
fn cents(value: i64) -> BigDecimal {
    BigDecimal::new(BigInt::from(value), 2)
}

fn arb_code() -> impl Strategy<Value = String> {
    // Small alphabet so generated tables collide on keys often.
    prop_oneof![
        Just("1001".to_string()),
        Just("1002".to_string()),
        Just("2201".to_string()),
        Just("6601".to_string()),
        r"[1-9][0-9]{3}",
    ]
}

fn arb_book() -> impl Strategy<Value = String> {
    prop_oneof![Just("甲公司".to_string()), Just("乙公司".to_string())]
}

fn arb_record() -> impl Strategy<Value = NormalizedRecord> {
    (arb_code(), arb_book(), 0i64..1_000_000, 0i64..1_000_000).prop_map(
        |(account_code, book, debit, credit)| NormalizedRecord {
            account_code,
            book,
            debit: cents(debit),
            credit: cents(credit),
            source_row: 0,
        },
    )
}

fn arb_records() -> impl Strategy<Value = Vec<NormalizedRecord>> {
    prop::collection::vec(arb_record(), 0..40)
}

fn arb_aggregates() -> impl Strategy<Value = Vec<Aggregate>> {
    arb_records().prop_map(|records| aggregate(&records))
}

fn key_set(aggregates: &[Aggregate]) -> HashSet<AggregateKey> {
    aggregates.iter().map(|a| a.key.clone()).collect()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// Totals survive aggregation: sum of group totals equals sum of inputs.
    #[test]
    fn aggregation_preserves_totals(records in arb_records()) {
        let aggregates = aggregate(&records);
        let input_debit: BigDecimal = records.iter().map(|r| r.debit.clone()).sum();
        let input_credit: BigDecimal = records.iter().map(|r| r.credit.clone()).sum();
        let output_debit: BigDecimal = aggregates.iter().map(|a| a.total_debit.clone()).sum();
        let output_credit: BigDecimal = aggregates.iter().map(|a| a.total_credit.clone()).sum();
        // Non-negative cent inputs cannot hit the near-zero offset filter,
        // so nothing is dropped unless a group is entirely zero.
        let dropped_debit = &input_debit - &output_debit;
        let dropped_credit = &input_credit - &output_credit;
        prop_assert_eq!(dropped_debit, BigDecimal::from(0));
        prop_assert_eq!(dropped_credit, BigDecimal::from(0));
    }

    /// Input order never changes totals, only group ordering.
    #[test]
    fn aggregation_is_order_insensitive(
        records in arb_records(),
        mut seed in any::<u64>(),
    ) {
        let mut reordered = records.clone();
        // Deterministic Fisher-Yates shuffle seeded by the generated value.
        for i in (1..reordered.len()).rev() {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (seed % (i as u64 + 1)) as usize;
            reordered.swap(i, j);
        }

        let a = aggregate(&records);
        let b = aggregate(&reordered);
        prop_assert_eq!(key_set(&a), key_set(&b));
        for agg in &a {
            let other = b.iter().find(|x| x.key == agg.key).unwrap();
            prop_assert_eq!(&agg.total_debit, &other.total_debit);
            prop_assert_eq!(&agg.total_credit, &other.total_credit);
            prop_assert_eq!(agg.record_count, other.record_count);
        }
    }

    /// One group per distinct key, never more.
    #[test]
    fn aggregation_yields_unique_keys(records in arb_records()) {
        let aggregates = aggregate(&records);
        let keys = key_set(&aggregates);
        prop_assert_eq!(keys.len(), aggregates.len());
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// Full outer join: every key from either side appears exactly once.
    #[test]
    fn matching_covers_both_sides_exactly_once(
        je in arb_aggregates(),
        tb in arb_aggregates(),
    ) {
        let threshold = cents(1);
        let expected: HashSet<AggregateKey> =
            key_set(&je).union(&key_set(&tb)).cloned().collect();

        let results = match_aggregates(je, tb, &threshold);
        let produced: HashSet<AggregateKey> =
            results.iter().map(|r| r.key.clone()).collect();

        prop_assert_eq!(produced.len(), results.len());
        prop_assert_eq!(produced, expected);
    }

    /// A result never has both sides absent, and the one-sided categories
    /// line up with which side is missing.
    #[test]
    fn matching_categories_match_presence(
        je in arb_aggregates(),
        tb in arb_aggregates(),
    ) {
        let threshold = cents(1);
        for result in match_aggregates(je, tb, &threshold) {
            prop_assert!(result.je.is_some() || result.tb.is_some());
            match result.category {
                MatchCategory::JeOnly => {
                    prop_assert!(result.je.is_some() && result.tb.is_none());
                }
                MatchCategory::TbOnly => {
                    prop_assert!(result.je.is_none() && result.tb.is_some());
                }
                MatchCategory::Exact | MatchCategory::Variance => {
                    prop_assert!(result.je.is_some() && result.tb.is_some());
                }
            }
        }
    }

    /// Exact versus variance is decided by the threshold, inclusively,
    /// on both the debit and credit differences.
    #[test]
    fn matching_respects_threshold_boundary(
        je in arb_aggregates(),
        tb in arb_aggregates(),
        threshold_cents in 0i64..500,
    ) {
        let threshold = cents(threshold_cents);
        for result in match_aggregates(je, tb, &threshold) {
            let within = result.debit_diff.abs() <= threshold
                && result.credit_diff.abs() <= threshold;
            match result.category {
                MatchCategory::Exact => prop_assert!(within),
                MatchCategory::Variance => prop_assert!(!within),
                MatchCategory::JeOnly | MatchCategory::TbOnly => {}
            }
        }
    }

    /// Differences are always journal minus trial balance, with a missing
    /// side treated as zero.
    #[test]
    fn matching_diffs_are_je_minus_tb(
        je in arb_aggregates(),
        tb in arb_aggregates(),
    ) {
        let threshold = cents(1);
        let zero = BigDecimal::from(0);
        for result in match_aggregates(je, tb, &threshold) {
            let je_debit = result.je.as_ref().map_or(zero.clone(), |a| a.total_debit.clone());
            let tb_debit = result.tb.as_ref().map_or(zero.clone(), |a| a.total_debit.clone());
            let je_credit = result.je.as_ref().map_or(zero.clone(), |a| a.total_credit.clone());
            let tb_credit = result.tb.as_ref().map_or(zero.clone(), |a| a.total_credit.clone());
            prop_assert_eq!(&result.debit_diff, &(je_debit - tb_debit));
            prop_assert_eq!(&result.credit_diff, &(je_credit - tb_credit));
        }
    }
}
