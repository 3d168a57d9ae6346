//! The reconciliation pipeline: resolve, normalize, aggregate, match

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ReconciliationConfig;
use crate::engine::aggregator::aggregate;
use crate::engine::matcher::match_aggregates;
use crate::normalize::{CompiledPatterns, RecordNormalizer};
use crate::schema::{ColumnResolver, ResolvedColumns};
use crate::types::{
    MatchCategory, MatchResult, NormalizedRecord, ParseWarning, RawTable, ReconError, ReconResult,
    SourceKind,
};

/// Per-category counts and net difference totals for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    /// Keys matching within tolerance
    pub exact: usize,
    /// Keys present on both sides with differences beyond tolerance
    pub variance: usize,
    /// Keys present only in the journal
    pub je_only: usize,
    /// Keys present only in the trial balance
    pub tb_only: usize,
    /// Net debit difference across all discrepancy categories
    pub net_debit_diff: BigDecimal,
    /// Net credit difference across all discrepancy categories
    pub net_credit_diff: BigDecimal,
}

impl ReconciliationSummary {
    fn from_results(results: &[MatchResult]) -> Self {
        let mut summary = Self {
            exact: 0,
            variance: 0,
            je_only: 0,
            tb_only: 0,
            net_debit_diff: BigDecimal::from(0),
            net_credit_diff: BigDecimal::from(0),
        };
        for result in results {
            match result.category {
                MatchCategory::Exact => summary.exact += 1,
                MatchCategory::Variance => summary.variance += 1,
                MatchCategory::JeOnly => summary.je_only += 1,
                MatchCategory::TbOnly => summary.tb_only += 1,
            }
            // Exact rows are reconciled; their residue stays out of the net.
            if result.category != MatchCategory::Exact {
                summary.net_debit_diff += &result.debit_diff;
                summary.net_credit_diff += &result.credit_diff;
            }
        }
        summary
    }

    /// Total number of keys seen on either side
    pub fn total(&self) -> usize {
        self.exact + self.variance + self.je_only + self.tb_only
    }
}

/// Everything a run produces, handed to the external report assembler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    /// One result per key, in stable first-seen order
    pub results: Vec<MatchResult>,
    /// Row-level normalization warnings from both sides
    pub warnings: Vec<ParseWarning>,
    /// Per-category counts and net differences
    pub summary: ReconciliationSummary,
}

/// The reconciliation engine, parameterized by one configuration value
///
/// Construction validates the configuration and compiles its patterns, so
/// a `Reconciler` that exists can always run.
pub struct Reconciler {
    config: ReconciliationConfig,
    patterns: CompiledPatterns,
}

impl Reconciler {
    /// Validate the configuration and build an engine from it
    pub fn new(config: ReconciliationConfig) -> ReconResult<Self> {
        config.validate()?;
        let patterns = CompiledPatterns::compile(&config)?;
        Ok(Self { config, patterns })
    }

    /// Access the validated configuration
    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Reconcile one journal table against one trial balance table
    pub fn reconcile(
        &self,
        je: &RawTable,
        tb: &RawTable,
    ) -> ReconResult<ReconciliationOutcome> {
        self.reconcile_many(std::slice::from_ref(je), tb)
    }

    /// Reconcile several journal tables (e.g. one export per half-year)
    /// against one trial balance table
    pub fn reconcile_many(
        &self,
        je_tables: &[RawTable],
        tb: &RawTable,
    ) -> ReconResult<ReconciliationOutcome> {
        if je_tables.is_empty() {
            return Err(ReconError::Config(
                "at least one journal table is required".to_string(),
            ));
        }

        let je_resolved: Vec<ResolvedColumns> = je_tables
            .iter()
            .map(|table| self.resolve(table, SourceKind::Journal))
            .collect::<ReconResult<_>>()?;
        let tb_resolved = self.resolve(tb, SourceKind::TrialBalance)?;

        // Unless every table (each JE table and the TB) carries a real book
        // column, the key spaces cannot line up; collapse everything to the
        // default book and reconcile per account code only. A mix of
        // book-aware and book-less JE tables needs the collapse just as much
        // as a side-to-side mismatch.
        let with_book = je_resolved
            .iter()
            .chain(std::iter::once(&tb_resolved))
            .filter(|resolved| resolved.has_book())
            .count();
        let table_count = je_resolved.len() + 1;
        let book_override = if with_book > 0 && with_book < table_count {
            info!(
                with_book,
                table_count,
                default_book = %self.config.default_book,
                "book columns differ between tables, collapsing to default book"
            );
            Some(self.config.default_book.as_str())
        } else {
            None
        };

        let normalizer = RecordNormalizer::new(&self.config, &self.patterns);
        let mut warnings = Vec::new();

        let mut je_records: Vec<NormalizedRecord> = Vec::new();
        for (table, resolved) in je_tables.iter().zip(&je_resolved) {
            let (records, table_warnings) =
                normalizer.normalize(table, resolved, SourceKind::Journal, book_override);
            je_records.extend(records);
            warnings.extend(table_warnings);
        }

        let (tb_records, tb_warnings) =
            normalizer.normalize(tb, &tb_resolved, SourceKind::TrialBalance, book_override);
        warnings.extend(tb_warnings);

        let je_aggregates = aggregate(&je_records);
        let tb_aggregates = aggregate(&tb_records);
        info!(
            je_records = je_records.len(),
            je_aggregates = je_aggregates.len(),
            tb_records = tb_records.len(),
            tb_aggregates = tb_aggregates.len(),
            "prepared both sides"
        );

        let results = match_aggregates(je_aggregates, tb_aggregates, &self.config.threshold);
        let summary = ReconciliationSummary::from_results(&results);
        info!(
            exact = summary.exact,
            variance = summary.variance,
            je_only = summary.je_only,
            tb_only = summary.tb_only,
            warnings = warnings.len(),
            "reconciliation finished"
        );

        Ok(ReconciliationOutcome {
            results,
            warnings,
            summary,
        })
    }

    fn resolve(&self, table: &RawTable, kind: SourceKind) -> ReconResult<ResolvedColumns> {
        let columns = match kind {
            SourceKind::Journal => &self.config.je_columns,
            SourceKind::TrialBalance => &self.config.tb_columns,
        };
        ColumnResolver::new(
            columns,
            self.config.header_row_index,
            self.config.header_scan_limit,
        )
        .resolve(table, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn je_table(rows: &[(&str, &str, &str, &str)]) -> RawTable {
        let mut all = vec![vec![
            Cell::from("账簿"),
            Cell::from("科目"),
            Cell::from("借方本币"),
            Cell::from("贷方本币"),
        ]];
        for (book, subject, debit, credit) in rows {
            all.push(vec![
                Cell::from(*book),
                Cell::from(*subject),
                Cell::from(*debit),
                Cell::from(*credit),
            ]);
        }
        RawTable::new("je.xlsx", all)
    }

    fn tb_table(rows: &[(&str, &str, &str, &str)]) -> RawTable {
        let mut all = vec![vec![
            Cell::from("核算账簿名称"),
            Cell::from("科目编码"),
            Cell::from("本期借方"),
            Cell::from("本期贷方"),
        ]];
        for (book, code, debit, credit) in rows {
            all.push(vec![
                Cell::from(*book),
                Cell::from(*code),
                Cell::from(*debit),
                Cell::from(*credit),
            ]);
        }
        RawTable::new("tb.xlsx", all)
    }

    #[test]
    fn test_pipeline_exact_and_variance() {
        let je = je_table(&[
            ("甲", "1001\\现金", "600", "0"),
            ("甲", "1001\\现金", "400", "0"),
            ("甲", "2001\\应付", "0", "300"),
        ]);
        let tb = tb_table(&[
            ("甲", "1001", "1000.005", "0"),
            ("甲", "2001", "0", "250"),
        ]);
        let engine = Reconciler::new(ReconciliationConfig::default()).unwrap();
        let outcome = engine.reconcile(&je, &tb).unwrap();

        assert_eq!(outcome.summary.exact, 1);
        assert_eq!(outcome.summary.variance, 1);
        assert_eq!(outcome.results[0].category, MatchCategory::Exact);
        assert_eq!(outcome.results[0].debit_diff, dec("-0.005"));
        assert_eq!(outcome.results[1].category, MatchCategory::Variance);
        assert_eq!(outcome.results[1].credit_diff, dec("50"));
    }

    #[test]
    fn test_book_collapse_when_tb_has_no_book_column() {
        let je = je_table(&[("甲账簿", "1001\\现金", "100", "0")]);
        let tb = RawTable::new(
            "tb.xlsx",
            vec![
                vec![
                    Cell::from("科目编码"),
                    Cell::from("本期借方"),
                    Cell::from("本期贷方"),
                ],
                vec![Cell::from("1001"), Cell::from("100"), Cell::from("0")],
            ],
        );
        let engine = Reconciler::new(ReconciliationConfig::default()).unwrap();
        let outcome = engine.reconcile(&je, &tb).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].category, MatchCategory::Exact);
        assert_eq!(outcome.results[0].key.book, "默认账簿");
    }

    #[test]
    fn test_book_collapse_when_je_tables_disagree_about_books() {
        // One journal export carries 账簿, the other does not; the TB has
        // no book column either. All rows must land in the default book,
        // or the book-bearing journal rows would split off on their own key.
        let je_with_book = je_table(&[("甲公司", "1001\\现金", "100", "0")]);
        let je_without_book = RawTable::new(
            "je2.xlsx",
            vec![
                vec![
                    Cell::from("科目"),
                    Cell::from("借方本币"),
                    Cell::from("贷方本币"),
                ],
                vec![Cell::from("1001\\现金"), Cell::from("200"), Cell::from("0")],
            ],
        );
        let tb = RawTable::new(
            "tb.xlsx",
            vec![
                vec![
                    Cell::from("科目编码"),
                    Cell::from("本期借方"),
                    Cell::from("本期贷方"),
                ],
                vec![Cell::from("1001"), Cell::from("300"), Cell::from("0")],
            ],
        );
        let engine = Reconciler::new(ReconciliationConfig::default()).unwrap();
        let outcome = engine
            .reconcile_many(&[je_with_book, je_without_book], &tb)
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].key.book, "默认账簿");
        assert_eq!(outcome.results[0].category, MatchCategory::Exact);
    }

    #[test]
    fn test_multiple_je_tables_merge() {
        let je_h1 = je_table(&[("甲", "1001\\现金", "600", "0")]);
        let je_h2 = je_table(&[("甲", "1001\\现金", "400", "0")]);
        let tb = tb_table(&[("甲", "1001", "1000", "0")]);
        let engine = Reconciler::new(ReconciliationConfig::default()).unwrap();
        let outcome = engine
            .reconcile_many(&[je_h1, je_h2], &tb)
            .unwrap();
        assert_eq!(outcome.summary.exact, 1);
        assert_eq!(outcome.results[0].je.as_ref().unwrap().record_count, 2);
    }

    #[test]
    fn test_no_je_tables_is_config_error() {
        let tb = tb_table(&[("甲", "1001", "1", "0")]);
        let engine = Reconciler::new(ReconciliationConfig::default()).unwrap();
        let err = engine.reconcile_many(&[], &tb).unwrap_err();
        assert!(matches!(err, ReconError::Config(_)));
    }

    #[test]
    fn test_summary_nets_only_discrepancies() {
        let je = je_table(&[
            ("甲", "1001\\现金", "100", "0"),
            ("甲", "2001\\应付", "500", "0"),
        ]);
        let tb = tb_table(&[("甲", "1001", "100", "0"), ("甲", "3001", "0", "200")]);
        let engine = Reconciler::new(ReconciliationConfig::default()).unwrap();
        let outcome = engine.reconcile(&je, &tb).unwrap();
        assert_eq!(outcome.summary.exact, 1);
        assert_eq!(outcome.summary.je_only, 1);
        assert_eq!(outcome.summary.tb_only, 1);
        assert_eq!(outcome.summary.total(), 3);
        assert_eq!(outcome.summary.net_debit_diff, dec("500"));
        assert_eq!(outcome.summary.net_credit_diff, dec("-200"));
    }

    #[test]
    fn test_warnings_surface_from_both_sides() {
        let je = je_table(&[
            ("甲", "1001\\现金", "oops", "0"),
            ("甲", "1001\\现金", "100", "0"),
        ]);
        let tb = tb_table(&[("甲", "1001", "100", "N/A")]);
        let engine = Reconciler::new(ReconciliationConfig::default()).unwrap();
        let outcome = engine.reconcile(&je, &tb).unwrap();
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings.iter().any(|w| w.table == "je.xlsx"));
        assert!(outcome.warnings.iter().any(|w| w.table == "tb.xlsx"));
    }
}
