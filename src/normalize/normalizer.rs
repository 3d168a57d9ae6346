//! Row-by-row normalization of resolved tables
//!
//! A bad row never aborts a run: per-row problems become [`ParseWarning`]s
//! and the row is excluded from aggregation while processing continues.

use bigdecimal::BigDecimal;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::ReconciliationConfig;
use crate::normalize::parsers::{extract_account_code, parse_currency, DEFAULT_CODE_PATTERN};
use crate::schema::ResolvedColumns;
use crate::types::{Cell, NormalizedRecord, ParseWarning, RawTable, ReconError, ReconResult, SourceKind};

/// Trial balance footer rows carrying subtotals rather than accounts
const SUMMARY_KEYWORDS: [&str; 4] = ["合计", "小计", "总计", "汇总"];

/// Account-code filter compiled from a target pattern
enum TargetMatcher {
    /// Plain substring containment
    Substring(String),
    /// `*`-wildcard pattern, anchored at both ends
    Wildcard(Regex),
}

impl TargetMatcher {
    fn matches(&self, code: &str) -> bool {
        match self {
            TargetMatcher::Substring(s) => code.contains(s.as_str()),
            TargetMatcher::Wildcard(re) => re.is_match(code),
        }
    }
}

/// Patterns compiled once per run and shared across tables
pub struct CompiledPatterns {
    code: Regex,
    targets: Vec<TargetMatcher>,
}

impl CompiledPatterns {
    /// Compile the configured patterns, failing fast on invalid regex
    pub fn compile(config: &ReconciliationConfig) -> ReconResult<Self> {
        let code = match &config.account_code_pattern {
            Some(pattern) => Regex::new(pattern).map_err(|e| {
                ReconError::Config(format!("invalid account_code_pattern '{pattern}': {e}"))
            })?,
            None => DEFAULT_CODE_PATTERN.clone(),
        };

        let mut targets = Vec::with_capacity(config.target_patterns.len());
        for pattern in &config.target_patterns {
            if pattern.contains('*') {
                let escaped = regex::escape(pattern).replace(r"\*", ".*");
                let re = Regex::new(&format!("^{escaped}$")).map_err(|e| {
                    ReconError::Config(format!("invalid target pattern '{pattern}': {e}"))
                })?;
                targets.push(TargetMatcher::Wildcard(re));
            } else {
                targets.push(TargetMatcher::Substring(pattern.clone()));
            }
        }

        Ok(Self { code, targets })
    }

    /// Whether a code participates given the target patterns (empty = all)
    fn code_targeted(&self, code: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t.matches(code))
    }
}

/// Converts resolved table rows into [`NormalizedRecord`]s
pub struct RecordNormalizer<'a> {
    config: &'a ReconciliationConfig,
    patterns: &'a CompiledPatterns,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(config: &'a ReconciliationConfig, patterns: &'a CompiledPatterns) -> Self {
        Self { config, patterns }
    }

    /// Normalize every data row following the header
    ///
    /// `book_override` forces all records into one book; the orchestrator
    /// uses it when only one of the two tables carries a real book column,
    /// so reconciliation collapses to account codes only.
    pub fn normalize(
        &self,
        table: &RawTable,
        resolved: &ResolvedColumns,
        kind: SourceKind,
        book_override: Option<&str>,
    ) -> (Vec<NormalizedRecord>, Vec<ParseWarning>) {
        let mut records = Vec::new();
        let mut warnings = Vec::new();

        for (row_index, row) in table
            .rows
            .iter()
            .enumerate()
            .skip(resolved.header_row + 1)
        {
            if row_is_blank(row) {
                continue;
            }

            let account_cell = row.get(resolved.account_code).unwrap_or(&Cell::Empty);
            let Some(account_text) = account_cell.as_text() else {
                warnings.push(self.warn(table, row_index, "blank account code"));
                continue;
            };

            let code = extract_account_code(&account_text, &self.patterns.code);
            if code.is_empty() {
                warnings.push(self.warn(table, row_index, "empty account code after extraction"));
                continue;
            }

            // Summary/footer rows are expected in TB exports; drop silently.
            if kind == SourceKind::TrialBalance && self.is_summary_row(&code) {
                continue;
            }

            if !self.patterns.code_targeted(&code) {
                continue;
            }

            let debit = match self.amount_at(row, resolved.debit) {
                Ok(value) => value,
                Err(reason) => {
                    warnings.push(self.warn(table, row_index, &format!("debit: {reason}")));
                    continue;
                }
            };
            let credit = match self.amount_at(row, resolved.credit) {
                Ok(value) => value,
                Err(reason) => {
                    warnings.push(self.warn(table, row_index, &format!("credit: {reason}")));
                    continue;
                }
            };

            // A negative debit is a credit (and vice versa); netting keeps
            // the non-negativity invariant without losing the amount.
            let (debit, credit) = net_signed_amounts(debit, credit);

            // Rows contributing nothing to either side are noise.
            let zero = BigDecimal::from(0);
            if debit == zero && credit == zero {
                continue;
            }

            let book = match book_override {
                Some(book) => book.to_string(),
                None => resolved
                    .book
                    .and_then(|col| row.get(col))
                    .and_then(|cell| cell.as_text())
                    .unwrap_or_else(|| self.config.default_book.clone()),
            };

            records.push(NormalizedRecord {
                account_code: code,
                book,
                debit,
                credit,
                source_row: row_index,
            });
        }

        debug!(
            table = %table.name,
            records = records.len(),
            warnings = warnings.len(),
            "normalized table"
        );
        (records, warnings)
    }

    fn amount_at(&self, row: &[Cell], column: Option<usize>) -> Result<BigDecimal, String> {
        match column {
            Some(col) => parse_currency(row.get(col).unwrap_or(&Cell::Empty))
                .map_err(|e| e.to_string()),
            None => Ok(BigDecimal::from(0)),
        }
    }

    fn is_summary_row(&self, code: &str) -> bool {
        if SUMMARY_KEYWORDS.iter().any(|kw| code.contains(kw)) {
            return true;
        }
        if self.config.filter_invalid_codes.iter().any(|c| c == code) {
            return true;
        }
        self.config
            .filter_patterns
            .iter()
            .chain(self.config.summary_patterns.iter())
            .any(|p| code.contains(p.as_str()))
    }

    fn warn(&self, table: &RawTable, row: usize, reason: &str) -> ParseWarning {
        warn!(table = %table.name, row, reason, "row skipped");
        ParseWarning {
            table: table.name.clone(),
            row,
            reason: reason.to_string(),
        }
    }
}

fn row_is_blank(row: &[Cell]) -> bool {
    row.iter().all(|cell| cell.as_text().is_none())
}

fn net_signed_amounts(debit: BigDecimal, credit: BigDecimal) -> (BigDecimal, BigDecimal) {
    let zero = BigDecimal::from(0);
    let (mut d, mut c) = (zero.clone(), zero.clone());
    if debit >= zero {
        d += debit;
    } else {
        c += -debit;
    }
    if credit >= zero {
        c += credit;
    } else {
        d += -credit;
    }
    (d, c)
}
