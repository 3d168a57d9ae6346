//! Voucher integrity checks over journal tables
//!
//! Two checks recovered from legacy close procedures: voucher numbers must
//! run consecutively within each (year, month, book, voucher type) group,
//! and every voucher's debit total must equal its credit total. The
//! holiday/workday calendar validation that sometimes accompanies these
//! checks is an external concern and not part of this crate.

use bigdecimal::{BigDecimal, RoundingMode};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::config::ReconciliationConfig;
use crate::normalize::parse_currency;
use crate::schema::{find_field, normalized_header_row, ColumnResolver, ResolvedColumns};
use crate::types::{Cell, ParseWarning, RawTable, ReconError, ReconResult, SourceKind};

/// Voucher numbers come as `财字凭证-1`, `报销字凭证_12`, `凭证12`, or bare
/// `123`; the lazy prefix leaves the shortest tail of digits as the number
static VOUCHER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)[-_]?(\d+)$").expect("hard-coded pattern compiles"));

/// A run of missing voucher numbers within one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherGap {
    /// Fiscal year, empty when the table has no year column
    pub year: String,
    /// Fiscal month, empty when the table has no month column
    pub month: String,
    /// Book the group belongs to
    pub book: String,
    /// Voucher type prefix, empty for bare numeric vouchers
    pub voucher_type: String,
    /// First missing number
    pub gap_start: i64,
    /// Last missing number
    pub gap_end: i64,
    /// How many numbers are missing
    pub missing: i64,
    /// Last voucher present before the gap, in display form
    pub before: String,
    /// First voucher present after the gap, in display form
    pub after: String,
}

/// Per-group sequencing statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherGroupStats {
    pub year: String,
    pub month: String,
    pub book: String,
    pub voucher_type: String,
    /// Smallest voucher in the group, in display form
    pub min_voucher: String,
    /// Largest voucher in the group, in display form
    pub max_voucher: String,
    /// Count of distinct voucher numbers
    pub voucher_count: usize,
    /// Number of gaps in the sequence
    pub gap_spots: usize,
    /// Total missing voucher numbers across all gaps
    pub total_missing: i64,
}

/// Outcome of the sequence check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Every detected gap, grouped-then-sequence order
    pub gaps: Vec<VoucherGap>,
    /// Statistics for every group, including gap-free ones
    pub groups: Vec<VoucherGroupStats>,
    /// Rows whose voucher number could not be parsed
    pub warnings: Vec<ParseWarning>,
}

/// A voucher whose debit and credit totals disagree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbalancedVoucher {
    pub book: String,
    pub year: String,
    pub month: String,
    /// Voucher number as it appears in the source
    pub voucher: String,
    /// Debit total, rounded to two decimal places
    pub total_debit: BigDecimal,
    /// Credit total, rounded to two decimal places
    pub total_credit: BigDecimal,
    /// Debit minus credit, rounded to two decimal places
    pub difference: BigDecimal,
}

/// Outcome of the balance check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Vouchers out of balance beyond the configured threshold
    pub unbalanced: Vec<UnbalancedVoucher>,
    /// Total distinct vouchers inspected
    pub voucher_count: usize,
    /// Rows whose amounts could not be parsed
    pub warnings: Vec<ParseWarning>,
}

impl BalanceReport {
    /// Vouchers whose totals agreed
    pub fn balanced_count(&self) -> usize {
        self.voucher_count - self.unbalanced.len()
    }
}

/// Runs the voucher checks for one configuration
pub struct VoucherChecker<'a> {
    config: &'a ReconciliationConfig,
}

/// Columns the voucher checks work with
struct VoucherLayout {
    resolved: ResolvedColumns,
    voucher: usize,
    year: Option<usize>,
    month: Option<usize>,
}

impl<'a> VoucherChecker<'a> {
    pub fn new(config: &'a ReconciliationConfig) -> Self {
        Self { config }
    }

    /// Detect gaps in voucher numbering per (year, month, book, type)
    pub fn check_gaps(&self, table: &RawTable) -> ReconResult<GapReport> {
        let layout = self.layout(table)?;
        let mut warnings = Vec::new();

        // Distinct numbers per group, sorted as we insert.
        let mut groups: IndexMap<(String, String, String, String), BTreeSet<i64>> =
            IndexMap::new();

        for (row_index, row) in table
            .rows
            .iter()
            .enumerate()
            .skip(layout.resolved.header_row + 1)
        {
            let Some(voucher_text) = cell_text(row, Some(layout.voucher)) else {
                continue;
            };
            let Some((voucher_type, number)) = split_voucher(&voucher_text) else {
                warnings.push(skip_warning(
                    table,
                    row_index,
                    &format!("unparseable voucher number '{voucher_text}'"),
                ));
                continue;
            };

            let key = (
                cell_text(row, layout.year).unwrap_or_default(),
                cell_text(row, layout.month).unwrap_or_default(),
                cell_text(row, layout.resolved.book)
                    .unwrap_or_else(|| self.config.default_book.clone()),
                voucher_type,
            );
            groups.entry(key).or_default().insert(number);
        }

        let mut gaps = Vec::new();
        let mut stats = Vec::new();
        for ((year, month, book, voucher_type), numbers) in &groups {
            let numbers: Vec<i64> = numbers.iter().copied().collect();
            let mut gap_spots = 0;
            let mut total_missing = 0;
            for pair in numbers.windows(2) {
                let (current, next) = (pair[0], pair[1]);
                if next != current + 1 {
                    gap_spots += 1;
                    total_missing += next - current - 1;
                    gaps.push(VoucherGap {
                        year: year.clone(),
                        month: month.clone(),
                        book: book.clone(),
                        voucher_type: voucher_type.clone(),
                        gap_start: current + 1,
                        gap_end: next - 1,
                        missing: next - current - 1,
                        before: display_voucher(voucher_type, current),
                        after: display_voucher(voucher_type, next),
                    });
                }
            }
            if let (Some(first), Some(last)) = (numbers.first(), numbers.last()) {
                stats.push(VoucherGroupStats {
                    year: year.clone(),
                    month: month.clone(),
                    book: book.clone(),
                    voucher_type: voucher_type.clone(),
                    min_voucher: display_voucher(voucher_type, *first),
                    max_voucher: display_voucher(voucher_type, *last),
                    voucher_count: numbers.len(),
                    gap_spots,
                    total_missing,
                });
            }
        }

        debug!(
            groups = stats.len(),
            gaps = gaps.len(),
            "voucher gap check finished"
        );
        Ok(GapReport {
            gaps,
            groups: stats,
            warnings,
        })
    }

    /// Verify that each voucher's debit total equals its credit total
    /// within the configured threshold
    pub fn check_balance(&self, table: &RawTable) -> ReconResult<BalanceReport> {
        let layout = self.layout(table)?;
        let mut warnings = Vec::new();

        let mut totals: IndexMap<(String, String, String, String), (BigDecimal, BigDecimal)> =
            IndexMap::new();

        for (row_index, row) in table
            .rows
            .iter()
            .enumerate()
            .skip(layout.resolved.header_row + 1)
        {
            let Some(voucher) = cell_text(row, Some(layout.voucher)) else {
                continue;
            };

            let debit = match amount(row, layout.resolved.debit) {
                Ok(value) => value,
                Err(reason) => {
                    warnings.push(skip_warning(table, row_index, &format!("debit: {reason}")));
                    continue;
                }
            };
            let credit = match amount(row, layout.resolved.credit) {
                Ok(value) => value,
                Err(reason) => {
                    warnings.push(skip_warning(table, row_index, &format!("credit: {reason}")));
                    continue;
                }
            };

            let key = (
                cell_text(row, layout.resolved.book)
                    .unwrap_or_else(|| self.config.default_book.clone()),
                cell_text(row, layout.year).unwrap_or_default(),
                cell_text(row, layout.month).unwrap_or_default(),
                voucher,
            );
            let entry = totals
                .entry(key)
                .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
            entry.0 += debit;
            entry.1 += credit;
        }

        let voucher_count = totals.len();
        let mut unbalanced = Vec::new();
        for ((book, year, month, voucher), (total_debit, total_credit)) in totals {
            let difference = &total_debit - &total_credit;
            if difference.abs() <= self.config.threshold {
                continue;
            }
            let rounded = difference.with_scale_round(2, RoundingMode::HalfUp);
            // Sub-cent residue that disappears at display precision is
            // floating-point noise from the source, not an imbalance.
            if rounded == BigDecimal::from(0) {
                continue;
            }
            unbalanced.push(UnbalancedVoucher {
                book,
                year,
                month,
                voucher,
                total_debit: total_debit.with_scale_round(2, RoundingMode::HalfUp),
                total_credit: total_credit.with_scale_round(2, RoundingMode::HalfUp),
                difference: rounded,
            });
        }

        debug!(
            vouchers = voucher_count,
            unbalanced = unbalanced.len(),
            "voucher balance check finished"
        );
        Ok(BalanceReport {
            unbalanced,
            voucher_count,
            warnings,
        })
    }

    fn layout(&self, table: &RawTable) -> ReconResult<VoucherLayout> {
        let resolver = ColumnResolver::new(
            &self.config.je_columns,
            self.config.header_row_index,
            self.config.header_scan_limit,
        );
        let resolved = resolver.resolve(table, SourceKind::Journal)?;
        let header = normalized_header_row(&table.rows[resolved.header_row]);

        let columns = &self.config.voucher_columns;
        let voucher = find_field(&table.name, &header, &columns.voucher, "voucher")?
            .ok_or_else(|| ReconError::MissingColumn {
                table: table.name.clone(),
                field: "voucher".to_string(),
                aliases: columns.voucher.aliases.join(", "),
            })?;
        let year = find_field(&table.name, &header, &columns.year, "year")?;
        let month = find_field(&table.name, &header, &columns.month, "month")?;

        Ok(VoucherLayout {
            resolved,
            voucher,
            year,
            month,
        })
    }
}

fn cell_text(row: &[Cell], column: Option<usize>) -> Option<String> {
    row.get(column?).and_then(|cell| cell.as_text())
}

fn amount(row: &[Cell], column: Option<usize>) -> Result<BigDecimal, String> {
    match column {
        Some(col) => parse_currency(row.get(col).unwrap_or(&Cell::Empty)).map_err(|e| e.to_string()),
        None => Ok(BigDecimal::from(0)),
    }
}

/// Split a voucher number into (type prefix, sequence number)
fn split_voucher(text: &str) -> Option<(String, i64)> {
    let captures = VOUCHER_PATTERN.captures(text.trim())?;
    let prefix = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    let number: i64 = captures.get(2)?.as_str().parse().ok()?;
    Some((prefix.to_string(), number))
}

fn display_voucher(voucher_type: &str, number: i64) -> String {
    if voucher_type.is_empty() {
        number.to_string()
    } else {
        format!("{voucher_type}-{number}")
    }
}

fn skip_warning(table: &RawTable, row: usize, reason: &str) -> ParseWarning {
    warn!(table = %table.name, row, reason, "voucher row skipped");
    ParseWarning {
        table: table.name.clone(),
        row,
        reason: reason.to_string(),
    }
}
