//! Reconciliation configuration: column aliases, tolerances, and filters
//!
//! Per-company wrapper scripts in legacy reconciliation tooling are really
//! configuration presets over one engine. This module models those presets
//! as a single deserializable value so a preset can live in a JSON file and
//! parameterize the engine without duplicated logic.

use bigdecimal::BigDecimal;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::{ReconError, ReconResult};

/// How one logical field maps onto the physical table
///
/// Aliases are tried in order against the detected header row. An explicit
/// `index` takes precedence over alias matching unconditionally; it is the
/// escape hatch for duplicate header names, where alias lookup would always
/// land on the first occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Acceptable header names, in priority order
    pub aliases: Vec<String>,
    /// Explicit zero-based column position, overriding alias matching
    #[serde(default)]
    pub index: Option<usize>,
}

impl ColumnSpec {
    /// Spec matching any of the given header names
    pub fn named<S: Into<String>>(aliases: impl IntoIterator<Item = S>) -> Self {
        Self {
            aliases: aliases.into_iter().map(Into::into).collect(),
            index: None,
        }
    }

    /// Spec pinned to an explicit column position
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// Logical-field mapping for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumns {
    /// Account code (JE: the subject column carrying `code\name\...` text)
    pub account_code: ColumnSpec,
    /// Debit amount column
    pub debit: ColumnSpec,
    /// Credit amount column
    pub credit: ColumnSpec,
    /// Book column; optional, falls back to the configured default book
    #[serde(default)]
    pub book: Option<ColumnSpec>,
}

impl TableColumns {
    /// Default mapping for journal exports
    pub fn journal_default() -> Self {
        Self {
            account_code: ColumnSpec::named(["科目", "科目编码"]),
            debit: ColumnSpec::named(["借方本币", "借方金额"]),
            credit: ColumnSpec::named(["贷方本币", "贷方金额"]),
            book: Some(ColumnSpec::named(["账簿"])),
        }
    }

    /// Default mapping for trial balance exports
    pub fn trial_balance_default() -> Self {
        Self {
            account_code: ColumnSpec::named(["科目编码"]),
            debit: ColumnSpec::named(["本期借方", "本期借方发生", "借方累计", "借方本币"]),
            credit: ColumnSpec::named(["本期贷方", "本期贷方发生", "贷方累计", "贷方本币"]),
            book: Some(ColumnSpec::named(["核算账簿名称", "主体账簿", "账簿"])),
        }
    }
}

/// Column mapping for the voucher integrity checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherColumns {
    /// Voucher number column
    pub voucher: ColumnSpec,
    /// Fiscal year column
    pub year: ColumnSpec,
    /// Fiscal month column; month values stay opaque text ("12A" is legal)
    pub month: ColumnSpec,
}

impl Default for VoucherColumns {
    fn default() -> Self {
        Self {
            voucher: ColumnSpec::named(["凭证号"]),
            year: ColumnSpec::named(["年"]),
            month: ColumnSpec::named(["月"]),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Maximum absolute JE/TB difference still classified as a match
    pub threshold: BigDecimal,
    /// Book assigned when no book column resolves
    pub default_book: String,
    /// Explicit header row index, skipping detection when set
    pub header_row_index: Option<usize>,
    /// How many leading rows header detection scans
    pub header_scan_limit: usize,
    /// Column mapping for journal tables
    pub je_columns: TableColumns,
    /// Column mapping for trial balance tables
    pub tb_columns: TableColumns,
    /// Column mapping for the voucher checks
    pub voucher_columns: VoucherColumns,
    /// Substring/`*`-wildcard filters restricting which account codes
    /// participate; empty means all codes
    pub target_patterns: Vec<String>,
    /// Regex extracting the code token from account cells; `None` uses the
    /// built-in leading-alphanumeric pattern
    pub account_code_pattern: Option<String>,
    /// Account codes dropped outright (summary/footer artifacts)
    pub filter_invalid_codes: Vec<String>,
    /// Substrings marking rows to drop (print footers and the like)
    pub filter_patterns: Vec<String>,
    /// Extra substrings treated as summary rows beyond the built-in set
    pub summary_patterns: Vec<String>,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            threshold: BigDecimal::from_str("0.01").unwrap_or_default(),
            default_book: "默认账簿".to_string(),
            header_row_index: None,
            header_scan_limit: 10,
            je_columns: TableColumns::journal_default(),
            tb_columns: TableColumns::trial_balance_default(),
            voucher_columns: VoucherColumns::default(),
            target_patterns: Vec::new(),
            account_code_pattern: None,
            filter_invalid_codes: vec![
                "总计".to_string(),
                "核算账簿累计".to_string(),
                "合计".to_string(),
                "nan".to_string(),
                "币种累计".to_string(),
                "科目编码".to_string(),
            ],
            filter_patterns: vec![
                "币种累计".to_string(),
                "核算单位".to_string(),
                "制单人".to_string(),
                "打印时间".to_string(),
            ],
            summary_patterns: Vec::new(),
        }
    }
}

impl ReconciliationConfig {
    /// Validate the configuration before any table processing
    pub fn validate(&self) -> ReconResult<()> {
        if self.threshold < BigDecimal::from(0) {
            return Err(ReconError::Config(format!(
                "threshold must not be negative, got {}",
                self.threshold
            )));
        }
        if self.header_scan_limit == 0 {
            return Err(ReconError::Config(
                "header_scan_limit must be at least 1".to_string(),
            ));
        }
        if let Some(pattern) = &self.account_code_pattern {
            Regex::new(pattern).map_err(|e| {
                ReconError::Config(format!("invalid account_code_pattern '{pattern}': {e}"))
            })?;
        }
        for spec in [
            &self.je_columns.account_code,
            &self.je_columns.debit,
            &self.je_columns.credit,
            &self.tb_columns.account_code,
            &self.tb_columns.debit,
            &self.tb_columns.credit,
        ] {
            if spec.aliases.is_empty() && spec.index.is_none() {
                return Err(ReconError::Config(
                    "a required column spec has neither aliases nor an index".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReconciliationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_book, "默认账簿");
        assert_eq!(config.header_scan_limit, 10);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let config = ReconciliationConfig {
            threshold: BigDecimal::from(-1),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ReconError::Config(_)));
    }

    #[test]
    fn test_bad_code_pattern_rejected() {
        let config = ReconciliationConfig {
            account_code_pattern: Some("[unclosed".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json_preset() {
        let json = r#"{
            "threshold": "0.05",
            "default_book": "集团账簿",
            "target_patterns": ["1001*"],
            "tb_columns": {
                "account_code": { "aliases": ["科目编码"] },
                "debit": { "aliases": ["本期借方"], "index": 5 },
                "credit": { "aliases": ["本期贷方"], "index": 7 }
            }
        }"#;
        let config: ReconciliationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.default_book, "集团账簿");
        assert_eq!(config.tb_columns.debit.index, Some(5));
        // Untouched sections keep their defaults
        assert_eq!(config.header_scan_limit, 10);
    }
}
