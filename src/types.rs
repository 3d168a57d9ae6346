//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single spreadsheet cell as handed over by the external file reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// Blank cell
    Empty,
    /// Textual cell content
    Text(String),
    /// Numeric cell content
    Number(f64),
}

impl Cell {
    /// Cell content as trimmed text; `None` for blank cells
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Cell::Number(n) => Some(n.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// An in-memory table of raw cells, header position unknown
///
/// Produced by the external spreadsheet reader. The `name` identifies the
/// source file or sheet in errors and warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// File or sheet identity used in diagnostics
    pub name: String,
    /// Ordered rows of ordered cells
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Create a named table from rows of cells
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Number of rows including any header rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Which side of the reconciliation a table belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Journal Entry ledger: individual transaction lines
    Journal,
    /// Trial Balance: per-account debit/credit totals
    TrialBalance,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Journal => write!(f, "JE"),
            SourceKind::TrialBalance => write!(f, "TB"),
        }
    }
}

/// One normalized ledger line: canonical code, book, and non-negative amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Canonical account code extracted from the source cell
    pub account_code: String,
    /// Book (sub-ledger) the record belongs to
    pub book: String,
    /// Debit amount, never negative
    pub debit: BigDecimal,
    /// Credit amount, never negative
    pub credit: BigDecimal,
    /// Zero-based row index within the source table
    pub source_row: usize,
}

/// Grouping key for aggregation and matching
///
/// Equality and hashing compare trimmed, case-folded text so that
/// "1001 " and "1001" (or mixed-case alphanumeric codes) land in the same
/// group, while the stored text keeps its original casing for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateKey {
    /// Account code component
    pub account_code: String,
    /// Book component
    pub book: String,
}

impl AggregateKey {
    /// Build a key, trimming both components
    pub fn new(account_code: impl Into<String>, book: impl Into<String>) -> Self {
        let account_code: String = account_code.into();
        let book: String = book.into();
        Self {
            account_code: account_code.trim().to_string(),
            book: book.trim().to_string(),
        }
    }

    fn folded(&self) -> (String, String) {
        (
            self.account_code.to_lowercase(),
            self.book.to_lowercase(),
        )
    }
}

impl PartialEq for AggregateKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded() == other.folded()
    }
}

impl Eq for AggregateKey {}

impl Hash for AggregateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.book, self.account_code)
    }
}

/// Summed debit/credit totals for one (account, book) key
///
/// Built once per source by the aggregator; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Grouping key
    pub key: AggregateKey,
    /// Sum of debit amounts across grouped records
    pub total_debit: BigDecimal,
    /// Sum of credit amounts across grouped records
    pub total_credit: BigDecimal,
    /// Number of source records behind this aggregate
    pub record_count: usize,
}

/// Discrepancy category for one matched key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchCategory {
    /// Present on both sides, differences within tolerance
    Exact,
    /// Present on both sides, at least one difference beyond tolerance
    Variance,
    /// Present only in the journal
    JeOnly,
    /// Present only in the trial balance
    TbOnly,
}

impl fmt::Display for MatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchCategory::Exact => write!(f, "exact match"),
            MatchCategory::Variance => write!(f, "variance"),
            MatchCategory::JeOnly => write!(f, "JE only"),
            MatchCategory::TbOnly => write!(f, "TB only"),
        }
    }
}

/// Outcome of matching one key across the two sides
///
/// At most one of `je`/`tb` is absent, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The matched key
    pub key: AggregateKey,
    /// JE-side aggregate, absent for TB-only keys
    pub je: Option<Aggregate>,
    /// TB-side aggregate, absent for JE-only keys
    pub tb: Option<Aggregate>,
    /// JE total debit minus TB total debit
    pub debit_diff: BigDecimal,
    /// JE total credit minus TB total credit
    pub credit_diff: BigDecimal,
    /// Discrepancy classification
    pub category: MatchCategory,
}

/// Non-fatal row-level normalization problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// Table the row came from
    pub table: String,
    /// Zero-based row index within the source table
    pub row: usize,
    /// What went wrong
    pub reason: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.table, self.row, self.reason)
    }
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{table}: missing required column '{field}' (tried aliases: {aliases})")]
    MissingColumn {
        table: String,
        field: String,
        aliases: String,
    },
    #[error(
        "{table}: column index {index} for '{field}' is out of range (header has {width} columns)"
    )]
    ColumnIndexOutOfRange {
        table: String,
        field: String,
        index: usize,
        width: usize,
    },
    #[error("{table}: no header row found within the first {scanned} rows")]
    HeaderNotFound { table: String, scanned: usize },
    #[error("{table}: configured header row {index} is out of range (table has {rows} rows)")]
    HeaderRowOutOfRange {
        table: String,
        index: usize,
        rows: usize,
    },
}

/// Result type for engine operations
pub type ReconResult<T> = Result<T, ReconError>;
