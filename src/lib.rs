//! # Recon Core
//!
//! A ledger reconciliation library that matches journal entry (JE) exports
//! against trial balance (TB) reports from heterogeneous accounting systems.
//!
//! ## Features
//!
//! - **Schema inference**: Header detection and alias-based column resolution
//!   for real-world spreadsheet exports with title rows and renamed columns
//! - **Record normalization**: Account-code extraction and tolerant currency
//!   parsing (thousands separators, currency symbols, parenthesized negatives)
//! - **Aggregation**: Debit/credit totals per (account code, book) with
//!   summary-row and zero-activity filtering
//! - **Matching**: Full outer join of JE against TB aggregates with a
//!   configurable tolerance, classified as exact, variance, or one-sided
//! - **Voucher checks**: Sequence-gap detection and per-voucher debit/credit
//!   balance verification over journal tables
//!
//! ## Quick Start
//!
//! ```rust
//! use recon_core::{Cell, RawTable, ReconciliationConfig, Reconciler};
//!
//! let je = RawTable::new("je.xlsx", vec![
//!     vec![Cell::from("科目"), Cell::from("借方本币"), Cell::from("贷方本币")],
//!     vec![Cell::from("1001\\现金"), Cell::from("1,000.00"), Cell::from("0")],
//! ]);
//! let tb = RawTable::new("tb.xlsx", vec![
//!     vec![Cell::from("科目编码"), Cell::from("本期借方"), Cell::from("本期贷方")],
//!     vec![Cell::from("1001"), Cell::from("1000"), Cell::from("0")],
//! ]);
//!
//! let reconciler = Reconciler::new(ReconciliationConfig::default())?;
//! let outcome = reconciler.reconcile(&je, &tb)?;
//! assert_eq!(outcome.summary.exact, 1);
//! # Ok::<(), recon_core::ReconError>(())
//! ```

pub mod config;
pub mod engine;
pub mod normalize;
pub mod schema;
pub mod types;
pub mod voucher;

// Re-export commonly used types
pub use config::*;
pub use engine::*;
pub use schema::*;
pub use types::*;
pub use voucher::*;
