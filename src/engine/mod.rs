//! Aggregation, matching, and the reconciliation pipeline

pub mod aggregator;
pub mod core;
pub mod matcher;

pub use aggregator::*;
pub use core::*;
pub use matcher::*;
