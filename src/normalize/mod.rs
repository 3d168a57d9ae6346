//! Record normalization: canonical codes, decimal amounts, book assignment

pub mod normalizer;
pub mod parsers;

pub use normalizer::*;
pub use parsers::*;
