//! Schema inference over ambiguous tabular input

pub mod resolver;

pub use resolver::*;
