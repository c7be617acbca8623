//! Analysis modules.
//!
//! Aggregations over the record store: summary, trends and growth.

pub mod aggregator;

pub use aggregator::*;
