//! Report rendering.

pub mod generator;
pub mod numbers;

pub use generator::*;
pub use numbers::{format_count, format_currency, format_percent};
