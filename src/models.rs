//! Data models for the sales analyzer.
//!
//! This module contains the record type produced by the loader and the
//! derived aggregates computed from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One row of sales data after missing values were filled and derived
/// fields computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Calendar year of the sale.
    pub year: i32,
    /// Manufacturer. Empty when the cell was blank.
    pub make: String,
    /// Model name. Empty when the cell was blank.
    pub model: String,
    /// Units sold.
    pub quantity: u64,
    /// Sales region, if the dataset has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Unit price.
    pub price: f64,
    /// `quantity * price`.
    pub revenue: f64,
    /// Period key, `YYYY-MM` of the first month of `year`.
    pub year_month: String,
}

impl SaleRecord {
    /// Whether the row identifies a (make, model) pair.
    pub fn has_identity(&self) -> bool {
        !self.make.is_empty() && !self.model.is_empty()
    }
}

/// Min, max and median of the price column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceDistribution {
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// The best selling (make, model) pair, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TopMakeModel {
    Found {
        make: String,
        model: String,
        quantity: u64,
    },
    /// No records at all.
    NoData,
    /// Records exist but none has a make and model.
    NoValidData,
}

impl fmt::Display for TopMakeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopMakeModel::Found { make, model, .. } => write!(f, "{} {}", make, model),
            TopMakeModel::NoData => write!(f, "No data available"),
            TopMakeModel::NoValidData => write!(f, "No valid data available"),
        }
    }
}

/// Summary statistics over the whole record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Sum of all quantities.
    pub total_sales: u64,
    /// Mean unit price.
    pub average_price: f64,
    pub top_make_model: TopMakeModel,
    /// Region with the largest summed quantity. `None` when the dataset
    /// carries no region values.
    pub top_region: Option<String>,
    /// Mean year-over-year change of total quantity, as a fraction.
    pub yearly_growth: f64,
    pub price_distribution: PriceDistribution,
}

/// Per-year breakdowns of quantity sold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    /// Year -> total quantity.
    pub total_by_year: BTreeMap<i32, u64>,
    /// Make -> year -> quantity.
    pub by_make: BTreeMap<String, BTreeMap<i32, u64>>,
    /// Region -> year -> quantity.
    pub by_region: BTreeMap<String, BTreeMap<i32, u64>>,
    /// Mean year-over-year change of `total_by_year`, as a fraction.
    pub growth_rate: f64,
}

/// Descriptive information about the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// e.g. `"2019 to 2023"`.
    pub years_covered: String,
    pub unique_models: usize,
    pub record_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_make_model_display() {
        let found = TopMakeModel::Found {
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            quantity: 10,
        };
        assert_eq!(found.to_string(), "Toyota Camry");
        assert_eq!(TopMakeModel::NoData.to_string(), "No data available");
        assert_eq!(
            TopMakeModel::NoValidData.to_string(),
            "No valid data available"
        );
    }

    #[test]
    fn test_has_identity() {
        let mut record = SaleRecord {
            year: 2023,
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            quantity: 1,
            region: None,
            price: 1.0,
            revenue: 1.0,
            year_month: "2023-01".to_string(),
        };
        assert!(record.has_identity());

        record.model.clear();
        assert!(!record.has_identity());
    }
}
