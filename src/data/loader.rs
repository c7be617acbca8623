//! CSV sales data loader.
//!
//! Parses sales CSV files into `SaleRecord`s. Expected columns:
//!   Year, Make, Model, Quantity, Price (required), Region (optional)
//!
//! Numeric cells may contain thousands separators (`15,000`). A blank
//! quantity becomes 0 and a blank price becomes the median of the prices
//! that are present. Rows with an unusable year, a negative or non-numeric
//! number, or a quantity that is not a whole unit count are skipped with a
//! warning.

use crate::analysis::median;
use crate::data::RecordStore;
use crate::error::LoadError;
use crate::models::SaleRecord;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns that must be present in the header row.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Year", "Make", "Model", "Quantity", "Price"];

/// A CSV row before missing values are filled.
#[derive(Debug, Deserialize)]
struct RawSaleRow {
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "Make", default)]
    make: Option<String>,
    #[serde(rename = "Model", default)]
    model: Option<String>,
    #[serde(rename = "Quantity", default, deserialize_with = "deserialize_grouped_number")]
    quantity: Option<f64>,
    #[serde(rename = "Region", default)]
    region: Option<String>,
    #[serde(rename = "Price", default, deserialize_with = "deserialize_grouped_number")]
    price: Option<f64>,
}

/// Counters describing what the loader did to the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Data rows seen, excluding the header.
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub quantities_filled: usize,
    pub prices_filled: usize,
}

/// Load sales records from a CSV reader.
pub fn load_sales<R: Read>(reader: R) -> Result<(RecordStore, LoadReport), LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| LoadError::Csv {
            line: 1,
            message: e.to_string(),
        })?
        .clone();
    validate_headers(&headers)?;

    let mut report = LoadReport::default();
    let mut rows: Vec<(RawSaleRow, i32, Option<u64>)> = Vec::new();

    for (index, result) in csv_reader.deserialize::<RawSaleRow>().enumerate() {
        let line = index as u64 + 2;
        report.rows_read += 1;

        let row = match result {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Deserialize { .. }) => {
                warn!("Skipping line {}: {}", line, e);
                report.rows_skipped += 1;
                continue;
            }
            Err(e) => {
                return Err(LoadError::Csv {
                    line,
                    message: e.to_string(),
                })
            }
        };

        let Some(year) = parse_year(&row.year) else {
            warn!("Skipping line {}: unusable year '{}'", line, row.year);
            report.rows_skipped += 1;
            continue;
        };

        if row.price.is_some_and(|p| p < 0.0) {
            warn!("Skipping line {}: negative price", line);
            report.rows_skipped += 1;
            continue;
        }

        let quantity = match row.quantity {
            Some(raw) => match whole_quantity(raw) {
                Some(q) => Some(q),
                None => {
                    warn!(
                        "Skipping line {}: quantity {} is not a non-negative whole number",
                        line, raw
                    );
                    report.rows_skipped += 1;
                    continue;
                }
            },
            None => None,
        };

        rows.push((row, year, quantity));
    }

    let mut present_prices: Vec<f64> = rows.iter().filter_map(|(row, _, _)| row.price).collect();
    let fill_price = median(&mut present_prices).unwrap_or(0.0);
    debug!("Median price used for missing values: {:.2}", fill_price);

    let records: Vec<SaleRecord> = rows
        .into_iter()
        .map(|(row, year, quantity)| {
            let quantity = match quantity {
                Some(q) => q,
                None => {
                    report.quantities_filled += 1;
                    0
                }
            };
            let price = match row.price {
                Some(p) => p,
                None => {
                    report.prices_filled += 1;
                    fill_price
                }
            };
            derive_record(year, row.make, row.model, quantity, row.region, price)
        })
        .collect();

    info!(
        "Loaded {} records ({} skipped, {} quantities and {} prices filled)",
        records.len(),
        report.rows_skipped,
        report.quantities_filled,
        report.prices_filled
    );

    Ok((RecordStore::new(records), report))
}

/// Load sales records from a CSV file path.
pub fn load_sales_file(path: &Path) -> Result<(RecordStore, LoadReport), LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_sales(file)
}

fn validate_headers(headers: &csv::StringRecord) -> Result<(), LoadError> {
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == **required))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(LoadError::MissingColumns(missing))
    }
}

/// Accepts `2023` or an ISO date such as `2023-01-01`. Years outside the
/// calendar range chrono supports are rejected.
fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(year) = raw.parse::<i32>() {
        return NaiveDate::from_ymd_opt(year, 1, 1).map(|_| year);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.year())
}

/// A quantity cell as a unit count: whole, non-negative and within `u64`.
fn whole_quantity(value: f64) -> Option<u64> {
    // u64::MAX as f64 rounds up to 2^64, which is itself out of range.
    if value < 0.0 || value.fract() != 0.0 || value >= u64::MAX as f64 {
        None
    } else {
        Some(value as u64)
    }
}

fn derive_record(
    year: i32,
    make: Option<String>,
    model: Option<String>,
    quantity: u64,
    region: Option<String>,
    price: f64,
) -> SaleRecord {
    let year_month = NaiveDate::from_ymd_opt(year, 1, 1)
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_else(|| format!("{}-01", year));

    SaleRecord {
        year,
        make: make.unwrap_or_default(),
        model: model.unwrap_or_default(),
        quantity,
        region: region.filter(|r| !r.is_empty()),
        price,
        revenue: quantity as f64 * price,
        year_month,
    }
}

/// Number deserializer tolerant of thousands separators and blank cells.
fn deserialize_grouped_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(None);
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(serde::de::Error::custom(format!(
            "expected a number, got '{}'",
            raw
        ))),
    }
}
