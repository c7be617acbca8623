//! Sales aggregation and statistics.
//!
//! This module computes the summary, the yearly trend breakdowns and the
//! growth rate over a record store. Every result is recomputed from the
//! records on each call.

use crate::data::RecordStore;
use crate::error::AnalysisError;
use crate::models::{
    DatasetMetadata, PriceDistribution, SaleRecord, Summary, TopMakeModel, Trends,
};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error};

/// Compute summary statistics for the whole store.
///
/// All-or-nothing: any failure yields an error instead of a partial summary.
/// A store without usable make/model rows still succeeds, with the sentinel
/// variant in `top_make_model`.
pub fn summary(store: &RecordStore) -> Result<Summary, AnalysisError> {
    let result = compute_summary(store.records());
    if let Err(ref e) = result {
        error!("Summary generation failed: {}", e);
    }
    result
}

fn compute_summary(records: &[SaleRecord]) -> Result<Summary, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }
    check_finite(records)?;

    let total_sales = records
        .iter()
        .try_fold(0u64, |total, r| checked_sum(total, r.quantity))?;
    let mut prices: Vec<f64> = records.iter().map(|r| r.price).collect();
    let average_price = prices.iter().sum::<f64>() / prices.len() as f64;

    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let median = median(&mut prices).unwrap_or_default();

    let yearly = total_by_year(records)?;

    Ok(Summary {
        total_sales,
        average_price,
        top_make_model: top_make_model(records),
        top_region: top_region(records),
        yearly_growth: growth_rate(&yearly.values().copied().collect::<Vec<_>>()),
        price_distribution: PriceDistribution { min, max, median },
    })
}

/// Compute per-year quantity breakdowns and the growth rate.
pub fn trends(store: &RecordStore) -> Result<Trends, AnalysisError> {
    let result = compute_trends(store.records());
    if let Err(ref e) = result {
        error!("Trend analysis failed: {}", e);
    }
    result
}

fn compute_trends(records: &[SaleRecord]) -> Result<Trends, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    let total_by_year = total_by_year(records)?;

    let mut by_make: BTreeMap<String, BTreeMap<i32, u64>> = BTreeMap::new();
    let mut by_region: BTreeMap<String, BTreeMap<i32, u64>> = BTreeMap::new();

    for record in records {
        if !record.make.is_empty() {
            let slot = by_make
                .entry(record.make.clone())
                .or_default()
                .entry(record.year)
                .or_default();
            *slot = checked_sum(*slot, record.quantity)?;
        }
        if let Some(ref region) = record.region {
            let slot = by_region
                .entry(region.clone())
                .or_default()
                .entry(record.year)
                .or_default();
            *slot = checked_sum(*slot, record.quantity)?;
        }
    }

    let growth = growth_rate(&total_by_year.values().copied().collect::<Vec<_>>());
    debug!(
        "Trends over {} years, growth {:.4}",
        total_by_year.len(),
        growth
    );

    Ok(Trends {
        total_by_year,
        by_make,
        by_region,
        growth_rate: growth,
    })
}

/// Mean year-over-year fractional change of a year-ordered sequence of totals.
///
/// Returns 0.0 for fewer than two periods. A step whose previous total is
/// zero contributes 0.0 to the mean.
pub fn growth_rate(totals: &[u64]) -> f64 {
    if totals.len() < 2 {
        return 0.0;
    }

    let changes: Vec<f64> = totals
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (pair[0] as f64, pair[1] as f64);
            if prev == 0.0 {
                0.0
            } else {
                (curr - prev) / prev
            }
        })
        .collect();

    changes.iter().sum::<f64>() / changes.len() as f64
}

/// The (make, model) pair with the largest summed quantity.
///
/// Ties go to the pair that sorts first. Group totals saturate; `summary`
/// has already rejected overflowing quantities before calling this.
pub fn top_make_model(records: &[SaleRecord]) -> TopMakeModel {
    if records.is_empty() {
        return TopMakeModel::NoData;
    }

    let mut grouped: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for record in records.iter().filter(|r| r.has_identity()) {
        let slot = grouped
            .entry((record.make.as_str(), record.model.as_str()))
            .or_default();
        *slot = slot.saturating_add(record.quantity);
    }

    match max_by_quantity(grouped) {
        Some(((make, model), quantity)) => TopMakeModel::Found {
            make: make.to_string(),
            model: model.to_string(),
            quantity,
        },
        None => TopMakeModel::NoValidData,
    }
}

/// The region with the largest summed quantity, ties to the first sorted.
pub fn top_region(records: &[SaleRecord]) -> Option<String> {
    let mut grouped: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records {
        if let Some(ref region) = record.region {
            let slot = grouped.entry(region.as_str()).or_default();
            *slot = slot.saturating_add(record.quantity);
        }
    }
    max_by_quantity(grouped).map(|(region, _)| region.to_string())
}

/// Describe the dataset: years covered, distinct models, record count.
pub fn metadata(store: &RecordStore) -> DatasetMetadata {
    let records = store.records();
    let years_covered = match (
        records.iter().map(|r| r.year).min(),
        records.iter().map(|r| r.year).max(),
    ) {
        (Some(first), Some(last)) => format!("{} to {}", first, last),
        _ => "n/a".to_string(),
    };

    let unique_models = records
        .iter()
        .filter(|r| !r.model.is_empty())
        .map(|r| r.model.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    DatasetMetadata {
        years_covered,
        unique_models,
        record_count: records.len(),
        generated_at: Utc::now(),
    }
}

/// Median of a slice, sorting it in place. `None` when empty.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn total_by_year(records: &[SaleRecord]) -> Result<BTreeMap<i32, u64>, AnalysisError> {
    let mut yearly: BTreeMap<i32, u64> = BTreeMap::new();
    for record in records {
        let slot = yearly.entry(record.year).or_default();
        *slot = checked_sum(*slot, record.quantity)?;
    }
    Ok(yearly)
}

fn checked_sum(total: u64, quantity: u64) -> Result<u64, AnalysisError> {
    total.checked_add(quantity).ok_or(AnalysisError::Overflow {
        field: "quantity total",
    })
}

/// First entry holding the maximum value, in key order.
fn max_by_quantity<K: Ord>(grouped: BTreeMap<K, u64>) -> Option<(K, u64)> {
    let mut best: Option<(K, u64)> = None;
    for (key, quantity) in grouped {
        match best {
            Some((_, top)) if top >= quantity => {}
            _ => best = Some((key, quantity)),
        }
    }
    best
}

fn check_finite(records: &[SaleRecord]) -> Result<(), AnalysisError> {
    for (index, record) in records.iter().enumerate() {
        if !record.price.is_finite() {
            return Err(AnalysisError::NonFinite {
                field: "price",
                index,
            });
        }
    }
    Ok(())
}
