//! Console and JSON report generation.
//!
//! This module renders summaries, trends and dataset metadata for the menu
//! and for one-shot `--print` output.

use crate::error::AnalysisError;
use crate::models::{DatasetMetadata, Summary, Trends};
use crate::report::numbers::{format_count, format_currency, format_percent};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// A report section that is either a value or the error that replaced it.
///
/// Serializes as the value itself, or as `{"error": "..."}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Section<'a, T: Serialize> {
    Value(&'a T),
    Error { error: String },
}

impl<'a, T: Serialize> From<&'a Result<T, AnalysisError>> for Section<'a, T> {
    fn from(result: &'a Result<T, AnalysisError>) -> Self {
        match result {
            Ok(value) => Section::Value(value),
            Err(e) => Section::Error {
                error: e.to_string(),
            },
        }
    }
}

/// Section banner: `⭐⭐⭐ Title ⭐⭐⭐`.
pub fn banner(title: &str) -> String {
    format!("\n⭐⭐⭐ {} ⭐⭐⭐\n", title)
}

/// Render the sales summary.
pub fn render_summary(summary: &Summary) -> String {
    let mut output = banner("Sales Summary");

    output.push_str(&format!(
        "  - Total Sales: {} units\n",
        format_count(summary.total_sales)
    ));
    output.push_str(&format!(
        "  - Average Price: {}\n",
        format_currency(summary.average_price)
    ));
    output.push_str(&format!("  - Top Make Model: {}\n", summary.top_make_model));
    output.push_str(&format!(
        "  - Top Region: {}\n",
        summary.top_region.as_deref().unwrap_or("n/a")
    ));
    output.push_str(&format!(
        "  - Yearly Growth: {}\n",
        format_percent(summary.yearly_growth)
    ));

    let prices = &summary.price_distribution;
    output.push_str("\n  Price Distribution:\n");
    output.push_str(&format!("    - min: {}\n", format_currency(prices.min)));
    output.push_str(&format!("    - max: {}\n", format_currency(prices.max)));
    output.push_str(&format!("    - median: {}\n", format_currency(prices.median)));

    output
}

/// Render dataset metadata.
pub fn render_metadata(metadata: &DatasetMetadata) -> String {
    let mut output = banner("Metadata");

    output.push_str(&format!("  - Years Covered: {}\n", metadata.years_covered));
    output.push_str(&format!("  - Unique Models: {}\n", metadata.unique_models));
    output.push_str(&format!("  - Records: {}\n", metadata.record_count));
    output.push_str(&format!(
        "  - Generated: {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

/// Render the yearly trends table with make and region breakdowns.
pub fn render_trends(trends: &Trends) -> String {
    let mut output = banner("Yearly Trends");

    output.push_str("  Year   │   Units Sold\n");
    output.push_str("  ───────┼────────────\n");
    for (year, quantity) in &trends.total_by_year {
        output.push_str(&format!("  {:<6} │ {}\n", year, format_count(*quantity)));
    }
    output.push_str(&format!(
        "\n  Average growth: {}\n",
        format_percent(trends.growth_rate)
    ));

    output.push_str(&render_breakdown("Breakdown by Make", &trends.by_make));
    if !trends.by_region.is_empty() {
        output.push_str(&render_breakdown("Breakdown by Region", &trends.by_region));
    }

    output
}

fn render_breakdown(title: &str, breakdown: &BTreeMap<String, BTreeMap<i32, u64>>) -> String {
    let mut section = format!("\n  {}:\n", title);
    for (name, years) in breakdown {
        section.push_str(&format!("  - {}:\n", name));
        for (year, quantity) in years {
            section.push_str(&format!("    {}: {}\n", year, format_count(*quantity)));
        }
    }
    section
}

/// Render an aggregation result, or its error line.
pub fn render_result<T>(result: &Result<T, AnalysisError>, render: impl Fn(&T) -> String) -> String {
    match result {
        Ok(value) => render(value),
        Err(e) => format!("❌ Error: {}\n", e),
    }
}

/// Full analysis as pretty JSON.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub metadata: &'a DatasetMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Section<'a, Summary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trends: Option<Section<'a, Trends>>,
}

/// Generate a JSON report.
pub fn generate_json_report(report: &JsonReport<'_>) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
