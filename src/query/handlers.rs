//! Query handlers.
//!
//! Comparison and ranking are computed from the records. Projection is
//! either extrapolated from the growth rate or delegated to the LLM, and
//! general questions go to the LLM unless they can be answered from the
//! summary.

use crate::analysis::{summary, trends};
use crate::config::{AnalysisConfig, ProjectionMode};
use crate::data::RecordStore;
use crate::error::{AnalysisError, QueryError};
use crate::llm::LlmGateway;
use crate::models::Trends;
use crate::query::router::{RankingMetric, RankingRequest};
use crate::report::{format_count, format_currency, format_percent, Section};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What a handler may read.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    pub store: &'a RecordStore,
    pub gateway: Option<&'a LlmGateway>,
    pub settings: &'a AnalysisConfig,
}

/// Answer a projection question.
///
/// Without a gateway the extrapolation is used whatever the configured mode.
pub async fn handle_projection(ctx: QueryContext<'_>) -> Result<String, QueryError> {
    match (ctx.settings.projection_mode, ctx.gateway) {
        (ProjectionMode::Llm, Some(gateway)) => {
            let excerpt = serde_json::to_string(ctx.store.head(ctx.settings.projection_sample_rows))?;
            let task = format!(
                "Generate sales projections based on: {}\nFormat response as:\n📈 {}-Year Projection\n------------------------\n[content]",
                excerpt, ctx.settings.projection_years
            );
            Ok(gateway.execute(&task).await)
        }
        _ => {
            let trends = trends(ctx.store)?;
            Ok(render_projection(&trends, ctx.settings.projection_years))
        }
    }
}

/// Projected total quantity for each of the `years` years after the last
/// known one, compounding the average growth rate.
pub fn extrapolate(trends: &Trends, years: u32) -> Result<Vec<(i32, u64)>, AnalysisError> {
    let (&last_year, &last_quantity) = trends
        .total_by_year
        .iter()
        .next_back()
        .ok_or(AnalysisError::EmptyDataset)?;

    let factor = 1.0 + trends.growth_rate;
    (1..=years)
        .map(|ahead| -> Result<(i32, u64), AnalysisError> {
            let overflow = AnalysisError::Overflow {
                field: "projected year",
            };
            let ahead = i32::try_from(ahead).map_err(|_| overflow.clone())?;
            let year = last_year.checked_add(ahead).ok_or(overflow)?;
            let projected = (last_quantity as f64 * factor.powi(ahead)).floor();
            Ok((year, projected.max(0.0) as u64))
        })
        .collect()
}

fn render_projection(trends: &Trends, years: u32) -> String {
    let projections = match extrapolate(trends, years) {
        Ok(p) => p,
        Err(e) => return format!("Could not generate projection: {}", e),
    };

    let mut lines = vec![
        format!("📈 {}-Year Sales Projection", years),
        "------------------------".to_string(),
        format!(
            "Based on historical growth rate: {}",
            format_percent(trends.growth_rate)
        ),
        "Projected annual sales:".to_string(),
    ];
    for (year, quantity) in projections {
        lines.push(format!("- {}: {} units", year, format_count(quantity)));
    }
    lines.join("\n")
}

/// Totals for one make.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MakeStats {
    pub make: String,
    pub total_quantity: u64,
    pub average_price: f64,
}

/// Makes whose name appears in `query`, ignoring case, in order of first
/// appearance in the data.
pub fn mentioned_makes<'a>(store: &'a RecordStore, query: &str) -> Vec<&'a str> {
    let lower = query.to_lowercase();
    store
        .distinct_makes()
        .into_iter()
        .filter(|make| lower.contains(&make.to_lowercase()))
        .collect()
}

/// Stats for every make mentioned in `query`, or `None` with fewer than two.
pub fn compare(store: &RecordStore, query: &str) -> Result<Option<Vec<MakeStats>>, AnalysisError> {
    let targets = mentioned_makes(store, query);
    if targets.len() < 2 {
        return Ok(None);
    }

    targets
        .into_iter()
        .map(|make| -> Result<MakeStats, AnalysisError> {
            let (count, quantity, price_sum) = store.for_make(make).try_fold(
                (0usize, 0u64, 0.0f64),
                |(n, q, p), r| {
                    let q = q.checked_add(r.quantity).ok_or(AnalysisError::Overflow {
                        field: "quantity total",
                    })?;
                    Ok::<_, AnalysisError>((n + 1, q, p + r.price))
                },
            )?;
            Ok(MakeStats {
                make: make.to_string(),
                total_quantity: quantity,
                average_price: if count == 0 { 0.0 } else { price_sum / count as f64 },
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Answer a comparison question.
pub fn handle_comparison(store: &RecordStore, query: &str) -> Result<String, QueryError> {
    let Some(stats) = compare(store, query)? else {
        return Ok("Could not identify two models/makes to compare".to_string());
    };

    let names: Vec<&str> = stats.iter().map(|s| s.make.as_str()).collect();
    let mut lines = vec![format!("🔍 Comparison: {}", names.join(" vs "))];
    for entry in &stats {
        lines.push(format!(
            "- {}: {} units sold, {} avg price",
            entry.make,
            format_count(entry.total_quantity),
            format_currency(entry.average_price)
        ));
    }
    Ok(lines.join("\n"))
}

/// One ranked (make, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub make: String,
    pub model: String,
    pub value: f64,
}

/// Group by (make, model), sum the metric, sort and keep the first `top_n`.
///
/// Equal values keep the (make, model) sort order.
pub fn rank(store: &RecordStore, request: &RankingRequest) -> Result<Vec<RankedEntry>, QueryError> {
    if store.is_empty() {
        return Err(AnalysisError::EmptyDataset.into());
    }

    let mut grouped: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for record in store.records().iter().filter(|r| r.has_identity()) {
        let value = match request.metric {
            RankingMetric::Quantity => record.quantity as f64,
            RankingMetric::Price => record.price,
            RankingMetric::Revenue => record.revenue,
        };
        *grouped
            .entry((record.make.as_str(), record.model.as_str()))
            .or_default() += value;
    }

    let mut entries: Vec<RankedEntry> = grouped
        .into_iter()
        .map(|((make, model), value)| RankedEntry {
            make: make.to_string(),
            model: model.to_string(),
            value,
        })
        .collect();

    if request.ascending {
        entries.sort_by(|a, b| a.value.total_cmp(&b.value));
    } else {
        entries.sort_by(|a, b| b.value.total_cmp(&a.value));
    }
    entries.truncate(request.top_n);

    debug!("Ranked {} entries by {}", entries.len(), request.metric);
    Ok(entries)
}

/// Answer a ranking question.
pub fn handle_ranking(store: &RecordStore, request: &RankingRequest) -> Result<String, QueryError> {
    let entries = rank(store, request)?;

    let title = if request.ascending { "⚠️ Worst" } else { "🏆 Top" };
    let mut lines = vec![format!("{} {} by {}:", title, request.top_n, request.metric)];
    for entry in &entries {
        let value = match request.metric {
            RankingMetric::Quantity => format!("{} units", format_count(entry.value as u64)),
            RankingMetric::Price | RankingMetric::Revenue => format_currency(entry.value),
        };
        lines.push(format!("- {} {}: {}", entry.make, entry.model, value));
    }
    Ok(lines.join("\n"))
}

/// Answer anything else: growth locally, the rest through the LLM with a
/// context bundle of summary, trends and sample records.
pub async fn handle_general(ctx: QueryContext<'_>, query: &str) -> Result<String, QueryError> {
    let summary = summary(ctx.store);

    if query.to_lowercase().contains("growth") {
        if let Ok(ref s) = summary {
            return Ok(format!(
                "Average yearly growth: {}",
                format_percent(s.yearly_growth)
            ));
        }
    }

    let Some(gateway) = ctx.gateway else {
        return Err(QueryError::Unavailable(
            "LLM backend is not available (offline mode)".to_string(),
        ));
    };

    let trends = trends(ctx.store);
    let context = serde_json::json!({
        "summary": Section::from(&summary),
        "trends": Section::from(&trends),
        "sample_data": ctx.store.head(ctx.settings.sample_rows),
    });

    info!("Forwarding general question to the LLM");
    Ok(gateway
        .execute(&format!(
            "Answer this car sales question: {}\n\nContext: {}",
            query, context
        ))
        .await)
}
