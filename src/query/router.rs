//! Keyword-based query classification.
//!
//! A question is matched against an ordered rule table; the first rule whose
//! keyword appears in the lowercased text decides the category. No scoring,
//! no tokenization beyond what the ranking parameters need.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The handler family a question is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Projection,
    Comparison,
    Ranking,
    General,
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryCategory::Projection => write!(f, "projection"),
            QueryCategory::Comparison => write!(f, "comparison"),
            QueryCategory::Ranking => write!(f, "ranking"),
            QueryCategory::General => write!(f, "general"),
        }
    }
}

/// Routing rules in priority order. `General` is the fallback.
const RULES: &[(QueryCategory, &[&str])] = &[
    (QueryCategory::Projection, &["projection", "forecast", "predict"]),
    (QueryCategory::Comparison, &["compare", "vs", "versus"]),
    (QueryCategory::Ranking, &["top", "best", "worst", "ranking"]),
];

/// Metric a ranking is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingMetric {
    Quantity,
    Price,
    Revenue,
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingMetric::Quantity => write!(f, "Quantity"),
            RankingMetric::Price => write!(f, "Price"),
            RankingMetric::Revenue => write!(f, "Revenue"),
        }
    }
}

/// Parameters of a ranking question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRequest {
    pub top_n: usize,
    pub metric: RankingMetric,
    /// Worst first when true.
    pub ascending: bool,
}

impl RankingRequest {
    /// Extract ranking parameters from the question text.
    ///
    /// `top_n` comes from the token right after the word `top` when it is
    /// numeric; otherwise `default_n`.
    pub fn parse(query: &str, default_n: usize) -> Self {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        let top_n = words
            .iter()
            .position(|w| *w == "top")
            .and_then(|i| words.get(i + 1))
            .filter(|next| !next.is_empty() && next.chars().all(|c| c.is_ascii_digit()))
            .and_then(|next| next.parse::<usize>().ok())
            .unwrap_or(default_n);

        let metric = if lower.contains("expensive") {
            RankingMetric::Price
        } else if lower.contains("revenue") {
            RankingMetric::Revenue
        } else {
            RankingMetric::Quantity
        };

        Self {
            top_n,
            metric,
            ascending: lower.contains("worst"),
        }
    }
}

/// A classified question, carrying whatever the handler needs that can be
/// read off the text alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum QueryIntent {
    Projection,
    Comparison,
    Ranking(RankingRequest),
    General,
}

impl QueryIntent {
    pub fn category(&self) -> QueryCategory {
        match self {
            QueryIntent::Projection => QueryCategory::Projection,
            QueryIntent::Comparison => QueryCategory::Comparison,
            QueryIntent::Ranking(_) => QueryCategory::Ranking,
            QueryIntent::General => QueryCategory::General,
        }
    }
}

/// Classify a question into a category. Case-insensitive substring match,
/// first rule wins.
pub fn classify_category(query: &str) -> QueryCategory {
    let lower = query.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(QueryCategory::General)
}

/// Classify a question and parse its parameters.
pub fn classify(query: &str, default_top_n: usize) -> QueryIntent {
    match classify_category(query) {
        QueryCategory::Projection => QueryIntent::Projection,
        QueryCategory::Comparison => QueryIntent::Comparison,
        QueryCategory::Ranking => QueryIntent::Ranking(RankingRequest::parse(query, default_top_n)),
        QueryCategory::General => QueryIntent::General,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_takes_priority_over_ranking() {
        assert_eq!(
            classify("What is the forecast for 2025 top sellers?", 3),
            QueryIntent::Projection
        );
    }

    #[test]
    fn test_comparison() {
        assert_eq!(classify("Compare Toyota vs Honda", 3), QueryIntent::Comparison);
        assert_eq!(classify_category("Toyota versus Ford"), QueryCategory::Comparison);
    }

    #[test]
    fn test_ranking_parses_top_n() {
        assert_eq!(
            classify("Top 5 best models", 3),
            QueryIntent::Ranking(RankingRequest {
                top_n: 5,
                metric: RankingMetric::Quantity,
                ascending: false,
            })
        );
    }

    #[test]
    fn test_general_fallback() {
        assert_eq!(classify("How many units total?", 3), QueryIntent::General);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify_category("PREDICT next year"), QueryCategory::Projection);
    }

    #[test]
    fn test_substring_matching_is_literal() {
        // "vs" inside another word still counts.
        assert_eq!(classify_category("show canvas sales"), QueryCategory::Comparison);
    }

    #[test]
    fn test_ranking_defaults() {
        let request = RankingRequest::parse("best sellers", 3);
        assert_eq!(request.top_n, 3);
        assert!(!request.ascending);

        let request = RankingRequest::parse("top ten models", 3);
        assert_eq!(request.top_n, 3);
    }

    #[test]
    fn test_ranking_metric_and_order() {
        let request = RankingRequest::parse("worst 2 by revenue", 3);
        assert_eq!(request.metric, RankingMetric::Revenue);
        assert!(request.ascending);

        let request = RankingRequest::parse("top 4 most expensive revenue", 3);
        assert_eq!(request.metric, RankingMetric::Price);
        assert_eq!(request.top_n, 4);
    }

    #[test]
    fn test_intent_category() {
        let intent = classify("top 2", 3);
        assert_eq!(intent.category(), QueryCategory::Ranking);
    }
}
