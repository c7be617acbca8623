//! Free-text query routing and handling.
//!
//! `answer` classifies a question, dispatches it to one handler and turns
//! any handler failure into a readable message, so callers always get text.

pub mod handlers;
pub mod router;

pub use handlers::QueryContext;
pub use router::{classify, QueryCategory, QueryIntent};

use crate::error::QueryError;
use serde::Serialize;
use tracing::{error, info};

/// A routed question and the text produced for it.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub question: String,
    pub intent: QueryIntent,
    pub response: String,
}

/// Classify `question` and run the matching handler.
pub async fn answer(ctx: QueryContext<'_>, question: &str) -> QueryAnswer {
    let intent = classify(question, ctx.settings.default_top_n);
    info!("Routing query as {}", intent.category());

    let result = match &intent {
        QueryIntent::Projection => handlers::handle_projection(ctx).await,
        QueryIntent::Comparison => handlers::handle_comparison(ctx.store, question),
        QueryIntent::Ranking(request) => handlers::handle_ranking(ctx.store, request),
        QueryIntent::General => handlers::handle_general(ctx, question).await,
    };

    let response = result.unwrap_or_else(|e| failure_message(intent.category(), &e));

    QueryAnswer {
        question: question.to_string(),
        intent,
        response,
    }
}

fn failure_message(category: QueryCategory, err: &QueryError) -> String {
    error!("{} query failed: {}", category, err);
    match category {
        QueryCategory::Projection => format!("Could not generate projection: {}", err),
        QueryCategory::Comparison => format!("Could not complete comparison: {}", err),
        QueryCategory::Ranking => format!("Could not generate rankings: {}", err),
        QueryCategory::General => format!("Could not process this query: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::data::store::record;
    use crate::data::RecordStore;
    use crate::llm::gateway::fakes::FixedReplyBackend;
    use crate::llm::{LlmGateway, LLM_ERROR_PREFIX};

    fn store() -> RecordStore {
        vec![
            record(2022, "Toyota", "Camry", 100, 25_000.0),
            record(2023, "Honda", "Civic", 120, 22_000.0),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_answer_routes_ranking() {
        let store = store();
        let settings = AnalysisConfig::default();
        let ctx = QueryContext {
            store: &store,
            gateway: None,
            settings: &settings,
        };

        let answer = answer(ctx, "Top 1 best models").await;
        assert_eq!(answer.intent.category(), QueryCategory::Ranking);
        assert_eq!(answer.response, "🏆 Top 1 by Quantity:\n- Honda Civic: 120 units");
    }

    #[tokio::test]
    async fn test_answer_converts_handler_errors() {
        let store = RecordStore::default();
        let settings = AnalysisConfig::default();
        let ctx = QueryContext {
            store: &store,
            gateway: None,
            settings: &settings,
        };

        let ranking = answer(ctx, "top 3").await;
        assert_eq!(
            ranking.response,
            "Could not generate rankings: no sales records to analyze"
        );

        let projection = answer(ctx, "forecast next year").await;
        assert_eq!(
            projection.response,
            "Could not generate projection: no sales records to analyze"
        );

        let general = answer(ctx, "how many units?").await;
        assert!(general.response.starts_with("Could not process this query"));
    }

    #[tokio::test]
    async fn test_gateway_mismatch_surfaces_as_error_text() {
        let store = store();
        let settings = AnalysisConfig::default();
        let gateway = LlmGateway::connect(Box::new(FixedReplyBackend(
            "The answer is 42".to_string(),
        )))
        .await
        .unwrap();
        let ctx = QueryContext {
            store: &store,
            gateway: Some(&gateway),
            settings: &settings,
        };

        let answer = answer(ctx, "Which region sells most?").await;
        assert_eq!(answer.intent, QueryIntent::General);
        assert!(answer.response.starts_with(LLM_ERROR_PREFIX));
    }
}
