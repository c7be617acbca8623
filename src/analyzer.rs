//! Analysis orchestration.
//!
//! Each `run` reloads the CSV from disk and re-derives every aggregate, so
//! edits to the file between menu choices are picked up.

use crate::analysis;
use crate::config::AnalysisConfig;
use crate::data::{load_sales_file, LoadReport};
use crate::error::{AnalysisError, LoadError};
use crate::llm::LlmGateway;
use crate::models::{DatasetMetadata, Summary, Trends};
use crate::query::{self, QueryAnswer, QueryContext};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything one run produced.
#[derive(Debug)]
pub struct AnalysisRun {
    pub load_report: LoadReport,
    pub metadata: DatasetMetadata,
    pub summary: Result<Summary, AnalysisError>,
    pub trends: Result<Trends, AnalysisError>,
    pub query: Option<QueryAnswer>,
}

/// Owns the data location, the optional gateway and analysis settings.
pub struct SalesAnalyzer {
    data_path: PathBuf,
    gateway: Option<LlmGateway>,
    settings: AnalysisConfig,
}

impl SalesAnalyzer {
    /// Create an analyzer for `data_path`.
    ///
    /// Fails when the file does not exist. A non-`.csv` extension is only
    /// warned about.
    pub fn new(
        data_path: impl Into<PathBuf>,
        gateway: Option<LlmGateway>,
        settings: AnalysisConfig,
    ) -> Result<Self, LoadError> {
        let data_path = data_path.into();
        if !data_path.is_file() {
            return Err(LoadError::NotFound(data_path));
        }

        let is_csv = data_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            warn!(
                "{} does not have a .csv extension; parsing it as CSV anyway",
                data_path.display()
            );
        }

        if gateway.is_none() {
            info!("No LLM gateway configured; LLM-backed answers are unavailable");
        }

        Ok(Self {
            data_path,
            gateway,
            settings,
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn gateway(&self) -> Option<&LlmGateway> {
        self.gateway.as_ref()
    }

    /// Load, aggregate and optionally answer `query`.
    ///
    /// Only load failures are returned as `Err`; aggregation and query
    /// failures are carried inside the run.
    pub async fn run(&self, query: Option<&str>) -> Result<AnalysisRun, LoadError> {
        let (store, load_report) = load_sales_file(&self.data_path)?;
        debug!("Load report: {:?}", load_report);

        let metadata = analysis::metadata(&store);
        let summary = analysis::summary(&store);
        let trends = analysis::trends(&store);

        let query = match query {
            Some(question) => {
                let ctx = QueryContext {
                    store: &store,
                    gateway: self.gateway.as_ref(),
                    settings: &self.settings,
                };
                Some(query::answer(ctx, question).await)
            }
            None => None,
        };

        Ok(AnalysisRun {
            load_report,
            metadata,
            summary,
            trends,
            query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryCategory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
Year,Make,Model,Quantity,Region,Price
2022,Toyota,Camry,\"1,000\",North,25000
2023,Toyota,Camry,1200,North,25500
2022,Honda,Civic,800,South,22000
2023,Honda,Civic,900,South,22500
";

    fn csv_file(contents: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_new_rejects_missing_file() {
        let result = SalesAnalyzer::new("/nonexistent/sales.csv", None, AnalysisConfig::default());
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_new_accepts_other_extensions() {
        let file = csv_file(SAMPLE, ".txt");
        assert!(SalesAnalyzer::new(file.path(), None, AnalysisConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_run_without_query() {
        let file = csv_file(SAMPLE, ".csv");
        let analyzer = SalesAnalyzer::new(file.path(), None, AnalysisConfig::default()).unwrap();

        let run = analyzer.run(None).await.unwrap();
        assert_eq!(run.load_report.rows_read, 4);
        assert_eq!(run.metadata.years_covered, "2022 to 2023");
        assert_eq!(run.summary.unwrap().total_sales, 3_900);
        assert_eq!(run.trends.unwrap().total_by_year[&2023], 2_100);
        assert!(run.query.is_none());
    }

    #[tokio::test]
    async fn test_run_answers_query() {
        let file = csv_file(SAMPLE, ".csv");
        let analyzer = SalesAnalyzer::new(file.path(), None, AnalysisConfig::default()).unwrap();

        let run = analyzer.run(Some("Compare Toyota vs Honda")).await.unwrap();
        let answer = run.query.unwrap();
        assert_eq!(answer.intent.category(), QueryCategory::Comparison);
        assert!(answer.response.contains("- Toyota: 2,200 units sold, $25,250.00 avg price"));
        assert!(answer.response.contains("- Honda: 1,700 units sold, $22,250.00 avg price"));
    }

    #[tokio::test]
    async fn test_run_reloads_each_time() {
        let mut file = csv_file(SAMPLE, ".csv");
        let analyzer = SalesAnalyzer::new(file.path(), None, AnalysisConfig::default()).unwrap();

        let first = analyzer.run(None).await.unwrap();
        assert_eq!(first.metadata.record_count, 4);

        file.write_all(b"2024,Ford,Focus,500,East,18000\n").unwrap();
        file.flush().unwrap();

        let second = analyzer.run(None).await.unwrap();
        assert_eq!(second.metadata.record_count, 5);
        assert_eq!(second.metadata.years_covered, "2022 to 2024");
    }

    #[tokio::test]
    async fn test_run_reports_missing_columns() {
        let file = csv_file("Year,Make,Quantity\n2022,Toyota,5\n", ".csv");
        let analyzer = SalesAnalyzer::new(file.path(), None, AnalysisConfig::default()).unwrap();

        let err = analyzer.run(None).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing columns: Model, Price");
    }
}
