//! Error types for each failure domain.
//!
//! Load errors are fatal to a run. Analysis, query and gateway errors are
//! converted into displayable values by their callers so the interactive
//! session keeps going.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures while reading the sales CSV.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Data file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to open '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Required columns absent from the header row. Names are sorted.
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV parse error at line {line}: {message}")]
    Csv { line: u64, message: String },
}

/// Failures while computing aggregates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("no sales records to analyze")]
    EmptyDataset,

    #[error("non-finite {field} value in record {index}")]
    NonFinite { field: &'static str, index: usize },

    #[error("{field} exceeds the supported range")]
    Overflow { field: &'static str },
}

/// Failures talking to the completion service.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API credential missing: set {0}")]
    MissingCredential(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cannot connect to completion API at {0}")]
    Connect(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Verification failed. Got: {0}")]
    VerificationFailed(String),

    #[error("Call ID {call_id} missing in response: {response}")]
    CallIdMissing { call_id: u32, response: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures inside a query handler.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let err = LoadError::MissingColumns(vec!["Model".to_string(), "Price".to_string()]);
        assert_eq!(err.to_string(), "Missing columns: Model, Price");
    }

    #[test]
    fn test_call_id_missing_message() {
        let err = GatewayError::CallIdMissing {
            call_id: 123456,
            response: "hello".to_string(),
        };
        assert!(err.to_string().contains("123456"));
        assert!(err.to_string().contains("hello"));
    }
}
