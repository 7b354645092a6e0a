use thiserror::Error;

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors are `Clone` so one fetch outcome can be handed to every caller
/// that joined the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Metrics source error: {0}")]
    Source(String),

    #[error("Metrics fetch aborted: {0}")]
    FetchAborted(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MetricsError {
    fn from(e: serde_json::Error) -> Self {
        MetricsError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for MetricsError {
    fn from(e: std::io::Error) -> Self {
        MetricsError::Source(e.to_string())
    }
}
