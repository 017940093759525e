//! Error types for the OHLCV feature pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the feature pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required input column absent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Data quality problem severe enough to fail the ticker (e.g. no rows left).
    #[error("Data quality error: {0}")]
    DataQuality(String),

    /// A configured upstream source is absent.
    #[error("Source missing: {0}")]
    SourceMissing(String),

    /// Fewer rows than a computation needs.
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    /// Create a data quality error.
    pub fn data_quality(msg: impl Into<String>) -> Self {
        Error::DataQuality(msg.into())
    }

    /// Create a source-missing error.
    pub fn source_missing(msg: impl Into<String>) -> Self {
        Error::SourceMissing(msg.into())
    }

    /// Create an insufficient history error.
    pub fn insufficient_history(msg: impl Into<String>) -> Self {
        Error::InsufficientHistory(msg.into())
    }

    /// Stable machine-readable code written to the failure log.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Schema(_) => "schema_error",
            Error::DataQuality(_) => "no_usable_rows",
            Error::SourceMissing(_) => "source_missing",
            Error::InsufficientHistory(_) => "insufficient_history",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Csv(_) => "csv_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(Error::schema("missing column Volume").reason_code(), "schema_error");
        assert_eq!(Error::data_quality("empty").reason_code(), "no_usable_rows");
        assert_eq!(Error::source_missing("news.csv").reason_code(), "source_missing");
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.reason_code(), "io_error");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::schema("missing column Volume");
        assert_eq!(err.to_string(), "Schema error: missing column Volume");
    }
}
