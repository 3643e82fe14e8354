//! Error types for the news agent

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Extraction failed for {url}: {reason}")]
    ExtractionFailed {
        url: String,
        reason: String,
    },

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Storage query failed: {0}")]
    StorageReadFailed(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: String,
        message: String,
    },

    #[error("Invalid data: {0}")]
    ValidationError(String),

    #[error("Source not configured: {0}")]
    SourceNotConfigured(String),
}

impl IngestionError {
    /// Short, stable name used as a log field and in run reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SearchUnavailable(_) => "search_unavailable",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::SummarizationFailed(_) => "summarization_failed",
            Self::PriceUnavailable(_) => "price_unavailable",
            Self::StorageWriteFailed(_) => "storage_write_failed",
            Self::StorageReadFailed(_) => "storage_read_failed",
            Self::HttpError(_) => "http",
            Self::JsonError(_) => "json",
            Self::DatabaseError(_) => "database",
            Self::ConfigError(_) => "config",
            Self::ApiError { .. } => "api",
            Self::ValidationError(_) => "validation",
            Self::SourceNotConfigured(_) => "source_not_configured",
        }
    }

    pub(crate) fn extraction(url: &str, reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(IngestionError::extraction("https://x.test/a", "empty").kind(), "extraction_failed");
        assert_eq!(IngestionError::PriceUnavailable("down".into()).kind(), "price_unavailable");
    }

    #[test]
    fn test_extraction_message_includes_url() {
        let err = IngestionError::extraction("https://www.cnbc.com/a", "not html");
        assert_eq!(
            err.to_string(),
            "Extraction failed for https://www.cnbc.com/a: not html"
        );
    }
}
