//! Run reports
//!
//! Per-item results are folded into a `NewsReport`; the price portion is a
//! single `PriceOutcome`. Both are logged at the end of a run.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::IngestionError;
use crate::schemas::NewsItem;

/// One candidate that was dropped because of an error
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemFailure {
    pub url: String,
    pub kind: &'static str,
    pub error: String,
}

/// One article written this run, as shown to the operator
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredArticle {
    pub title: String,
    pub source: String,
    pub url: String,
    pub summary: String,
}

/// Outcome of the news portion of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewsReport {
    /// Queries actually sent to the search source
    pub queries_run: usize,
    /// Allow-listed candidates returned across all queries
    pub candidates_seen: usize,
    /// Candidates already present in storage
    pub skipped_existing: usize,
    /// Candidates repeated by a later query in the same run
    pub skipped_repeated: usize,
    /// URLs of rows written this run
    pub persisted: Vec<String>,
    /// Rows written this run, in insert order
    pub articles: Vec<StoredArticle>,
    pub failures: Vec<ItemFailure>,
    /// Set when the search source failed and the news portion was abandoned
    pub search_error: Option<String>,
}

impl NewsReport {
    pub fn record_stored(&mut self, item: NewsItem) {
        self.persisted.push(item.url.clone());
        self.articles.push(StoredArticle {
            title: item.title,
            source: item.source,
            url: item.url,
            summary: item.summary,
        });
    }

    pub fn record_failure(&mut self, url: &str, error: &IngestionError) {
        warn!(url = %url, kind = error.kind(), error = %error, "Skipping article");
        self.failures.push(ItemFailure {
            url: url.to_string(),
            kind: error.kind(),
            error: error.to_string(),
        });
    }

    pub fn failures_of_kind(&self, kind: &str) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

/// Outcome of the price portion of a run
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceOutcome {
    Stored { price: f64 },
    FetchFailed { error: String },
    StoreFailed { price: f64, error: String },
}

impl PriceOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// Everything one invocation did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news: Option<NewsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceOutcome>,
}

impl RunReport {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            news: None,
            price: None,
        }
    }

    /// True when no portion hit a run-level failure
    pub fn is_clean(&self) -> bool {
        let news_ok = self.news.as_ref().map_or(true, |n| n.search_error.is_none());
        let price_ok = self.price.as_ref().map_or(true, PriceOutcome::is_stored);
        news_ok && price_ok
    }

    pub fn log_summary(&self) {
        if let Some(ref news) = self.news {
            for article in &news.articles {
                info!(
                    correlation_id = %self.correlation_id,
                    title = %article.title,
                    source = %article.source,
                    url = %article.url,
                    summary = %article.summary,
                    "Stored article"
                );
            }
            info!(
                correlation_id = %self.correlation_id,
                queries = news.queries_run,
                candidates = news.candidates_seen,
                skipped_existing = news.skipped_existing,
                skipped_repeated = news.skipped_repeated,
                persisted = news.persisted.len(),
                failed = news.failures.len(),
                search_error = ?news.search_error,
                "News ingestion finished"
            );
        }

        match self.price {
            Some(PriceOutcome::Stored { price }) => {
                info!(correlation_id = %self.correlation_id, price, "Price point stored");
            }
            Some(PriceOutcome::FetchFailed { ref error }) => {
                warn!(correlation_id = %self.correlation_id, error = %error, "Price point not fetched");
            }
            Some(PriceOutcome::StoreFailed { price, ref error }) => {
                warn!(correlation_id = %self.correlation_id, price, error = %error, "Price point not stored");
            }
            None => {}
        }
    }
}
