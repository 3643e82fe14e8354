//! Ingestion Pipeline
//!
//! One run, driven sequentially:
//! search → skip known URLs → extract → summarize → persist, then
//! fetch → persist the current price.
//!
//! - A failing article never aborts the run; it lands in the report
//! - A failing search abandons the news portion only
//! - The price portion shares nothing with the news portion

pub mod report;

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::dedup::SeenUrls;
use crate::error::{IngestionError, Result};
use crate::extract::ContentExtractor;
use crate::price::PriceFeed;
use crate::schemas::{Candidate, NewsItem, PricePoint};
use crate::sources::CandidateSource;
use crate::storage::{InsertOutcome, NewsStore};
use crate::summarizer::Summarizer;

pub use report::{ItemFailure, NewsReport, PriceOutcome, RunReport, StoredArticle};

// ============================================
// PIPELINE CONFIGURATION
// ============================================

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Search queries, issued in order until enough articles are stored
    pub queries: Vec<String>,
    /// Articles to store before the run stops taking candidates
    pub max_articles: usize,
    /// Candidates extracted and summarized at the same time
    pub extract_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queries: vec!["stock market news today".to_string()],
            max_articles: 3,
            extract_concurrency: 1,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queries: config.search_queries.clone(),
            max_articles: config.max_articles_per_run,
            extract_concurrency: config.extract_concurrency.max(1),
        }
    }
}

/// Components of the news portion
pub struct NewsComponents {
    pub source: Arc<dyn CandidateSource>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub summarizer: Arc<dyn Summarizer>,
}

// ============================================
// PIPELINE
// ============================================

pub struct IngestionPipeline {
    config: PipelineConfig,
    store: Arc<dyn NewsStore>,
    news: Option<NewsComponents>,
    price_feed: Option<Arc<dyn PriceFeed>>,
}

impl IngestionPipeline {
    pub fn new(config: PipelineConfig, store: Arc<dyn NewsStore>) -> Self {
        Self {
            config,
            store,
            news: None,
            price_feed: None,
        }
    }

    /// Enables the news portion of the run
    pub fn with_news(mut self, components: NewsComponents) -> Self {
        self.news = Some(components);
        self
    }

    /// Enables the price portion of the run
    pub fn with_price_feed(mut self, feed: Arc<dyn PriceFeed>) -> Self {
        self.price_feed = Some(feed);
        self
    }

    /// Runs every enabled portion once
    #[instrument(skip(self), fields(backend = self.store.backend()))]
    pub async fn run(&self, correlation_id: &str) -> RunReport {
        info!("Starting run");
        let mut report = RunReport::new(correlation_id);

        if let Some(ref news) = self.news {
            report.news = Some(self.run_news(news).await);
        }

        if let Some(ref feed) = self.price_feed {
            report.price = Some(self.run_price(feed.as_ref()).await);
        }

        report.log_summary();
        report
    }

    async fn run_news(&self, news: &NewsComponents) -> NewsReport {
        let mut report = NewsReport::default();
        let mut seen = SeenUrls::new();

        'queries: for query in &self.config.queries {
            if report.persisted.len() >= self.config.max_articles {
                break;
            }

            report.queries_run += 1;
            let candidates = match news.source.search(query).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    error!(
                        source = news.source.id(),
                        query = %query,
                        error = %e,
                        "Search failed, abandoning news ingestion for this run"
                    );
                    report.search_error = Some(e.to_string());
                    break;
                }
            };
            report.candidates_seen += candidates.len();

            let fresh = self.new_candidates(candidates, &mut seen, &mut report).await;
            debug!(query = %query, fresh = fresh.len(), "Candidates to ingest");

            let mut results = stream::iter(fresh)
                .map(|candidate| async move {
                    let url = candidate.url.clone();
                    (url, self.ingest(news, candidate).await)
                })
                .buffered(self.config.extract_concurrency);

            while let Some((url, result)) = results.next().await {
                match result {
                    Ok(item) => self.persist(item, &mut report).await,
                    Err(e) => report.record_failure(&url, &e),
                }

                if report.persisted.len() >= self.config.max_articles {
                    info!(max = self.config.max_articles, "Article target reached");
                    break 'queries;
                }
            }
        }

        report
    }

    /// Drops candidates seen earlier this run or already in storage
    async fn new_candidates(
        &self,
        candidates: Vec<Candidate>,
        seen: &mut SeenUrls,
        report: &mut NewsReport,
    ) -> Vec<Candidate> {
        let mut fresh = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if seen.check_and_mark(&candidate.url) {
                report.skipped_repeated += 1;
                continue;
            }

            match self.store.news_exists(&candidate.url).await {
                Ok(true) => {
                    debug!(url = %candidate.url, "Already stored, skipping");
                    report.skipped_existing += 1;
                }
                Ok(false) => fresh.push(candidate),
                Err(e) => report.record_failure(&candidate.url, &e),
            }
        }

        fresh
    }

    /// Extracts and summarizes one candidate
    #[instrument(skip(self, news, candidate), fields(url = %candidate.url))]
    async fn ingest(&self, news: &NewsComponents, candidate: Candidate) -> Result<NewsItem> {
        let text = news.extractor.extract(&candidate.url).await?;
        let summary = news.summarizer.summarize(&candidate.title, &text).await?;

        let item = NewsItem::from_candidate(candidate, summary);
        if let Some(field) = item.missing_field() {
            return Err(IngestionError::ValidationError(format!("missing {}", field)));
        }

        Ok(item)
    }

    async fn persist(&self, item: NewsItem, report: &mut NewsReport) {
        match self.store.insert_news_item(&item).await {
            Ok(InsertOutcome::Inserted) => {
                info!(title = %item.title, source = %item.source, url = %item.url, "Article stored");
                report.record_stored(item);
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                warn!(url = %item.url, "Article stored concurrently by another run");
                report.skipped_existing += 1;
            }
            Err(e) => report.record_failure(&item.url, &e),
        }
    }

    async fn run_price(&self, feed: &dyn PriceFeed) -> PriceOutcome {
        let price = match feed.current_price().await {
            Ok(price) => price,
            Err(e) => {
                error!(error = %e, "Price fetch failed");
                return PriceOutcome::FetchFailed { error: e.to_string() };
            }
        };

        match self.store.insert_price_point(&PricePoint::new(price)).await {
            Ok(()) => PriceOutcome::Stored { price },
            Err(e) => {
                error!(price, error = %e, "Price insert failed");
                PriceOutcome::StoreFailed {
                    price,
                    error: e.to_string(),
                }
            }
        }
    }
}
