//! Brave News Search Source
//!
//! Finds recent financial articles through the Brave news search API
//! https://api.search.brave.com/app/documentation/news-search

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

use super::{CandidateSource, SourceMetadata};
use crate::config::Config;
use crate::dedup::{canonicalize_url, is_homepage, match_allowed_source, normalize_allowed_sources};
use crate::error::{IngestionError, Result};
use crate::http_client::{ServiceClient, SharedHttpClient};
use crate::schemas::Candidate;

const NEWS_SEARCH_PATH: &str = "/res/v1/news/search";

/// Brave response structures
#[derive(Debug, Deserialize)]
struct BraveNewsResponse {
    #[serde(default)]
    results: Vec<BraveNewsResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BraveNewsResult {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub age: Option<String>,
}

/// Brave news search source
pub struct BraveNewsSource {
    client: ServiceClient,
    api_key: String,
    base_url: String,
    allowed_sources: Vec<String>,
    results_per_query: u32,
    metadata: SourceMetadata,
}

impl BraveNewsSource {
    pub fn new(
        http_client: Arc<SharedHttpClient>,
        api_key: String,
        base_url: &str,
        allowed_sources: Vec<String>,
        rate_limit_rpm: u32,
    ) -> Self {
        let client = ServiceClient::new(http_client, "brave", rate_limit_rpm);

        let metadata = SourceMetadata {
            id: "brave".to_string(),
            name: "Brave News Search".to_string(),
            description: "Past-day news restricted to allow-listed publishers".to_string(),
            rate_limit_rpm,
        };

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            allowed_sources: normalize_allowed_sources(&allowed_sources),
            results_per_query: 10,
            metadata,
        }
    }

    pub fn from_config(http_client: Arc<SharedHttpClient>, config: &Config) -> Result<Self> {
        let api_key = config
            .brave_api_key
            .clone()
            .ok_or_else(|| IngestionError::SourceNotConfigured("brave (BRAVE_API_KEY)".to_string()))?;

        Ok(Self::new(
            http_client,
            api_key,
            &config.brave_api_url,
            config.allowed_sources.clone(),
            config.search_rate_limit_rpm,
        )
        .with_results_per_query(config.results_per_query))
    }

    pub fn with_results_per_query(mut self, count: u32) -> Self {
        self.results_per_query = count.max(1);
        self
    }

    /// Query text with one `site:` operator per allow-listed publisher
    pub fn build_query(&self, query: &str) -> String {
        let clean_query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let site_filters = self
            .allowed_sources
            .iter()
            .map(|domain| format!("site:{}", domain))
            .collect::<Vec<_>>()
            .join(" OR ");

        if site_filters.is_empty() {
            clean_query
        } else {
            format!("{} {}", clean_query, site_filters)
        }
    }

    /// Keeps article results on allow-listed hosts, in ranking order
    pub fn filter_results(&self, results: Vec<BraveNewsResult>) -> Vec<Candidate> {
        results
            .into_iter()
            .filter_map(|result| self.to_candidate(result))
            .collect()
    }

    fn to_candidate(&self, result: BraveNewsResult) -> Option<Candidate> {
        let raw_url = result.url?;
        let title = result.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;

        let canonical = match canonicalize_url(&raw_url) {
            Ok(url) => url,
            Err(e) => {
                debug!(url = %raw_url, error = %e, "Dropping unparseable result URL");
                return None;
            }
        };
        let parsed = Url::parse(&canonical).ok()?;

        if is_homepage(&parsed) {
            debug!(url = %canonical, "Dropping homepage result");
            return None;
        }

        let Some(source) = parsed
            .host_str()
            .and_then(|host| match_allowed_source(host, &self.allowed_sources))
        else {
            debug!(url = %canonical, "Dropping result outside allow-list");
            return None;
        };

        Some(Candidate {
            title,
            url: canonical,
            source: source.to_string(),
            description: result.description.filter(|d| !d.trim().is_empty()),
        })
    }

    async fn fetch_results(&self, query: &str) -> Result<Vec<BraveNewsResult>> {
        let url = format!("{}{}", self.base_url, NEWS_SEARCH_PATH);
        let q = self.build_query(query);
        let count = self.results_per_query.to_string();

        debug!(source = "brave", query = %q, "Searching news");

        let request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", q.as_str()),
                ("count", count.as_str()),
                ("search_lang", "en"),
                ("freshness", "pd"),
                ("text_format", "raw"),
            ]);

        let response = self.client.send(request).await?;
        let text = response.text().await?;
        let parsed: BraveNewsResponse = serde_json::from_str(&text)?;

        Ok(parsed.results)
    }
}

#[async_trait]
impl CandidateSource for BraveNewsSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    #[instrument(skip(self), fields(source = "brave"))]
    async fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let results = self
            .fetch_results(query)
            .await
            .map_err(|e| IngestionError::SearchUnavailable(e.to_string()))?;
        let result_count = results.len();

        let candidates = self.filter_results(results);

        info!(
            results = result_count,
            candidates = candidates.len(),
            "Fetched news search results"
        );

        Ok(candidates)
    }
}
