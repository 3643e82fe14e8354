//! Configuration for the news agent

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::dedup::normalize_allowed_sources;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Storage backend: "supabase", "postgres" or "memory"
    #[serde(default = "default_storage_type")]
    pub storage_type: String,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub database_url: Option<String>,

    // Brave news search
    pub brave_api_key: Option<String>,
    #[serde(default = "default_brave_api")]
    pub brave_api_url: String,

    // Gemini text generation
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_api")]
    pub gemini_api_url: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    // CoinGecko price quotes
    #[serde(default = "default_coingecko_api")]
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,

    // Search behaviour
    #[serde(default = "default_allowed_sources")]
    pub allowed_sources: Vec<String>,
    #[serde(default = "default_search_queries")]
    pub search_queries: Vec<String>,
    #[serde(default = "default_results_per_query")]
    pub results_per_query: u32,

    // Ingestion limits
    #[serde(default = "default_max_articles")]
    pub max_articles_per_run: usize,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_min_summary_chars")]
    pub min_summary_chars: usize,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    // Concurrency
    #[serde(default = "default_extract_concurrency")]
    pub extract_concurrency: usize,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    // Rate limiting (requests per minute; a full minute of quota may be used at once)
    #[serde(default = "default_search_rate_limit")]
    pub search_rate_limit_rpm: u32,
    #[serde(default = "default_extract_rate_limit")]
    pub extract_rate_limit_rpm: u32,
    #[serde(default = "default_llm_rate_limit")]
    pub llm_rate_limit_rpm: u32,
    #[serde(default = "default_price_rate_limit")]
    pub price_rate_limit_rpm: u32,
    #[serde(default = "default_storage_rate_limit")]
    pub storage_rate_limit_rpm: u32,
}

fn default_storage_type() -> String {
    "supabase".to_string()
}

fn default_brave_api() -> String {
    "https://api.search.brave.com".to_string()
}

fn default_gemini_api() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_coingecko_api() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_allowed_sources() -> Vec<String> {
    ["bloomberg.com", "cnbc.com", "wsj.com", "marketwatch.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_search_queries() -> Vec<String> {
    [
        "stock market news today",
        "financial markets update",
        "market analysis today",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_results_per_query() -> u32 {
    10
}

fn default_max_articles() -> usize {
    3
}

fn default_min_content_chars() -> usize {
    500
}

fn default_min_summary_chars() -> usize {
    50
}

fn default_max_prompt_chars() -> usize {
    8000
}

fn default_extract_concurrency() -> usize {
    1
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_search_rate_limit() -> u32 {
    30
}

fn default_extract_rate_limit() -> u32 {
    60
}

fn default_llm_rate_limit() -> u32 {
    20
}

fn default_price_rate_limit() -> u32 {
    30
}

fn default_storage_rate_limit() -> u32 {
    600
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                environment
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_sources")
                    .with_list_parse_key("search_queries"),
            )
            .build()?;

        let mut cfg: Config = config.try_deserialize()?;
        cfg.normalize_lists();
        Ok(cfg)
    }

    /// Trims list entries and reduces allow-list entries to bare domains
    fn normalize_lists(&mut self) {
        self.allowed_sources = normalize_allowed_sources(&self.allowed_sources);
        self.search_queries = self
            .search_queries
            .iter()
            .map(|query| query.trim().to_string())
            .filter(|query| !query.is_empty())
            .collect();
    }

    /// Configuration with every default applied and no credentials
    pub fn defaults() -> Result<Self> {
        let cfg: Config = config::Config::builder().build()?.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates values that do not depend on the command being run
    pub fn validate(&self) -> Result<()> {
        if self.allowed_sources.is_empty() {
            bail!("ALLOWED_SOURCES must name at least one publisher domain");
        }
        if self.search_queries.is_empty() {
            bail!("SEARCH_QUERIES must contain at least one query");
        }
        if self.max_articles_per_run == 0 {
            bail!("MAX_ARTICLES_PER_RUN must be greater than zero");
        }
        if self.max_concurrent_requests == 0 || self.extract_concurrency == 0 {
            bail!("Concurrency limits must be greater than zero");
        }
        match self.storage_type.as_str() {
            "supabase" | "postgres" | "memory" => Ok(()),
            other => bail!("Unknown STORAGE_TYPE: {}", other),
        }
    }

    /// Checks the credentials needed by the selected storage backend
    pub fn require_storage(&self) -> Result<()> {
        match self.storage_type.as_str() {
            "supabase" if self.supabase_url.is_none() || self.supabase_key.is_none() => {
                bail!("SUPABASE_URL and SUPABASE_KEY are required for supabase storage")
            }
            "postgres" if self.database_url.is_none() => {
                bail!("DATABASE_URL is required for postgres storage")
            }
            _ => Ok(()),
        }
    }

    /// Checks the credentials needed by the news portion of a run
    pub fn require_news(&self) -> Result<()> {
        if !self.has_search() {
            bail!("BRAVE_API_KEY is required for news ingestion");
        }
        if !self.has_summarizer() {
            bail!("GEMINI_API_KEY is required for news ingestion");
        }
        Ok(())
    }

    pub fn has_search(&self) -> bool {
        self.brave_api_key.is_some()
    }

    pub fn has_summarizer(&self) -> bool {
        self.gemini_api_key.is_some()
    }

    /// Supabase key with the middle masked, for log output
    pub fn masked_supabase_key(&self) -> String {
        match self.supabase_key.as_deref() {
            Some(key) if key.chars().count() > 10 => {
                let head: String = key.chars().take(6).collect();
                let tail: String = key.chars().skip(key.chars().count() - 4).collect();
                format!("{}...{}", head, tail)
            }
            Some(_) => "***".to_string(),
            None => "Not found".to_string(),
        }
    }
}
