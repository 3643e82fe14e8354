//! Storage layer for ingested data
//!
//! Backends:
//! - `supabase`: PostgREST over HTTPS
//! - `postgres`: direct connection through sqlx
//! - `memory`: in-process tables for dry runs and tests

pub mod memory;
pub mod postgres;
pub mod supabase;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::{IngestionError, Result};
use crate::http_client::SharedHttpClient;
use crate::schemas::{NewsItem, PricePoint};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use supabase::SupabaseStore;

/// Result of a single-row news insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The URL uniqueness constraint rejected the row
    AlreadyPresent,
}

/// Append-only access to the `finance_news` and `btc_price` tables
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Backend name for logging
    fn backend(&self) -> &'static str;

    /// Whether a `finance_news` row with this URL exists
    async fn news_exists(&self, url: &str) -> Result<bool>;

    /// Appends one `finance_news` row; fails with `StorageWriteFailed`
    async fn insert_news_item(&self, item: &NewsItem) -> Result<InsertOutcome>;

    /// Appends one `btc_price` row; fails with `StorageWriteFailed`
    async fn insert_price_point(&self, point: &PricePoint) -> Result<()>;
}

/// Creates the storage backend named by `config.storage_type`
pub async fn create_store(config: &Config, http_client: Arc<SharedHttpClient>) -> Result<Arc<dyn NewsStore>> {
    let store: Arc<dyn NewsStore> = match config.storage_type.as_str() {
        "supabase" => {
            let (Some(url), Some(key)) = (config.supabase_url.as_deref(), config.supabase_key.as_deref()) else {
                return Err(IngestionError::SourceNotConfigured(
                    "supabase (SUPABASE_URL, SUPABASE_KEY)".to_string(),
                ));
            };
            Arc::new(SupabaseStore::new(http_client, url, key, config.storage_rate_limit_rpm))
        }
        "postgres" => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                IngestionError::SourceNotConfigured("postgres (DATABASE_URL)".to_string())
            })?;
            Arc::new(PostgresStore::connect(url).await?)
        }
        "memory" => Arc::new(MemoryStore::new()),
        other => {
            return Err(IngestionError::ValidationError(format!(
                "unknown storage type: {}",
                other
            )))
        }
    };

    info!(backend = store.backend(), "Storage initialized");
    Ok(store)
}
