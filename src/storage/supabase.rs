//! Supabase (PostgREST) storage backend

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{InsertOutcome, NewsStore};
use crate::error::{IngestionError, Result};
use crate::http_client::{ServiceClient, SharedHttpClient};
use crate::schemas::{NewsItem, PricePoint, NEWS_TABLE, PRICE_TABLE};

pub struct SupabaseStore {
    client: ServiceClient,
    rest_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(http_client: Arc<SharedHttpClient>, project_url: &str, api_key: &str, rate_limit_rpm: u32) -> Self {
        Self {
            client: ServiceClient::new(http_client, "supabase", rate_limit_rpm),
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn insert_row<T: serde::Serialize + ?Sized>(&self, table: &str, row: &T) -> Result<()> {
        let request = self
            .authorized(self.client.post(&self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(row);

        self.client.send(request).await?;
        Ok(())
    }
}

/// PostgREST answers a unique-constraint violation with 409 Conflict
fn is_conflict(error: &IngestionError) -> bool {
    matches!(error, IngestionError::ApiError { code, .. } if code == "409")
}

#[async_trait]
impl NewsStore for SupabaseStore {
    fn backend(&self) -> &'static str {
        "supabase"
    }

    #[instrument(skip(self))]
    async fn news_exists(&self, url: &str) -> Result<bool> {
        let filter = format!("eq.{}", url);
        let request = self
            .authorized(self.client.get(&self.table_url(NEWS_TABLE)))
            .query(&[("select", "id"), ("url", filter.as_str()), ("limit", "1")]);

        let rows: Vec<Value> = async {
            let response = self.client.send(request).await?;
            Ok::<_, IngestionError>(response.json::<Vec<Value>>().await?)
        }
        .await
        .map_err(|e| IngestionError::StorageReadFailed(e.to_string()))?;

        debug!(matches = rows.len(), "Checked for existing article");
        Ok(!rows.is_empty())
    }

    #[instrument(skip(self, item), fields(url = %item.url))]
    async fn insert_news_item(&self, item: &NewsItem) -> Result<InsertOutcome> {
        match self.insert_row(NEWS_TABLE, item).await {
            Ok(()) => Ok(InsertOutcome::Inserted),
            Err(e) if is_conflict(&e) => Ok(InsertOutcome::AlreadyPresent),
            Err(e) => Err(IngestionError::StorageWriteFailed(e.to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn insert_price_point(&self, point: &PricePoint) -> Result<()> {
        self.insert_row(PRICE_TABLE, point)
            .await
            .map_err(|e| IngestionError::StorageWriteFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url() {
        let http = Arc::new(SharedHttpClient::with_defaults().unwrap());
        let store = SupabaseStore::new(http, "https://abc.supabase.co/", "key", 60);
        assert_eq!(store.table_url(NEWS_TABLE), "https://abc.supabase.co/rest/v1/finance_news");
    }

    #[test]
    fn test_conflict_detection() {
        let conflict = IngestionError::ApiError {
            code: "409".to_string(),
            message: "duplicate key value violates unique constraint".to_string(),
        };
        let server_error = IngestionError::ApiError {
            code: "500".to_string(),
            message: String::new(),
        };
        assert!(is_conflict(&conflict));
        assert!(!is_conflict(&server_error));
    }
}
