//! In-memory storage backend
//!
//! Mirrors the table defaults: ids are assigned in insert order, `btc_price`
//! rows get `created_at` at insert time, and `finance_news.url` is unique.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::debug;

use super::{InsertOutcome, NewsStore};
use crate::error::Result;
use crate::schemas::{NewsItem, PricePoint};

#[derive(Default)]
struct Tables {
    news: Vec<NewsItem>,
    news_urls: HashSet<String>,
    prices: Vec<PricePoint>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with existing `finance_news` rows
    pub fn with_news(items: impl IntoIterator<Item = NewsItem>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write();
            for item in items {
                if tables.news_urls.insert(item.url.clone()) {
                    tables.news.push(item);
                }
            }
        }
        store
    }

    pub fn news_rows(&self) -> Vec<NewsItem> {
        self.tables.read().news.clone()
    }

    pub fn price_rows(&self) -> Vec<PricePoint> {
        self.tables.read().prices.clone()
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn news_exists(&self, url: &str) -> Result<bool> {
        Ok(self.tables.read().news_urls.contains(url))
    }

    async fn insert_news_item(&self, item: &NewsItem) -> Result<InsertOutcome> {
        let mut tables = self.tables.write();
        if !tables.news_urls.insert(item.url.clone()) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        tables.news.push(item.clone());
        debug!(id = tables.news.len(), url = %item.url, "Inserted news row");
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_price_point(&self, point: &PricePoint) -> Result<()> {
        let mut tables = self.tables.write();
        tables.prices.push(PricePoint {
            price: point.price,
            created_at: Some(Utc::now()),
        });
        debug!(id = tables.prices.len(), price = point.price, "Inserted price row");
        Ok(())
    }
}
