//! Direct Postgres storage backend

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, instrument};

use super::{InsertOutcome, NewsStore};
use crate::error::{IngestionError, Result};
use crate::schemas::{NewsItem, PricePoint};

const SCHEMA_SQL: &str = include_str!("../../migrations/0001_create_tables.sql");

#[derive(Clone)]
pub struct PostgresStore {
    db: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to database...");

        let db = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;

        Ok(Self { db })
    }

    /// Creates both tables and the unique index on `finance_news.url`
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.db).await?;
        info!("Schema applied");
        Ok(())
    }
}

#[async_trait]
impl NewsStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn news_exists(&self, url: &str) -> Result<bool> {
        // Runtime query to avoid a compile-time DB requirement
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM finance_news WHERE url = $1)")
            .bind(url)
            .fetch_one(&self.db)
            .await
            .map_err(|e| IngestionError::StorageReadFailed(e.to_string()))?;

        Ok(exists)
    }

    #[instrument(skip(self, item), fields(url = %item.url))]
    async fn insert_news_item(&self, item: &NewsItem) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO finance_news (created_at, title, url, finance_info, source)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(item.created_at)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.summary)
        .bind(&item.source)
        .execute(&self.db)
        .await
        .map_err(|e| IngestionError::StorageWriteFailed(e.to_string()))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyPresent)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    #[instrument(skip(self))]
    async fn insert_price_point(&self, point: &PricePoint) -> Result<()> {
        sqlx::query("INSERT INTO btc_price (price) VALUES ($1)")
            .bind(point.price)
            .execute(&self.db)
            .await
            .map_err(|e| IngestionError::StorageWriteFailed(e.to_string()))?;

        Ok(())
    }
}
