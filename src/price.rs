//! Bitcoin price quotes from CoinGecko's `simple/price` endpoint.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{IngestionError, Result};
use crate::http_client::{ServiceClient, SharedHttpClient};

const COIN_ID: &str = "bitcoin";
const VS_CURRENCY: &str = "usd";

/// Source of the current Bitcoin price
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current price in USD; fails with `PriceUnavailable`
    async fn current_price(&self) -> Result<f64>;
}

/// Reads `{coin_id: {vs_currency: price}}` out of a `simple/price` body
fn extract_price(json: &Value, coin_id: &str, vs_currency: &str) -> Option<f64> {
    json.get(coin_id)
        .and_then(|v| v.get(vs_currency))
        .and_then(|v| v.as_f64())
        .filter(|price| price.is_finite() && *price > 0.0)
}

pub struct CoinGeckoPriceFeed {
    client: ServiceClient,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoPriceFeed {
    pub fn new(http_client: Arc<SharedHttpClient>, base_url: &str, api_key: Option<String>, rate_limit_rpm: u32) -> Self {
        Self {
            client: ServiceClient::new(http_client, "coingecko", rate_limit_rpm),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(http_client: Arc<SharedHttpClient>, config: &Config) -> Self {
        Self::new(
            http_client,
            &config.coingecko_api_url,
            config.coingecko_api_key.clone(),
            config.price_rate_limit_rpm,
        )
    }

    async fn fetch_price(&self) -> Result<f64> {
        let url = format!("{}/simple/price", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("ids", COIN_ID), ("vs_currencies", VS_CURRENCY)]);

        if let Some(ref key) = self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = self.client.send(request).await?;
        let json: Value = response.json().await?;

        extract_price(&json, COIN_ID, VS_CURRENCY).ok_or_else(|| {
            IngestionError::ValidationError(format!("response has no {}.{} price", COIN_ID, VS_CURRENCY))
        })
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoPriceFeed {
    #[instrument(skip(self), fields(coin = COIN_ID))]
    async fn current_price(&self) -> Result<f64> {
        let price = self
            .fetch_price()
            .await
            .map_err(|e| IngestionError::PriceUnavailable(e.to_string()))?;

        info!(price, currency = VS_CURRENCY, "Fetched current price");
        Ok(price)
    }
}
