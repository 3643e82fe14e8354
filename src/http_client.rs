//! HTTP Client Module
//!
//! One shared reqwest client for every external service, with:
//! - Semaphore-based limiting of in-flight requests
//! - Per-service rate limiting (requests per minute)
//! - Non-success statuses mapped to `IngestionError::ApiError`
//!
//! Requests are never retried here. A failed call fails its part of the run
//! and the next scheduled run picks it up again.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{clock::DefaultClock, middleware::NoOpMiddleware, state::NotKeyed, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, Response};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{IngestionError, Result};

/// Longest error body kept in an `ApiError` message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Configuration for the shared HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum concurrent requests across all services
    pub max_concurrent_requests: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("finance-news-agent/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests,
            request_timeout: config.request_timeout,
            ..Default::default()
        }
    }
}

/// HTTP client shared by every service client
pub struct SharedHttpClient {
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl SharedHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests));

        Ok(Self { client, semaphore })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Sends a request while holding a concurrency permit
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| IngestionError::ValidationError("HTTP semaphore closed".to_string()))?;

        let request = request.build()?;
        debug!(method = %request.method(), url = %request.url(), "Executing HTTP request");

        let response = self.client.execute(request).await?;
        let status = response.status();

        if status.is_success() {
            debug!(status = %status, "Request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        warn!(status = %status, body = %message, "Request returned error status");

        Err(IngestionError::ApiError {
            code: status.as_u16().to_string(),
            message,
        })
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Rate-limited client for one external service
pub struct ServiceClient {
    http: Arc<SharedHttpClient>,
    rate_limiter: RateLimiter<NotKeyed, governor::state::InMemoryState, DefaultClock, NoOpMiddleware>,
    service: String,
}

impl ServiceClient {
    pub fn new(http: Arc<SharedHttpClient>, service: &str, rate_limit_rpm: u32) -> Self {
        let rpm = NonZeroU32::new(rate_limit_rpm).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_minute(rpm));

        Self {
            http,
            rate_limiter,
            service: service.to_string(),
        }
    }

    /// Starts a request on the shared client
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.inner().request(method, url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Waits for the service's rate limit, then sends
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.rate_limiter.until_ready().await;
        debug!(service = %self.service, "Rate limit slot acquired");
        self.http.send(request).await
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}
