//! Product search backend client
//!
//! One keyword count is one or two search requests:
//! 1. `{query, size, include_fields: ["product_id"]}`: a non-empty `products` list is the count
//! 2. Empty result with `timed_out_services` → retryable timeout
//! 3. Otherwise the query is repeated once without `include_fields`; empty again → 0
//!
//! Transport errors, non-2xx responses and timeouts are retried with randomized
//! exponential backoff.

use async_trait::async_trait;
use qa_common::config::CounterConfig;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Search returned HTTP {0}")]
    Status(u16),

    #[error("Search timed out: {0}")]
    Timeout(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SearchError {
    /// Errors worth another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SearchError::Parse(_))
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            SearchError::Status(status.as_u16())
        } else if err.is_decode() {
            SearchError::Network(format!("Undecodable response: {}", err))
        } else {
            SearchError::Network(err.to_string())
        }
    }
}

/// Counts products for one keyword
#[async_trait]
pub trait KeywordCounter: Send + Sync {
    /// Blank or missing keywords count as 0 without a request
    async fn count(&self, shop_id: &str, environment: &str, keyword: Option<&str>) -> Result<i64, SearchError>;
}

/// Randomized exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): uniform in `[min, min * 2^(attempt-1)]`, capped at max
    pub fn backoff(&self, attempt: u32) -> Duration {
        let min = self.min_backoff.as_secs_f64();
        let max = self.max_backoff.as_secs_f64().max(min);
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let high = (min * 2f64.powi(exponent)).clamp(min, max);
        if high <= min {
            return self.min_backoff;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(min..=high))
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, SearchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SearchError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "Search attempt failed: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_fields: Option<[&'static str; 1]>,
}

/// reqwest-backed search client
pub struct SearchClient {
    http_client: reqwest::Client,
    url_template: String,
    page_size: usize,
    retry: RetryPolicy,
}

impl SearchClient {
    pub fn new(config: &CounterConfig) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url_template: config.search_url_template.clone(),
            page_size: config.page_size,
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                ..RetryPolicy::default()
            },
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Search endpoint for an environment
    pub fn search_url(&self, environment: &str) -> String {
        self.url_template.replace("{env}", environment)
    }

    /// One request; `Ok(None)` when the search found nothing
    async fn fetch_once(
        &self,
        url: &str,
        shop_id: &str,
        query: &str,
        include_fields: bool,
    ) -> Result<Option<i64>, SearchError> {
        let body = SearchRequest {
            query,
            size: self.page_size,
            include_fields: include_fields.then_some(["product_id"]),
        };

        let response = self
            .http_client
            .post(url)
            .query(&[("shop_id", shop_id)])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let json: Value = response.json().await?;
        if !json.is_object() {
            return Err(SearchError::Parse(format!("Unexpected search response: {}", json)));
        }
        let products = json
            .get("products")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        if products > 0 {
            return Ok(Some(products as i64));
        }
        if json.get("timed_out_services").is_some() {
            return Err(SearchError::Timeout("Search service timed out".to_string()));
        }
        Ok(None)
    }
}

#[async_trait]
impl KeywordCounter for SearchClient {
    async fn count(&self, shop_id: &str, environment: &str, keyword: Option<&str>) -> Result<i64, SearchError> {
        let query = match keyword.map(str::trim) {
            Some(q) if !q.is_empty() => q,
            _ => return Ok(0),
        };
        let url = self.search_url(environment);

        if let Some(count) = self
            .retry
            .run(|| self.fetch_once(&url, shop_id, query, true))
            .await?
        {
            return Ok(count);
        }

        debug!(keyword = %query, "No products with trimmed fields, retrying full search");
        Ok(self
            .retry
            .run(|| self.fetch_once(&url, shop_id, query, false))
            .await?
            .unwrap_or(0))
    }
}
