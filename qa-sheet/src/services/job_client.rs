//! Product-count job API client
//!
//! Wire contract of the remote job queue:
//! - `POST {base}/start_job` `{shop_id, keywords}` → `200 {job_id}`
//! - `GET {base}/get_results/{job_id}` → `{status, results?}`, where `results` is present
//!   for `complete` and index-aligned with the submitted keywords

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::error::AutomationError;

const USER_AGENT: &str = concat!("qa-sheet/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<ClientError> for AutomationError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Validation(msg) => AutomationError::Validation(msg),
            other => AutomationError::Network(other.to_string()),
        }
    }
}

/// Status reported by `get_results`
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteStatus {
    Queued,
    Processing,
    /// One count per submitted keyword, `null` already replaced by 0
    Complete(Vec<f64>),
    Failed,
    NotFound,
    Unknown(String),
}

impl RemoteStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RemoteStatus::Queued => "queued",
            RemoteStatus::Processing => "processing",
            RemoteStatus::Complete(_) => "complete",
            RemoteStatus::Failed => "failed",
            RemoteStatus::NotFound => "not_found",
            RemoteStatus::Unknown(status) => status,
        }
    }

    /// Parse a `get_results` body
    pub fn from_body(body: &Value) -> Result<Self, ClientError> {
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Parse("Response has no status".to_string()))?;

        Ok(match status {
            "queued" => RemoteStatus::Queued,
            "processing" => RemoteStatus::Processing,
            "failed" => RemoteStatus::Failed,
            "not_found" => RemoteStatus::NotFound,
            "complete" => {
                let results = body
                    .get("results")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ClientError::Parse("Complete job without results".to_string()))?;
                let counts = results
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(0.0),
                        Value::Number(n) => n
                            .as_f64()
                            .ok_or_else(|| ClientError::Parse(format!("Bad count: {}", n))),
                        other => Err(ClientError::Parse(format!("Bad count: {}", other))),
                    })
                    .collect::<Result<Vec<f64>, _>>()?;
                RemoteStatus::Complete(counts)
            }
            other => RemoteStatus::Unknown(other.to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct StartJobRequest<'a> {
    shop_id: &'a str,
    keywords: &'a [String],
}

#[derive(Debug, Deserialize)]
struct StartJobResponse {
    job_id: String,
}

/// Remote product-count job queue
#[async_trait]
pub trait CountJobApi: Send + Sync {
    /// Submit keywords; returns the remote job id
    async fn start_job(&self, keywords: &[String], shop_id: &str) -> Result<String, ClientError>;

    async fn get_results(&self, job_id: &str) -> Result<RemoteStatus, ClientError>;
}

/// Checks applied before anything is sent
pub fn validate_job_request(keywords: &[String], shop_id: &str) -> Result<(), ClientError> {
    if shop_id.trim().is_empty() {
        return Err(ClientError::Validation(
            "Shop ID is required to start the job.".to_string(),
        ));
    }
    if keywords.is_empty() {
        return Err(ClientError::Validation("No keywords found to process.".to_string()));
    }
    Ok(())
}

/// reqwest-backed client
pub struct ProductCountClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ProductCountClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CountJobApi for ProductCountClient {
    async fn start_job(&self, keywords: &[String], shop_id: &str) -> Result<String, ClientError> {
        validate_job_request(keywords, shop_id)?;

        let url = format!("{}/start_job", self.base_url);
        tracing::debug!(url = %url, keywords = keywords.len(), "Submitting product-count job");

        let response = self
            .http_client
            .post(&url)
            .json(&StartJobRequest {
                shop_id: shop_id.trim(),
                keywords,
            })
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(status.as_u16(), error_text));
        }

        let body: StartJobResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        tracing::info!(job_id = %body.job_id, keywords = keywords.len(), "Product-count job started");
        Ok(body.job_id)
    }

    async fn get_results(&self, job_id: &str) -> Result<RemoteStatus, ClientError> {
        let url = format!("{}/get_results/{}", self.base_url, job_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        // The status body is authoritative whatever the HTTP code
        let code = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !code.is_success() => return Err(ClientError::Api(code.as_u16(), text)),
            Err(e) => return Err(ClientError::Parse(e.to_string())),
        };

        RemoteStatus::from_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_complete_replaces_null() {
        let status = RemoteStatus::from_body(&json!({"status": "complete", "results": [3, null, 5]})).unwrap();
        assert_eq!(status, RemoteStatus::Complete(vec![3.0, 0.0, 5.0]));
    }

    #[test]
    fn test_parse_other_statuses() {
        assert_eq!(
            RemoteStatus::from_body(&json!({"status": "processing"})).unwrap(),
            RemoteStatus::Processing
        );
        assert_eq!(
            RemoteStatus::from_body(&json!({"status": "failed", "results": "boom"})).unwrap(),
            RemoteStatus::Failed
        );
        assert_eq!(
            RemoteStatus::from_body(&json!({"status": "paused"})).unwrap(),
            RemoteStatus::Unknown("paused".into())
        );
        assert!(RemoteStatus::from_body(&json!({"status": "complete"})).is_err());
        assert!(RemoteStatus::from_body(&json!({"error": "x"})).is_err());
    }

    #[test]
    fn test_validation_before_network() {
        assert!(matches!(
            validate_job_request(&[], "shop"),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            validate_job_request(&["kw".to_string()], "  "),
            Err(ClientError::Validation(_))
        ));
        assert!(validate_job_request(&["kw".to_string()], "shop").is_ok());
    }

    #[tokio::test]
    async fn test_empty_keywords_rejected_without_request() {
        // Unroutable base URL: any request would surface as a network error
        let client = ProductCountClient::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        let err = client.start_job(&[], "shop").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_error_conversion() {
        let err: AutomationError = ClientError::Api(500, "down".into()).into();
        assert!(matches!(err, AutomationError::Network(_)));
        let err: AutomationError = ClientError::Validation("x".into()).into();
        assert!(err.is_user_facing());
    }
}
