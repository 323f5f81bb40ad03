//! Job records and request payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /start_job`
///
/// Only `keywords` is required on the wire; a job without a shop id fails in the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct StartJobRequest {
    #[serde(default)]
    pub shop_id: Option<Value>,
    pub keywords: Vec<Value>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl StartJobRequest {
    /// Shop id as sent to the search backend (numbers are accepted as-is)
    pub fn shop_id_text(&self) -> Option<String> {
        match self.shop_id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Keywords in submission order; `None` for null entries
    pub fn keyword_texts(&self) -> Vec<Option<String>> {
        self.keywords
            .iter()
            .map(|value| match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartJobResponse {
    pub status: &'static str,
    pub job_id: String,
}

/// Stored job state, serialized as the `get_results` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobRecord {
    Queued,
    Processing,
    /// One count per submitted keyword, -1 where the lookup failed
    Complete { results: Vec<i64> },
    /// Job-level failure message
    Failed { results: String },
}

impl JobRecord {
    pub fn status(&self) -> &'static str {
        match self {
            JobRecord::Queued => "queued",
            JobRecord::Processing => "processing",
            JobRecord::Complete { .. } => "complete",
            JobRecord::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wire_shape() {
        assert_eq!(serde_json::to_value(JobRecord::Queued).unwrap(), json!({"status": "queued"}));
        assert_eq!(
            serde_json::to_value(JobRecord::Complete { results: vec![3, 0, -1] }).unwrap(),
            json!({"status": "complete", "results": [3, 0, -1]})
        );
        assert_eq!(
            serde_json::to_value(JobRecord::Failed { results: "boom".into() }).unwrap(),
            json!({"status": "failed", "results": "boom"})
        );
    }

    #[test]
    fn test_request_accessors() {
        let request: StartJobRequest =
            serde_json::from_value(json!({"shop_id": 42, "keywords": ["a", null, 7]})).unwrap();
        assert_eq!(request.shop_id_text().as_deref(), Some("42"));
        assert_eq!(
            request.keyword_texts(),
            vec![Some("a".to_string()), None, Some("7".to_string())]
        );
        assert!(request.environment.is_none());
    }
}
