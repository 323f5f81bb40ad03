//! Job queue endpoints
//!
//! - `POST /start_job` `{shop_id, keywords, environment?}` → `{"status": "success", "job_id"}`
//! - `GET /get_results/{job_id}` → stored record, or `{"status": "not_found"}`

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::models::{JobRecord, StartJobRequest, StartJobResponse};
use crate::worker::QueuedJob;
use crate::{ApiError, ApiResult, AppState};

/// Parse a `start_job` body; anything without a `keywords` list is rejected
pub fn parse_start_job(body: &[u8]) -> Result<StartJobRequest, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJobRequest)?;
    if value.get("keywords").is_none() {
        return Err(ApiError::InvalidJobRequest);
    }
    serde_json::from_value(value).map_err(|_| ApiError::InvalidJobRequest)
}

/// POST /start_job
pub async fn start_job(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<StartJobResponse>> {
    let request = parse_start_job(&body)?;
    let job_id = Uuid::new_v4().to_string();
    let keyword_count = request.keywords.len();

    state.jobs.write().await.insert(job_id.clone(), JobRecord::Queued);
    if state
        .queue
        .send(QueuedJob {
            job_id: job_id.clone(),
            request,
        })
        .is_err()
    {
        state.jobs.write().await.remove(&job_id);
        return Err(ApiError::Internal("Job queue is closed".to_string()));
    }

    info!(job_id = %job_id, keywords = keyword_count, "Queued job");
    Ok(Json(StartJobResponse {
        status: "success",
        job_id,
    }))
}

/// GET /get_results/{job_id}
pub async fn get_results(State(state): State<AppState>, Path(job_id): Path<String>) -> Json<Value> {
    match state.jobs.read().await.get(&job_id) {
        Some(record) => Json(serde_json::to_value(record).unwrap_or_else(|_| json!({"status": "failed"}))),
        None => Json(json!({"status": "not_found"})),
    }
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/start_job", post(start_job))
        .route("/get_results/:job_id", get(get_results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_job() {
        assert!(parse_start_job(br#"{"shop_id": "1", "keywords": ["a"]}"#).is_ok());
        assert!(parse_start_job(br#"{"shop_id": "1", "keywords": []}"#).is_ok());
        assert!(matches!(parse_start_job(b""), Err(ApiError::InvalidJobRequest)));
        assert!(matches!(parse_start_job(br#"{"shop_id": "1"}"#), Err(ApiError::InvalidJobRequest)));
        assert!(matches!(
            parse_start_job(br#"{"keywords": "not a list"}"#),
            Err(ApiError::InvalidJobRequest)
        ));
    }
}
