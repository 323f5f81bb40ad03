//! # qa-counter
//!
//! Product-count job service. Accepts keyword lists, counts the products the search
//! backend returns for each keyword in a background worker, and serves the results
//! by job id.

pub mod api;
pub mod error;
pub mod models;
pub mod search_client;
pub mod worker;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tower_http::trace::TraceLayer;

use crate::models::JobRecord;
use crate::worker::QueuedJob;

/// Job records by job id; in memory, lost on restart
pub type JobTable = Arc<RwLock<HashMap<String, JobRecord>>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobTable,
    /// Sender side of the worker queue
    pub queue: mpsc::UnboundedSender<QueuedJob>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// New state plus the receiver the worker drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedJob>) {
        let (queue, receiver) = mpsc::unbounded_channel();
        let state = Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            queue,
            startup_time: Utc::now(),
        };
        (state, receiver)
    }
}

async fn route_not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::job_routes())
        .merge(api::health_routes())
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
