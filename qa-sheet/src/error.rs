//! Error types for qa-sheet
//!
//! Mirrors the automation's error taxonomy:
//! - `Validation`: bad input, surfaced synchronously, nothing changed
//! - `Network`: remote call failed (job start surfaces it, polling swallows it)
//! - `JobInProgress`: a job is active and no explicit override was given
//!
//! A remote job ending `failed` / `not_found` is not an error here: the poller records
//! it as `JobStatus::Failed` and `status` reports it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("A job is already running (job {job_id}); start with an explicit override to replace it")]
    JobInProgress { job_id: String },

    #[error(transparent)]
    Common(#[from] qa_common::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AutomationError {
    /// Errors the user must act on (as opposed to transient infrastructure noise)
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AutomationError::Validation(_) | AutomationError::JobInProgress { .. }
        )
    }
}

pub type AutomationResult<T> = Result<T, AutomationError>;
