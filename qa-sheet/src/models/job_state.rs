//! Product-count job state machine
//!
//! Idle (no job) → Running (job persisted) → Written (results applied, state cleared)
//!                                         → Failed  (failure recorded, state cleared)

use serde::{Deserialize, Serialize};

/// Keys of the per-document property record
pub mod keys {
    pub const JOB_ID: &str = "JOB_ID";
    pub const JOB_STATUS: &str = "JOB_STATUS";
    pub const SHEET_NAME: &str = "SHEET_NAME";
    pub const SHOP_ID: &str = "SHOP_ID";
    /// JSON list of the 1-based sheet rows the submitted keywords came from
    pub const ROW_NUMBERS: &str = "ROW_NUMBERS";
}

/// Job status as recorded for a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// No job has run, or its outcome was never recorded
    None,
    /// A job id is persisted and awaiting a terminal remote status
    Running,
    Complete,
    /// Remote status (or local reason) that ended the job
    Failed(String),
}

impl JobStatus {
    /// Value stored under `JOB_STATUS` (None/Running are never stored)
    pub fn to_property(&self) -> Option<String> {
        match self {
            JobStatus::Complete => Some("COMPLETE".to_string()),
            JobStatus::Failed(reason) => Some(format!("FAILED: {}", reason)),
            JobStatus::None | JobStatus::Running => None,
        }
    }

    pub fn from_property(value: &str) -> Self {
        if value == "COMPLETE" {
            JobStatus::Complete
        } else if let Some(reason) = value.strip_prefix("FAILED: ") {
            JobStatus::Failed(reason.to_string())
        } else {
            JobStatus::Failed(value.to_string())
        }
    }
}

/// Persisted job record for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    pub job_id: String,
    /// Target sheet; `None` when the record is damaged
    pub sheet_name: Option<String>,
    pub shop_id: Option<String>,
    /// Rows the results map onto; `None` means contiguous from row 2
    pub row_numbers: Option<Vec<usize>>,
    pub status: JobStatus,
}

impl JobState {
    /// 1-based row receiving the result at `index`
    pub fn target_row(&self, index: usize) -> usize {
        self.row_numbers
            .as_ref()
            .and_then(|rows| rows.get(index).copied())
            .unwrap_or(index + 2)
    }
}

/// Result of one poll tick
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No job persisted; the schedule disabled itself
    NoActiveJob,
    /// Remote job still queued or processing
    Processing { job_id: String },
    /// Results written into the target sheet
    Written { job_id: String, rows_written: usize },
    /// Remote job ended `failed` or `not_found`
    Failed { job_id: String, status: String },
    /// Job dropped locally without a usable target (sheet gone, record damaged)
    Abandoned { job_id: String, reason: String },
    /// Transport or parse error; retried on the next tick
    RetryLater { job_id: String, error: String },
    /// Remote answered with a status this client does not know
    UnknownStatus { job_id: String, status: String },
    /// A concurrent tick already claimed this job's completion
    AlreadyClaimed { job_id: String },
}

impl PollOutcome {
    /// True when the schedule driving the poller should stop
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollOutcome::NoActiveJob
                | PollOutcome::Written { .. }
                | PollOutcome::Failed { .. }
                | PollOutcome::Abandoned { .. }
                | PollOutcome::AlreadyClaimed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_property_roundtrip() {
        assert_eq!(JobStatus::Complete.to_property().as_deref(), Some("COMPLETE"));
        assert_eq!(
            JobStatus::Failed("not_found".into()).to_property().as_deref(),
            Some("FAILED: not_found")
        );
        assert_eq!(JobStatus::Running.to_property(), None);
        assert_eq!(JobStatus::from_property("FAILED: failed"), JobStatus::Failed("failed".into()));
        assert_eq!(JobStatus::from_property("COMPLETE"), JobStatus::Complete);
    }

    #[test]
    fn test_target_row_defaults_to_contiguous() {
        let mut state = JobState {
            job_id: "J1".into(),
            sheet_name: Some("S".into()),
            shop_id: None,
            row_numbers: None,
            status: JobStatus::Running,
        };
        assert_eq!(state.target_row(0), 2);
        assert_eq!(state.target_row(2), 4);

        state.row_numbers = Some(vec![3, 7]);
        assert_eq!(state.target_row(1), 7);
        // Past the recorded rows: fall back to contiguous placement
        assert_eq!(state.target_row(2), 4);
    }

    #[test]
    fn test_outcome_terminality() {
        assert!(PollOutcome::NoActiveJob.is_terminal());
        assert!(!PollOutcome::Processing { job_id: "J".into() }.is_terminal());
        assert!(!PollOutcome::RetryLater { job_id: "J".into(), error: "x".into() }.is_terminal());
        assert!(PollOutcome::Abandoned { job_id: "J".into(), reason: "gone".into() }.is_terminal());
    }
}
