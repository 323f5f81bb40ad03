//! Data models for qa-sheet

pub mod job_state;
pub mod keyword_record;

pub use job_state::{JobState, JobStatus, PollOutcome};
pub use keyword_record::ColumnLayout;
