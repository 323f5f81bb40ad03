//! Poller state machine
//!
//! One call to [`Poller::poll_once`] is one scheduled tick. Each tick reads the persisted
//! job state, asks the remote service once and applies the transition:
//!
//! | Remote status           | Effect                                                  |
//! |-------------------------|---------------------------------------------------------|
//! | `queued` / `processing` | none                                                    |
//! | `complete`              | claim job, write PC column, re-filter, record COMPLETE  |
//! | `failed` / `not_found`  | record `FAILED: <status>`                               |
//! | unknown status          | log only                                                |
//! | transport/parse error   | log only, retried next tick                             |
//!
//! Terminal transitions clear the job state and delete the document's polling trigger.
//! A tick without a job state deletes the trigger and does nothing else. A target sheet
//! that no longer exists ends the job without contacting the remote service.

use qa_common::sheet::{column_index, CellValue, HeaderCache, SheetStore};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::{JobStateStore, TriggerStore};
use crate::error::AutomationResult;
use crate::models::keyword_record::headers;
use crate::models::{JobState, JobStatus, PollOutcome};
use crate::services::job_client::{CountJobApi, RemoteStatus};
use crate::services::sheet_format::apply_pc_filter;

/// Header given to a PC column created at write time
pub const PC_COLUMN_HEADER: &str = "PC";

pub struct Poller {
    state: JobStateStore,
    triggers: TriggerStore,
    api: Arc<dyn CountJobApi>,
    cache: HeaderCache,
}

impl Poller {
    pub fn new(pool: SqlitePool, document_id: &str, api: Arc<dyn CountJobApi>) -> Self {
        Self {
            state: JobStateStore::new(pool.clone(), document_id),
            triggers: TriggerStore::new(pool),
            api,
            cache: HeaderCache::new(),
        }
    }

    pub fn document_id(&self) -> &str {
        self.state.document_id()
    }

    /// Run one tick against `store`, the workbook the job was started from
    pub async fn poll_once<S: SheetStore + ?Sized>(&mut self, store: &mut S) -> AutomationResult<PollOutcome> {
        let Some(job) = self.state.load().await? else {
            self.disable_schedule().await?;
            tracing::debug!(document = %self.document_id(), "No active job; polling disabled");
            return Ok(PollOutcome::NoActiveJob);
        };

        let Some(sheet_name) = job.sheet_name.clone() else {
            tracing::warn!(job_id = %job.job_id, "Job found, but no target sheet name. Cleaning up.");
            return self.abandon(&job.job_id, "no_target_sheet").await;
        };
        if !store.has_sheet(&sheet_name) {
            tracing::warn!(job_id = %job.job_id, sheet = %sheet_name, "Target sheet no longer exists");
            return self.abandon(&job.job_id, "sheet_missing").await;
        }

        tracing::info!(job_id = %job.job_id, sheet = %sheet_name, "Polling for results");
        let status = match self.api.get_results(&job.job_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, "Polling network error: {}", e);
                return Ok(PollOutcome::RetryLater {
                    job_id: job.job_id,
                    error: e.to_string(),
                });
            }
        };

        match status {
            RemoteStatus::Queued | RemoteStatus::Processing => {
                tracing::info!(job_id = %job.job_id, status = status.as_str(), "Job is still processing");
                Ok(PollOutcome::Processing { job_id: job.job_id })
            }
            RemoteStatus::Complete(results) => self.complete(store, &job, &sheet_name, &results).await,
            RemoteStatus::Failed | RemoteStatus::NotFound => {
                let status = status.as_str().to_string();
                tracing::warn!(job_id = %job.job_id, status = %status, "Job failed or was not found");
                self.state.record_status(&JobStatus::Failed(status.clone())).await?;
                self.cleanup().await?;
                Ok(PollOutcome::Failed {
                    job_id: job.job_id,
                    status,
                })
            }
            RemoteStatus::Unknown(status) => {
                tracing::warn!(job_id = %job.job_id, "Unknown server status: {}", status);
                Ok(PollOutcome::UnknownStatus {
                    job_id: job.job_id,
                    status,
                })
            }
        }
    }

    /// End `job_id` locally without a result (unreadable target)
    pub async fn abandon(&mut self, job_id: &str, reason: &str) -> AutomationResult<PollOutcome> {
        self.state
            .record_status(&JobStatus::Failed(reason.to_string()))
            .await?;
        self.cleanup().await?;
        Ok(PollOutcome::Abandoned {
            job_id: job_id.to_string(),
            reason: reason.to_string(),
        })
    }

    /// Abandon whatever job is active; disables the schedule when there is none
    pub async fn abandon_active(&mut self, reason: &str) -> AutomationResult<PollOutcome> {
        match self.state.load().await? {
            Some(job) => self.abandon(&job.job_id, reason).await,
            None => {
                self.disable_schedule().await?;
                Ok(PollOutcome::NoActiveJob)
            }
        }
    }

    async fn complete<S: SheetStore + ?Sized>(
        &mut self,
        store: &mut S,
        job: &JobState,
        sheet: &str,
        results: &[f64],
    ) -> AutomationResult<PollOutcome> {
        if !self.state.claim(&job.job_id).await? {
            tracing::info!(job_id = %job.job_id, "Completion already claimed by another tick");
            return Ok(PollOutcome::AlreadyClaimed {
                job_id: job.job_id.clone(),
            });
        }
        tracing::info!(job_id = %job.job_id, results = results.len(), "Job is complete. Writing results.");

        match self.write_results(store, job, sheet, results) {
            Ok(()) => {
                self.state.record_status(&JobStatus::Complete).await?;
                self.cleanup().await?;
                tracing::info!(job_id = %job.job_id, sheet = %sheet, "Product counts populated");
                Ok(PollOutcome::Written {
                    job_id: job.job_id.clone(),
                    rows_written: results.len(),
                })
            }
            Err(e) => {
                tracing::error!(job_id = %job.job_id, "Writing results failed: {}", e);
                self.state
                    .record_status(&JobStatus::Failed(format!("write_failed: {}", e)))
                    .await?;
                self.cleanup().await?;
                Err(e.into())
            }
        }
    }

    fn write_results<S: SheetStore + ?Sized>(
        &mut self,
        store: &mut S,
        job: &JobState,
        sheet: &str,
        results: &[f64],
    ) -> qa_common::Result<()> {
        let names = self.cache.headers(&*store, sheet)?;
        let column = match column_index(&names, headers::PC) {
            Some(index) => index + 1,
            None => {
                tracing::info!(sheet = %sheet, "PC column not found. Creating it.");
                let column = store.append_column(sheet, PC_COLUMN_HEADER)?;
                self.cache.invalidate(store.dataset_id(), sheet);
                column
            }
        };

        match &job.row_numbers {
            None if !results.is_empty() => {
                let block: Vec<Vec<CellValue>> =
                    results.iter().map(|count| vec![CellValue::Number(*count)]).collect();
                store.write_block(sheet, 2, column, &block)?;
            }
            None => {}
            Some(_) => {
                for (index, count) in results.iter().enumerate() {
                    store.write_block(sheet, job.target_row(index), column, &[vec![CellValue::Number(*count)]])?;
                }
            }
        }

        apply_pc_filter(store, &mut self.cache, sheet)?;
        store.flush()
    }

    async fn cleanup(&mut self) -> AutomationResult<()> {
        self.state.clear().await?;
        self.disable_schedule().await?;
        self.cache.clear();
        Ok(())
    }

    async fn disable_schedule(&self) -> AutomationResult<()> {
        let removed = self.triggers.delete_polling_triggers(self.document_id()).await?;
        if removed > 0 {
            tracing::info!(document = %self.document_id(), removed, "Polling trigger deleted");
        }
        Ok(())
    }
}
