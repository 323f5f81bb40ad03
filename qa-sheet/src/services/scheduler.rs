//! Time-based poll scheduling
//!
//! Each persisted polling trigger runs as a tokio task that sleeps for the trigger's
//! interval, re-reads its trigger row and, if the row still exists, performs one poll
//! tick against the workbook the trigger names. The task ends when:
//! - its cancellation token fires (`delete_all_triggers` or `ScheduleHandle::cancel`)
//! - its trigger row is gone (deleted by a terminal tick or by another process)
//! - a tick reports a terminal outcome

use qa_common::sheet::Workbook;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::{Trigger, TriggerHandler, TriggerStore};
use crate::error::AutomationResult;
use crate::models::PollOutcome;
use crate::services::job_client::CountJobApi;
use crate::services::poller::Poller;

/// Handle of one running schedule
pub struct ScheduleHandle {
    pub trigger_id: Uuid,
    token: CancellationToken,
    task: JoinHandle<Option<PollOutcome>>,
}

impl ScheduleHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the schedule to stop; returns the last tick's outcome, if any
    pub async fn join(self) -> Option<PollOutcome> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(trigger_id = %self.trigger_id, "Schedule task failed: {}", e);
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    pool: SqlitePool,
    api: Arc<dyn CountJobApi>,
    tokens: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl Scheduler {
    pub fn new(pool: SqlitePool, api: Arc<dyn CountJobApi>) -> Self {
        Self {
            pool,
            api,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start the task for one trigger
    pub fn spawn_polling(&self, trigger: Trigger) -> ScheduleHandle {
        let token = CancellationToken::new();
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(trigger.trigger_id, token.clone());
        }

        let trigger_id = trigger.trigger_id;
        let scheduler = self.clone();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let outcome = scheduler.run_schedule(&trigger, &task_token).await;
            if let Ok(mut tokens) = scheduler.tokens.lock() {
                tokens.remove(&trigger.trigger_id);
            }
            outcome
        });

        ScheduleHandle {
            trigger_id,
            token,
            task,
        }
    }

    /// Start a task for every persisted trigger
    pub async fn spawn_all(&self) -> AutomationResult<Vec<ScheduleHandle>> {
        let triggers = TriggerStore::new(self.pool.clone()).list().await?;
        tracing::info!(count = triggers.len(), "Starting stored triggers");
        Ok(triggers.into_iter().map(|t| self.spawn_polling(t)).collect())
    }

    /// Run every stored trigger until all of them stop
    pub async fn run_until_idle(&self) -> AutomationResult<Vec<PollOutcome>> {
        let handles = self.spawn_all().await?;
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(outcome) = handle.join().await {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    /// Delete every trigger row and stop every schedule of this process
    pub async fn delete_all_triggers(&self) -> AutomationResult<u64> {
        let deleted = TriggerStore::new(self.pool.clone()).delete_all().await?;
        let cancelled = match self.tokens.lock() {
            Ok(mut tokens) => {
                let count = tokens.len();
                for (_, token) in tokens.drain() {
                    token.cancel();
                }
                count
            }
            Err(_) => 0,
        };
        tracing::info!(deleted, cancelled, "Deleted all triggers");
        Ok(deleted)
    }

    async fn run_schedule(&self, trigger: &Trigger, token: &CancellationToken) -> Option<PollOutcome> {
        let interval = Duration::from_secs(trigger.interval_seconds.max(1));
        let triggers = TriggerStore::new(self.pool.clone());
        let mut last = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(trigger_id = %trigger.trigger_id, "Schedule cancelled");
                    return last;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            match triggers.exists(trigger.trigger_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(trigger_id = %trigger.trigger_id, "Trigger deleted; schedule stopped");
                    return last;
                }
                Err(e) => {
                    tracing::error!(trigger_id = %trigger.trigger_id, "Trigger lookup failed: {}", e);
                    continue;
                }
            }

            match self.tick(trigger).await {
                Ok(outcome) => {
                    let terminal = outcome.is_terminal();
                    last = Some(outcome);
                    if terminal {
                        return last;
                    }
                }
                Err(e) => {
                    tracing::error!(trigger_id = %trigger.trigger_id, "Poll tick failed: {}", e);
                }
            }
        }
    }

    async fn tick(&self, trigger: &Trigger) -> AutomationResult<PollOutcome> {
        match trigger.handler {
            TriggerHandler::PollForResults => {
                let mut poller = Poller::new(self.pool.clone(), &trigger.document_id, self.api.clone());
                match Workbook::open(&trigger.workbook_path) {
                    Ok(mut workbook) => poller.poll_once(&mut workbook).await,
                    Err(e) => {
                        tracing::warn!(
                            trigger_id = %trigger.trigger_id,
                            path = %trigger.workbook_path.display(),
                            "Workbook unreadable: {}",
                            e
                        );
                        poller.abandon_active("workbook_unreadable").await
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_pool, JobStateStore};
    use crate::services::job_client::{ClientError, RemoteStatus};
    use async_trait::async_trait;
    use qa_common::sheet::{Sheet, SheetStore};
    use std::path::PathBuf;

    struct AlwaysComplete;

    #[async_trait]
    impl CountJobApi for AlwaysComplete {
        async fn start_job(&self, _keywords: &[String], _shop_id: &str) -> Result<String, ClientError> {
            Ok("J1".to_string())
        }

        async fn get_results(&self, _job_id: &str) -> Result<RemoteStatus, ClientError> {
            Ok(RemoteStatus::Complete(vec![4.0]))
        }
    }

    #[tokio::test]
    async fn test_schedule_writes_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mut wb = Workbook::with_sheets("qa", vec![Sheet::from_strings("S", &[&["keyword"], &["kw"]])]);
        wb.save_to(dir.path()).unwrap();

        let pool = init_memory_pool().await.unwrap();
        JobStateStore::new(pool.clone(), wb.dataset_id())
            .begin("J1", "S", "shop", None)
            .await
            .unwrap();
        let trigger = TriggerStore::new(pool.clone())
            .create_polling_trigger(wb.dataset_id(), dir.path().to_path_buf(), 1)
            .await
            .unwrap();

        let scheduler = Scheduler::new(pool.clone(), Arc::new(AlwaysComplete));
        let outcome = scheduler.spawn_polling(trigger).join().await;
        assert!(matches!(outcome, Some(PollOutcome::Written { rows_written: 1, .. })));

        let saved = Workbook::open(dir.path()).unwrap();
        assert_eq!(saved.header_row("S").unwrap()[1].display(), "PC");
        assert!(TriggerStore::new(pool).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_cancels_running_schedules() {
        let pool = init_memory_pool().await.unwrap();
        let trigger = TriggerStore::new(pool.clone())
            .create_polling_trigger("doc", PathBuf::from("/nonexistent"), 3600)
            .await
            .unwrap();

        let scheduler = Scheduler::new(pool.clone(), Arc::new(AlwaysComplete));
        let handle = scheduler.spawn_polling(trigger);
        tokio::task::yield_now().await;

        assert_eq!(scheduler.delete_all_triggers().await.unwrap(), 1);
        assert_eq!(handle.join().await, None);
    }
}
