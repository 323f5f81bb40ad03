//! Background job worker
//!
//! A single task drains the job queue in arrival order. Within a job every keyword is
//! counted concurrently, bounded by a semaphore; results keep submission order.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::{JobRecord, StartJobRequest};
use crate::search_client::KeywordCounter;
use crate::JobTable;

/// Count reported for a keyword whose lookup ultimately failed
pub const FAILED_COUNT: i64 = -1;

/// One accepted job waiting for the worker
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: String,
    pub request: StartJobRequest,
}

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_concurrency: usize,
    /// Used when a job does not name an environment
    pub default_environment: String,
}

pub fn spawn_worker(
    receiver: mpsc::UnboundedReceiver<QueuedJob>,
    jobs: JobTable,
    counter: Arc<dyn KeywordCounter>,
    config: WorkerConfig,
) -> JoinHandle<()> {
    tokio::spawn(worker_loop(receiver, jobs, counter, config))
}

async fn worker_loop(
    mut receiver: mpsc::UnboundedReceiver<QueuedJob>,
    jobs: JobTable,
    counter: Arc<dyn KeywordCounter>,
    config: WorkerConfig,
) {
    info!("Background worker started, waiting for jobs");
    while let Some(job) = receiver.recv().await {
        process_job(&jobs, counter.as_ref(), &config, job).await;
    }
    info!("Job queue closed, worker stopping");
}

/// Run one job to its terminal record
pub async fn process_job(jobs: &JobTable, counter: &dyn KeywordCounter, config: &WorkerConfig, job: QueuedJob) {
    let keywords = job.request.keyword_texts();
    info!(job_id = %job.job_id, keywords = keywords.len(), "Processing job");
    jobs.write().await.insert(job.job_id.clone(), JobRecord::Processing);

    let record = match count_keywords(counter, config, &job.request, &keywords).await {
        Ok(results) => {
            info!(job_id = %job.job_id, "Job finished");
            JobRecord::Complete { results }
        }
        Err(message) => {
            warn!(job_id = %job.job_id, "Job failed: {}", message);
            JobRecord::Failed { results: message }
        }
    };
    jobs.write().await.insert(job.job_id, record);
}

async fn count_keywords(
    counter: &dyn KeywordCounter,
    config: &WorkerConfig,
    request: &StartJobRequest,
    keywords: &[Option<String>],
) -> Result<Vec<i64>, String> {
    let shop_id = request
        .shop_id_text()
        .ok_or_else(|| "Job has no shop_id".to_string())?;
    let environment = request
        .environment
        .as_deref()
        .filter(|env| !env.trim().is_empty())
        .unwrap_or(&config.default_environment);

    let semaphore = Semaphore::new(config.max_concurrency.max(1));
    let lookups = keywords.iter().map(|keyword| {
        let semaphore = &semaphore;
        let shop_id = shop_id.as_str();
        async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return FAILED_COUNT;
            };
            match counter.count(shop_id, environment, keyword.as_deref()).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(keyword = ?keyword, "Keyword lookup failed: {}", e);
                    FAILED_COUNT
                }
            }
        }
    });

    Ok(join_all(lookups).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_client::SearchError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::RwLock;

    /// Counts characters; "boom" fails; tracks peak concurrency
    #[derive(Default)]
    struct LengthCounter {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl KeywordCounter for LengthCounter {
        async fn count(&self, _shop_id: &str, environment: &str, keyword: Option<&str>) -> Result<i64, SearchError> {
            assert_eq!(environment, "prod");
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match keyword.map(str::trim) {
                None | Some("") => Ok(0),
                Some("boom") => Err(SearchError::Status(500)),
                Some(k) => Ok(k.len() as i64),
            }
        }
    }

    fn job(value: serde_json::Value) -> QueuedJob {
        QueuedJob {
            job_id: "J1".to_string(),
            request: serde_json::from_value(value).unwrap(),
        }
    }

    fn config(max_concurrency: usize) -> WorkerConfig {
        WorkerConfig {
            max_concurrency,
            default_environment: "prod".to_string(),
        }
    }

    #[tokio::test]
    async fn test_results_keep_order_and_mark_failures() {
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));
        let counter = LengthCounter::default();
        process_job(
            &jobs,
            &counter,
            &config(2),
            job(json!({"shop_id": "7", "keywords": ["abc", "boom", "", null, "hello"]})),
        )
        .await;

        assert_eq!(
            jobs.read().await.get("J1"),
            Some(&JobRecord::Complete { results: vec![3, -1, 0, 0, 5] })
        );
        assert!(counter.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_missing_shop_id_fails_job() {
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));
        process_job(&jobs, &LengthCounter::default(), &config(4), job(json!({"keywords": ["a"]}))).await;

        assert!(matches!(jobs.read().await.get("J1"), Some(JobRecord::Failed { .. })));
    }
}
