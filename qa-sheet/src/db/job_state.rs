//! Job State Store
//!
//! Key-value properties scoped per document (workbook dataset id). At most one job is
//! active per document: its presence is the presence of the `JOB_ID` property.

use qa_common::{Error, Result};
use sqlx::SqlitePool;

use crate::models::job_state::keys;
use crate::models::{JobState, JobStatus};

#[derive(Debug, Clone)]
pub struct JobStateStore {
    pool: SqlitePool,
    document_id: String,
}

impl JobStateStore {
    pub fn new(pool: SqlitePool, document_id: &str) -> Self {
        Self {
            pool,
            document_id: document_id.to_string(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub async fn get_property(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM document_properties WHERE document_id = ? AND key = ?",
        )
        .bind(&self.document_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|(value,)| value))
    }

    pub async fn set_property(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO document_properties (document_id, key, value) VALUES (?, ?, ?)
             ON CONFLICT(document_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(&self.document_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    pub async fn delete_property(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM document_properties WHERE document_id = ? AND key = ?")
            .bind(&self.document_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }

    /// Active job, if any
    pub async fn load(&self) -> Result<Option<JobState>> {
        let Some(job_id) = self.get_property(keys::JOB_ID).await? else {
            return Ok(None);
        };

        let row_numbers = match self.get_property(keys::ROW_NUMBERS).await? {
            Some(json) => match serde_json::from_str::<Vec<usize>>(&json) {
                Ok(rows) => Some(rows),
                Err(e) => {
                    tracing::warn!(job_id = %job_id, "Ignoring malformed row map: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Some(JobState {
            job_id,
            sheet_name: self.get_property(keys::SHEET_NAME).await?,
            shop_id: self.get_property(keys::SHOP_ID).await?,
            row_numbers,
            status: JobStatus::Running,
        }))
    }

    /// Persist a freshly started job, replacing any previous one
    pub async fn begin(
        &self,
        job_id: &str,
        sheet_name: &str,
        shop_id: &str,
        row_numbers: Option<&[usize]>,
    ) -> Result<()> {
        let rows_json = row_numbers
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::Internal(format!("Failed to serialize row map: {}", e)))?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut entries = vec![
            (keys::JOB_ID, job_id.to_string()),
            (keys::SHEET_NAME, sheet_name.to_string()),
            (keys::SHOP_ID, shop_id.to_string()),
        ];
        if let Some(json) = rows_json {
            entries.push((keys::ROW_NUMBERS, json));
        } else {
            sqlx::query("DELETE FROM document_properties WHERE document_id = ? AND key = ?")
                .bind(&self.document_id)
                .bind(keys::ROW_NUMBERS)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO document_properties (document_id, key, value) VALUES (?, ?, ?)
                 ON CONFLICT(document_id, key) DO UPDATE SET value = excluded.value",
            )
            .bind(&self.document_id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        sqlx::query("DELETE FROM document_properties WHERE document_id = ? AND key = ?")
            .bind(&self.document_id)
            .bind(keys::JOB_STATUS)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        tracing::info!(
            document = %self.document_id,
            job_id = %job_id,
            sheet = %sheet_name,
            "Job state persisted"
        );
        Ok(())
    }

    /// Take ownership of a job's completion
    ///
    /// Deletes `JOB_ID` only if it still names `job_id`; returns false when another
    /// tick (or a newer job) got there first.
    pub async fn claim(&self, job_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM document_properties WHERE document_id = ? AND key = ? AND value = ?",
        )
        .bind(&self.document_id)
        .bind(keys::JOB_ID)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn record_status(&self, status: &JobStatus) -> Result<()> {
        match status.to_property() {
            Some(value) => self.set_property(keys::JOB_STATUS, &value).await,
            None => self.delete_property(keys::JOB_STATUS).await,
        }
    }

    /// Drop the active job (status and shop id survive)
    pub async fn clear(&self) -> Result<()> {
        for key in [keys::JOB_ID, keys::SHEET_NAME, keys::ROW_NUMBERS] {
            self.delete_property(key).await?;
        }
        Ok(())
    }

    /// Running when a job is active, otherwise the last recorded outcome
    pub async fn current_status(&self) -> Result<JobStatus> {
        if self.get_property(keys::JOB_ID).await?.is_some() {
            return Ok(JobStatus::Running);
        }
        Ok(self
            .get_property(keys::JOB_STATUS)
            .await?
            .map(|v| JobStatus::from_property(&v))
            .unwrap_or(JobStatus::None))
    }

    pub async fn shop_id(&self) -> Result<Option<String>> {
        self.get_property(keys::SHOP_ID).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_load_without_job_is_none() {
        let pool = init_memory_pool().await.unwrap();
        let store = JobStateStore::new(pool, "doc-1");
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(store.current_status().await.unwrap(), JobStatus::None);
    }

    #[tokio::test]
    async fn test_begin_then_load() {
        let pool = init_memory_pool().await.unwrap();
        let store = JobStateStore::new(pool, "doc-1");
        store.record_status(&JobStatus::Complete).await.unwrap();

        store.begin("J1", "QA Data", "shop-9", Some(&[2, 5])).await.unwrap();

        let state = store.load().await.unwrap().unwrap();
        assert_eq!(state.job_id, "J1");
        assert_eq!(state.sheet_name.as_deref(), Some("QA Data"));
        assert_eq!(state.shop_id.as_deref(), Some("shop-9"));
        assert_eq!(state.row_numbers, Some(vec![2, 5]));
        // Starting a job wipes the previous outcome
        assert!(store.get_property(keys::JOB_STATUS).await.unwrap().is_none());
        assert_eq!(store.current_status().await.unwrap(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_documents_are_isolated() {
        let pool = init_memory_pool().await.unwrap();
        let a = JobStateStore::new(pool.clone(), "doc-a");
        let b = JobStateStore::new(pool, "doc-b");

        a.begin("J1", "S", "shop", None).await.unwrap();
        assert!(b.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_is_compare_and_swap() {
        let pool = init_memory_pool().await.unwrap();
        let store = JobStateStore::new(pool, "doc-1");
        store.begin("J1", "S", "shop", None).await.unwrap();

        assert!(!store.claim("J0").await.unwrap());
        assert!(store.claim("J1").await.unwrap());
        assert!(!store.claim("J1").await.unwrap());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_keeps_status_and_shop() {
        let pool = init_memory_pool().await.unwrap();
        let store = JobStateStore::new(pool, "doc-1");
        store.begin("J1", "S", "shop-3", None).await.unwrap();
        store.record_status(&JobStatus::Failed("not_found".into())).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert_eq!(
            store.current_status().await.unwrap(),
            JobStatus::Failed("not_found".into())
        );
        assert_eq!(store.shop_id().await.unwrap().as_deref(), Some("shop-3"));
    }
}
