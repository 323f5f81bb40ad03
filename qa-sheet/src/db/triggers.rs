//! Time-based trigger registry
//!
//! A trigger row names a handler and the workbook it runs against. Rows survive process
//! restarts; the scheduler re-reads its row on every tick, so deleting a row from any
//! process stops the schedule.

use chrono::{DateTime, Utc};
use qa_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Work a trigger performs on each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerHandler {
    PollForResults,
}

impl TriggerHandler {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerHandler::PollForResults => "pollForResults",
        }
    }
}

impl FromStr for TriggerHandler {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pollForResults" => Ok(TriggerHandler::PollForResults),
            other => Err(Error::InvalidInput(format!("Unknown trigger handler: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub trigger_id: Uuid,
    pub handler: TriggerHandler,
    pub document_id: String,
    /// Workbook directory the handler opens on each tick
    pub workbook_path: PathBuf,
    pub interval_seconds: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TriggerStore {
    pool: SqlitePool,
}

impl TriggerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the document's polling trigger with a fresh one
    pub async fn create_polling_trigger(
        &self,
        document_id: &str,
        workbook_path: PathBuf,
        interval_seconds: u64,
    ) -> Result<Trigger> {
        let removed = self.delete_polling_triggers(document_id).await?;
        if removed > 0 {
            tracing::debug!(document = %document_id, removed, "Replaced existing polling trigger");
        }

        let trigger = Trigger {
            trigger_id: Uuid::new_v4(),
            handler: TriggerHandler::PollForResults,
            document_id: document_id.to_string(),
            workbook_path,
            interval_seconds: interval_seconds.max(1),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO triggers (trigger_id, handler, document_id, workbook_path, interval_seconds, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(trigger.trigger_id.to_string())
        .bind(trigger.handler.as_str())
        .bind(&trigger.document_id)
        .bind(trigger.workbook_path.to_string_lossy().to_string())
        .bind(trigger.interval_seconds as i64)
        .bind(trigger.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(
            trigger_id = %trigger.trigger_id,
            document = %document_id,
            interval_seconds = trigger.interval_seconds,
            "Polling trigger created"
        );
        Ok(trigger)
    }

    pub async fn delete_polling_triggers(&self, document_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM triggers WHERE document_id = ? AND handler = ?")
            .bind(document_id)
            .bind(TriggerHandler::PollForResults.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove every trigger of every document
    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM triggers").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn exists(&self, trigger_id: Uuid) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM triggers WHERE trigger_id = ?")
            .bind(trigger_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn list(&self) -> Result<Vec<Trigger>> {
        let rows = sqlx::query(
            "SELECT trigger_id, handler, document_id, workbook_path, interval_seconds, created_at
             FROM triggers ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut triggers = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_id: String = row.get("trigger_id");
            let raw_handler: String = row.get("handler");
            let raw_created: String = row.get("created_at");

            let trigger_id = Uuid::parse_str(&raw_id)
                .map_err(|e| Error::Internal(format!("Bad trigger id {}: {}", raw_id, e)))?;
            let created_at = DateTime::parse_from_rfc3339(&raw_created)
                .map_err(|e| Error::Internal(format!("Bad trigger timestamp {}: {}", raw_created, e)))?
                .with_timezone(&Utc);

            triggers.push(Trigger {
                trigger_id,
                handler: raw_handler.parse()?,
                document_id: row.get("document_id"),
                workbook_path: PathBuf::from(row.get::<String, _>("workbook_path")),
                interval_seconds: row.get::<i64, _>("interval_seconds").max(1) as u64,
                created_at,
            });
        }
        Ok(triggers)
    }
}
