//! Product-count job launch
//!
//! **Order of checks (nothing is persisted unless all pass):**
//! 1. The sheet has a `keyword` column
//! 2. No job is active, unless the caller overrides
//! 3. A shop id is given or remembered
//! 4. At least one keyword was collected
//!
//! 5. The workbook path resolves to an absolute location
//!
//! Then the job is submitted, its state persisted and the polling trigger replaced.
//! The trigger stores the absolute path, so a later `watch` from any directory
//! reopens the same workbook.

use qa_common::sheet::{column_index, HeaderCache, SheetStore};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use crate::db::{JobStateStore, Trigger, TriggerStore};
use crate::error::{AutomationError, AutomationResult};
use crate::models::keyword_record::headers;
use crate::services::job_client::{validate_job_request, CountJobApi};

/// Which keyword rows a job covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordSelection {
    /// Every non-blank keyword, sent as written
    All,
    /// Only text keywords of rows the active filter shows, trimmed
    Filtered,
}

impl KeywordSelection {
    pub fn label(&self) -> &'static str {
        match self {
            KeywordSelection::All => "All",
            KeywordSelection::Filtered => "Filtered",
        }
    }
}

/// Keywords in submission order with the 1-based rows they came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedKeywords {
    pub keywords: Vec<String>,
    pub rows: Vec<usize>,
}

/// Read the keywords a job would submit
pub fn collect_keywords<S: SheetStore + ?Sized>(
    store: &S,
    cache: &mut HeaderCache,
    sheet: &str,
    selection: KeywordSelection,
) -> AutomationResult<CollectedKeywords> {
    let names = cache.headers(store, sheet)?;
    let column = column_index(&names, headers::KEYWORD).ok_or_else(|| {
        AutomationError::Validation(format!(
            "\"{}\" column not found in sheet \"{}\".",
            headers::KEYWORD,
            sheet
        ))
    })?;

    let mut collected = CollectedKeywords::default();
    for (offset, row) in store.data_rows(sheet)?.into_iter().enumerate() {
        let row_number = offset + 2;
        let value = row.get(column).cloned().unwrap_or_default();

        let keyword = match selection {
            KeywordSelection::All => {
                if !value.is_truthy() || value.is_blank() {
                    continue;
                }
                value.display()
            }
            KeywordSelection::Filtered => {
                if store.is_row_hidden_by_filter(sheet, row_number)? {
                    continue;
                }
                match value.as_text().map(str::trim) {
                    Some(text) if !text.is_empty() => text.to_string(),
                    _ => continue,
                }
            }
        };

        collected.keywords.push(keyword);
        collected.rows.push(row_number);
    }
    Ok(collected)
}

/// Parameters of one launch
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub selection: KeywordSelection,
    /// Overrides the remembered shop id
    pub shop_id: Option<String>,
    /// Replace an active job instead of refusing
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct LaunchedJob {
    pub job_id: String,
    pub sheet_name: String,
    pub keyword_count: usize,
    pub trigger: Trigger,
}

pub struct JobLauncher {
    state: JobStateStore,
    triggers: TriggerStore,
    api: Arc<dyn CountJobApi>,
    poll_interval_seconds: u64,
}

impl JobLauncher {
    pub fn new(
        pool: SqlitePool,
        document_id: &str,
        api: Arc<dyn CountJobApi>,
        poll_interval_seconds: u64,
    ) -> Self {
        Self {
            state: JobStateStore::new(pool.clone(), document_id),
            triggers: TriggerStore::new(pool),
            api,
            poll_interval_seconds,
        }
    }

    /// Start a product-count job for `sheet`
    ///
    /// `workbook_path` is what the polling trigger reopens on every tick; relative
    /// paths are resolved against the current directory before anything is stored.
    pub async fn launch<S: SheetStore + ?Sized>(
        &self,
        store: &S,
        cache: &mut HeaderCache,
        sheet: &str,
        workbook_path: &Path,
        request: &LaunchRequest,
    ) -> AutomationResult<LaunchedJob> {
        let collected = collect_keywords(store, cache, sheet, request.selection)?;

        if let Some(active) = self.state.load().await? {
            if !request.force {
                return Err(AutomationError::JobInProgress {
                    job_id: active.job_id,
                });
            }
            tracing::warn!(job_id = %active.job_id, "Replacing active job");
        }

        let shop_id = match request.shop_id.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => explicit.to_string(),
            _ => self.state.shop_id().await?.unwrap_or_default(),
        };
        if collected.keywords.is_empty() && !shop_id.is_empty() {
            let qualifier = match request.selection {
                KeywordSelection::Filtered => "visible ",
                KeywordSelection::All => "",
            };
            return Err(AutomationError::Validation(format!(
                "No {}keywords found to process.",
                qualifier
            )));
        }
        validate_job_request(&collected.keywords, &shop_id)?;
        let workbook_path = std::fs::canonicalize(workbook_path).map_err(|e| {
            AutomationError::Validation(format!(
                "Cannot resolve workbook path {}: {}",
                workbook_path.display(),
                e
            ))
        })?;

        tracing::info!(
            sheet = %sheet,
            keywords = collected.keywords.len(),
            mode = request.selection.label(),
            "Sending keywords"
        );
        let job_id = self.api.start_job(&collected.keywords, &shop_id).await?;

        self.state
            .begin(&job_id, sheet, &shop_id, Some(&collected.rows))
            .await?;
        let trigger = self
            .triggers
            .create_polling_trigger(
                self.state.document_id(),
                workbook_path,
                self.poll_interval_seconds,
            )
            .await?;

        Ok(LaunchedJob {
            job_id,
            sheet_name: sheet.to_string(),
            keyword_count: collected.keywords.len(),
            trigger,
        })
    }
}
