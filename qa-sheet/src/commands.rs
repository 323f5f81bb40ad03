//! Command handlers behind the CLI

use anyhow::{Context, Result};
use qa_common::config::TomlConfig;
use qa_common::sheet::{parse_cell, CellRange, HeaderCache, SheetStore, Workbook};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cli::{Command, CreateArgs, FetchArgs, TriggerAction, ValidateArgs, ValidationTarget, WorkbookArgs};
use crate::db::{JobStateStore, TriggerStore};
use crate::error::AutomationError;
use crate::models::{JobStatus, PollOutcome};
use crate::services::job_client::CountJobApi;
use crate::services::job_launcher::{JobLauncher, KeywordSelection, LaunchRequest};
use crate::services::poller::Poller;
use crate::services::qa_builder::{create_qa_sheet, SourceLocations};
use crate::services::scheduler::Scheduler;
use crate::services::validation::{validate_selection, KeywordValidator, UrlValidator, Validator};

/// Everything a command needs
#[derive(Clone)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub config: TomlConfig,
    pub api: Arc<dyn CountJobApi>,
}

pub async fn execute(command: Command, ctx: &AppContext) -> Result<()> {
    match command {
        Command::Create(args) => create(&args, ctx),
        Command::Fetch(args) => fetch(&args, ctx).await,
        Command::Poll(args) => poll(&args, ctx).await,
        Command::Watch => watch(ctx).await,
        Command::Status(args) => status(&args, ctx).await,
        Command::Triggers { action } => triggers(action, ctx).await,
        Command::Validate(args) => validate(&args),
    }
}

/// Control column given as a letter ("B") or a 1-based number ("2")
pub fn parse_column(column: &str) -> Result<usize, AutomationError> {
    let column = column.trim();
    if let Ok(n) = column.parse::<usize>() {
        if n > 0 {
            return Ok(n);
        }
    }
    let invalid = || AutomationError::Validation(format!("Invalid control column: {}", column));
    if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    parse_cell(&format!("{}1", column))
        .map(|(_, col)| col)
        .map_err(|_| invalid())
}

fn create(args: &CreateArgs, ctx: &AppContext) -> Result<()> {
    let sources = match &args.control {
        Some(control) => {
            let workbook = Workbook::open(control)
                .with_context(|| format!("Failed to open control workbook {}", control.display()))?;
            let base_dir = control.parent().unwrap_or_else(|| Path::new("."));
            SourceLocations::from_control_sheet(
                &workbook,
                &args.control_sheet,
                parse_column(&args.column)?,
                &ctx.config.control,
                base_dir,
            )?
        }
        None => SourceLocations {
            semantic: args.semantic.clone().ok_or_else(|| {
                AutomationError::Validation("A semantic workbook is required.".to_string())
            })?,
            manual: args.manual.clone(),
            staging: args.staging.clone(),
            keyword_gen: args.keyword_gen.clone(),
        },
    };

    let report = create_qa_sheet(&sources, &args.output)?;
    println!(
        "Created \"{}\" at {} ({} rows, {} enriched from keyword gen, {} from search volume, {} from staging)",
        report.name,
        report.output_dir.display(),
        report.stats.rows,
        report.stats.keyword_gen_hits,
        report.stats.search_volume_hits,
        report.stats.staging_hits
    );
    Ok(())
}

async fn fetch(args: &FetchArgs, ctx: &AppContext) -> Result<()> {
    let workbook = Workbook::open(&args.workbook)?;
    let launcher = JobLauncher::new(
        ctx.pool.clone(),
        workbook.dataset_id(),
        ctx.api.clone(),
        ctx.config.api.poll_interval_seconds,
    );
    let request = LaunchRequest {
        selection: if args.filtered {
            KeywordSelection::Filtered
        } else {
            KeywordSelection::All
        },
        shop_id: args.shop_id.clone(),
        force: args.force,
    };

    let mut cache = HeaderCache::new();
    let launched = launcher
        .launch(&workbook, &mut cache, &args.sheet, &args.workbook, &request)
        .await?;
    println!(
        "Started {} product count job {} for {} keywords on \"{}\"",
        request.selection.label(),
        launched.job_id,
        launched.keyword_count,
        launched.sheet_name
    );

    if args.detach {
        println!("Results will be written by `qa-sheet watch`");
        return Ok(());
    }

    let scheduler = Scheduler::new(ctx.pool.clone(), ctx.api.clone());
    let handle = scheduler.spawn_polling(launched.trigger);
    tokio::select! {
        outcome = handle.join() => {
            match outcome {
                Some(outcome) => println!("{}", describe_outcome(&outcome)),
                None => println!("Polling stopped before the job finished"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; the polling trigger is kept for `qa-sheet watch`");
        }
    }
    Ok(())
}

async fn poll(args: &WorkbookArgs, ctx: &AppContext) -> Result<()> {
    let mut workbook = Workbook::open(&args.workbook)?;
    let mut poller = Poller::new(ctx.pool.clone(), workbook.dataset_id(), ctx.api.clone());
    let outcome = poller.poll_once(&mut workbook).await?;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

async fn watch(ctx: &AppContext) -> Result<()> {
    let scheduler = Scheduler::new(ctx.pool.clone(), ctx.api.clone());
    tokio::select! {
        outcomes = scheduler.run_until_idle() => {
            let outcomes = outcomes?;
            if outcomes.is_empty() {
                println!("No polling triggers are stored");
            }
            for outcome in outcomes {
                println!("{}", describe_outcome(&outcome));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; stored triggers are kept");
        }
    }
    Ok(())
}

async fn status(args: &WorkbookArgs, ctx: &AppContext) -> Result<()> {
    let workbook = Workbook::open(&args.workbook)?;
    let store = JobStateStore::new(ctx.pool.clone(), workbook.dataset_id());

    match store.load().await? {
        Some(state) => {
            println!("Job {} running", state.job_id);
            println!("  sheet:   {}", state.sheet_name.as_deref().unwrap_or("<missing>"));
            if let Some(rows) = &state.row_numbers {
                println!("  rows:    {}", rows.len());
            }
        }
        None => match store.current_status().await? {
            JobStatus::None => println!("No job has run for \"{}\"", workbook.name()),
            status => println!(
                "Last job: {}",
                status.to_property().unwrap_or_else(|| "RUNNING".to_string())
            ),
        },
    }
    if let Some(shop_id) = store.shop_id().await? {
        println!("  shop id: {}", shop_id);
    }
    Ok(())
}

async fn triggers(action: TriggerAction, ctx: &AppContext) -> Result<()> {
    match action {
        TriggerAction::List => {
            let triggers = TriggerStore::new(ctx.pool.clone()).list().await?;
            if triggers.is_empty() {
                println!("No polling triggers are stored");
            }
            for trigger in triggers {
                println!(
                    "{}  {}  every {}s  {}  (since {})",
                    trigger.trigger_id,
                    trigger.handler.as_str(),
                    trigger.interval_seconds,
                    trigger.workbook_path.display(),
                    trigger.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        TriggerAction::Clear => {
            let deleted = Scheduler::new(ctx.pool.clone(), ctx.api.clone())
                .delete_all_triggers()
                .await?;
            println!("Deleted {} trigger(s)", deleted);
        }
    }
    Ok(())
}

fn validate(args: &ValidateArgs) -> Result<()> {
    let mut workbook = Workbook::open(&args.workbook)?;
    let range = CellRange::parse(&args.range)?;
    let validator: &dyn Validator = match args.target {
        ValidationTarget::Keywords => &KeywordValidator,
        ValidationTarget::Urls => &UrlValidator,
    };

    let report = validate_selection(&mut workbook, &args.sheet, &range, validator)?;
    match &report.report_sheet {
        None => println!("All {} selected cells are valid", report.checked),
        Some(sheet) => {
            workbook.flush()?;
            println!(
                "Found {} invalid {} value(s); see sheet \"{}\"",
                report.faulty.len(),
                validator.entity(),
                sheet
            );
        }
    }
    Ok(())
}

/// One-line summary of a poll tick
pub fn describe_outcome(outcome: &PollOutcome) -> String {
    match outcome {
        PollOutcome::NoActiveJob => "No active job; polling disabled".to_string(),
        PollOutcome::Processing { job_id } => format!("Job {} is still processing", job_id),
        PollOutcome::Written { job_id, rows_written } => {
            format!("Job {} complete: wrote {} product counts", job_id, rows_written)
        }
        PollOutcome::Failed { job_id, status } => format!("Job {} ended with status {}", job_id, status),
        PollOutcome::Abandoned { job_id, reason } => format!("Job {} abandoned: {}", job_id, reason),
        PollOutcome::RetryLater { job_id, error } => {
            format!("Job {} could not be checked ({}); will retry", job_id, error)
        }
        PollOutcome::UnknownStatus { job_id, status } => {
            format!("Job {} reported unknown status \"{}\"", job_id, status)
        }
        PollOutcome::AlreadyClaimed { job_id } => format!("Job {} was already written", job_id),
    }
}
