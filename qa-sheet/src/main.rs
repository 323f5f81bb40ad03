//! qa-sheet - QA workbook automation tool
//!
//! Builds and enriches QA workbooks, runs product-count jobs against the counter
//! service, and polls their results back into the sheet.

use anyhow::Result;
use clap::Parser;
use qa_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use std::sync::Arc;
use tracing::{error, info};

use qa_sheet::cli::Cli;
use qa_sheet::commands::{self, AppContext};
use qa_sheet::config::{request_timeout, resolve_api_base_url};
use qa_sheet::db::init_database_pool;
use qa_sheet::services::job_client::ProductCountClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TomlConfig::load_or_default(cli.config.as_deref());

    let default_level = config
        .logging
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting QA Sheet Automation (qa-sheet) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new("qa-sheet")
        .with_cli_arg(cli.root_folder.clone())
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = match init_database_pool(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let base_url = resolve_api_base_url(cli.api_base_url.as_deref(), &config);
    let client = ProductCountClient::new(&base_url, request_timeout(&config))?;
    info!("Product count API: {}", client.base_url());

    let ctx = AppContext {
        pool,
        config,
        api: Arc::new(client),
    };
    commands::execute(cli.command, &ctx).await
}
