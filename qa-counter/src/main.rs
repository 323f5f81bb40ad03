//! qa-counter - product-count job service
//!
//! `POST /start_job`, `GET /get_results/{job_id}`, `GET /health`.

use anyhow::Result;
use clap::Parser;
use qa_common::config::TomlConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use qa_counter::search_client::SearchClient;
use qa_counter::worker::{spawn_worker, WorkerConfig};
use qa_counter::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "qa-counter")]
#[command(about = "Product-count job service for the QA sheet automation")]
#[command(version)]
struct Args {
    /// Address to listen on (overrides the configuration file)
    #[arg(short, long, env = "QA_COUNTER_BIND")]
    bind: Option<String>,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    let default_level = config
        .logging
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    info!(
        "Starting QA Product Counter (qa-counter) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let counter_config = config.counter;
    let search = SearchClient::new(&counter_config)?;
    info!("Search endpoint: {}", search.search_url(&counter_config.environment));

    let (state, receiver) = AppState::new();
    spawn_worker(
        receiver,
        state.jobs.clone(),
        Arc::new(search),
        WorkerConfig {
            max_concurrency: counter_config.max_concurrency,
            default_environment: counter_config.environment.clone(),
        },
    );

    let app = build_router(state);
    let bind = args.bind.unwrap_or(counter_config.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
