// src/main.rs
mod config;
mod dataset;
mod frame;
mod pipeline;
mod source;
mod storage;
mod transform;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use config::AppConfig;
use dataset::{DatasetBuilder, DatasetRequest};
use pipeline::{InsiderPipeline, TaskOutcome};
use source::client::SecApiClient;
use source::FilingSource;
use storage::SqliteStore;
use utils::AppError;

/// Insider-trading filings ETL: raw → staging → final → SQLite
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root of the raw/staging/final directories (overrides DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh every stale dataset
    Run {
        /// Also write each transform step to the staging layer
        #[arg(long)]
        staging: bool,

        /// Lucene query for insider filings (overrides INSIDER_QUERY)
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Export stored transactions joined with exchange metadata to CSV
    BuildDataset {
        /// First period-of-report date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last period-of-report date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// e.g. issuer.tradingSymbol:TSLA to restrict to one ticker
        #[arg(short, long)]
        query: Option<String>,

        /// Output CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(dir) = &args.data_dir {
        // a database path derived from the old data dir follows the new one
        if config.database_path == config.data_dir.join("insider.db") {
            config.database_path = dir.join("insider.db");
        }
        config.data_dir = dir.clone();
    }
    if let Some(db) = &args.database {
        config.database_path = db.clone();
    }
    match &args.command {
        Command::Run { staging, query } => {
            config.write_staging |= *staging;
            if let Some(q) = query {
                config.query = q.clone();
            }
        }
        Command::BuildDataset { query: Some(q), .. } => config.query = q.clone(),
        Command::BuildDataset { .. } => {}
    }
}

async fn run_pipeline(config: &AppConfig, store: Arc<SqliteStore>) -> Result<(), AppError> {
    let source: Arc<dyn FilingSource> = Arc::new(SecApiClient::new(config.api()?)?);
    let pipeline = InsiderPipeline::from_config(config, source, store.clone(), store)?;

    let report = pipeline.run(Utc::now()).await;
    for dataset in &report.datasets {
        match &dataset.result {
            Ok(TaskOutcome::Skipped { last_updated }) => {
                tracing::info!("{}: fresh, skipped (last updated {})", dataset.dataset, last_updated)
            }
            Ok(TaskOutcome::Refreshed { rows }) => tracing::info!("{}: refreshed, {} rows", dataset.dataset, rows),
            Err(e) => tracing::warn!("{}: failed: {}", dataset.dataset, e),
        }
    }

    if !report.is_success() {
        return Err(AppError::Processing(format!(
            "{} of {} datasets failed to refresh",
            report.failures(),
            report.datasets.len()
        )));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(if args.verbose { "debug" } else { "info" });
    tracing::debug!("Starting with args: {:?}", args);

    // 3. Resolve configuration; any problem here is fatal
    let mut config = AppConfig::from_env()?;
    apply_overrides(&mut config, &args);

    // 4. Open the store
    let store = Arc::new(SqliteStore::open(&config.database_path)?);

    // 5. Dispatch
    match &args.command {
        Command::Run { .. } => run_pipeline(&config, store).await,
        Command::BuildDataset { start, end, output, .. } => {
            if start > end {
                return Err(AppError::Config(format!("--start {} is after --end {}", start, end)));
            }
            let request = DatasetRequest {
                query: config.query.clone(),
                start: *start,
                end: *end,
                output: output
                    .clone()
                    .unwrap_or_else(|| DatasetRequest::default_output(&config.data_dir, *start, *end)),
            };
            let rows = DatasetBuilder::new(config.policy.clone(), config.rules.clone()).build(&store, &request)?;
            tracing::info!("Dataset ready: {} rows in {}", rows, request.output.display());
            Ok(())
        }
    }
}
