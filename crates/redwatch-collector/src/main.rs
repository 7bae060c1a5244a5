//! Redwatch - subreddit metrics collector

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use redwatch_common::logging::{init_logging, LogConfig, LogLevel};
use redwatch_collector::config::Config;
use redwatch_collector::engine::EngineError;
use redwatch_collector::pipelines::{HotPostsPipeline, MetaUpdatePipeline, SnapshotPipeline};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "redwatch")]
#[command(author, version, about = "Batched Reddit metrics collector")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect the hot listing for the next marketable-subreddit batch
    HotPosts,

    /// Capture activity snapshots for the next subreddit batch
    Snapshot,

    /// Fill in metadata for subreddits that have none yet
    MetaUpdate,

    /// Regenerate a pipeline's batch snapshot file (resets its cursor)
    GenerateBatches {
        /// Which pipeline's batches to regenerate
        #[arg(value_enum)]
        pipeline: BatchPipeline,
    },

    /// Apply pending database migrations
    Migrate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BatchPipeline {
    HotPosts,
    Snapshot,
}

/// Exit status for lock contention, distinct from structural failures so
/// the invoking scheduler can tell "still running" from "broken".
const EXIT_ALREADY_RUNNING: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_else(|_| {
        LogConfig::builder()
            .log_file_prefix("redwatch".to_string())
            .build()
    });
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }

    if let Err(err) = init_logging(&log_config) {
        eprintln!("failed to initialize logging: {err:#}");
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(EngineError::AlreadyRunning(path)) = err.downcast_ref::<EngineError>() {
                error!(path = %path.display(), "lock already held by another process, aborting");
                return ExitCode::from(EXIT_ALREADY_RUNNING);
            }
            error!(error = %format!("{err:#}"), "run failed");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let pool = redwatch_collector::db::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Command::HotPosts => {
            config.validate_reddit_auth()?;
            let summary = HotPostsPipeline::new(config, pool).run().await?;
            info!(
                processed = summary.processed,
                failed = summary.failed,
                "hot posts run complete"
            );
        }
        Command::Snapshot => {
            config.validate_reddit_auth()?;
            let summary = SnapshotPipeline::new(config, pool).run().await?;
            info!(
                processed = summary.processed,
                failed = summary.failed,
                "snapshot run complete"
            );
        }
        Command::MetaUpdate => {
            config.validate_reddit_auth()?;
            let summary = MetaUpdatePipeline::new(config, pool).run().await?;
            info!(
                processed = summary.processed,
                failed = summary.failed,
                "meta update run complete"
            );
        }
        Command::GenerateBatches { pipeline } => match pipeline {
            BatchPipeline::HotPosts => {
                let snapshot = HotPostsPipeline::new(config, pool)
                    .generate_batches()
                    .await?;
                info!(total_batches = snapshot.total_batches, "hot-posts batches generated");
            }
            BatchPipeline::Snapshot => {
                let snapshot = SnapshotPipeline::new(config, pool)
                    .generate_batches()
                    .await?;
                info!(total_batches = snapshot.total_batches, "snapshot batches generated");
            }
        },
        Command::Migrate => {
            redwatch_collector::db::migrate(&pool).await?;
            info!("migrations applied");
        }
    }

    Ok(())
}
