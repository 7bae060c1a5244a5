//! Activity snapshot pipeline
//!
//! Walks the full subreddit population batch by batch; per subreddit,
//! fetches the newest posts and appends one windowed-activity snapshot
//! row. All rows of one run share the run's start timestamp so they can
//! be grouped later.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use futures::{pin_mut, StreamExt};
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::{advance_and_persist, load_current_batch};
use crate::config::Config;
use crate::db::Store;
use crate::engine::{collect_batch, BatchSnapshot, BatchStore, RunLock, RunSummary};
use crate::notify::SlackNotifier;
use crate::reddit::{RedditClient, SubredditCollector};

pub struct SnapshotPipeline {
    config: Config,
    pool: PgPool,
}

impl SnapshotPipeline {
    pub fn new(config: Config, pool: PgPool) -> Self {
        Self { config, pool }
    }

    /// Regenerate the batch snapshot from the full population.
    pub async fn generate_batches(&self) -> anyhow::Result<BatchSnapshot> {
        info!("generating snapshot batches from all subreddits");
        let population = Store::new(self.pool.clone())
            .all_subreddit_names()
            .await
            .context("failed to enumerate subreddits")?;
        let store = BatchStore::new(&self.config.snapshot.batch_file);
        Ok(store.generate(&population, self.config.snapshot.batch_size)?)
    }

    /// Run one batch under the single-instance guard.
    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        info!("starting subreddit snapshot pipeline");
        let settings = &self.config.snapshot;
        let started = Instant::now();
        let captured_at = Utc::now();

        let mut lock = RunLock::open(&settings.lock_file)?;
        let _guard = lock.try_acquire()?;

        let batch_store = BatchStore::new(&settings.batch_file);
        if !batch_store.exists() {
            info!("batch file does not exist yet, generating");
            self.generate_batches().await?;
        }
        let mut current = load_current_batch(&batch_store)?;

        let client = RedditClient::connect(&self.config.reddit, settings.fetch_timeout())
            .await
            .context("reddit authentication failed")?;
        let limiter = Arc::new(settings.limiter()?);
        let store = Store::new(self.pool.clone());

        let mut summary = RunSummary::default();
        {
            let client = &client;
            let fetch_limit = settings.fetch_limit;
            let window_minutes = settings.window_minutes;
            let stream = collect_batch(
                current.keys.clone(),
                limiter,
                settings.fan_out(),
                move |name| async move {
                    let collector = SubredditCollector::fetch(client, &name).await?;
                    collector.collect_snapshot(fetch_limit, window_minutes).await
                },
            );
            pin_mut!(stream);

            while let Some(outcome) = stream.next().await {
                let metrics = match outcome.result {
                    Ok(metrics) => metrics,
                    Err(err) => {
                        error!(subreddit = %outcome.key, error = %err, "fetch failed");
                        summary.record_failure();
                        continue;
                    }
                };

                match store.subreddit_by_name(&outcome.key).await {
                    Ok(Some(parent)) => {
                        match store.insert_snapshot(parent.id, captured_at, &metrics).await {
                            Ok(()) => {
                                info!(subreddit = %outcome.key, "snapshot inserted");
                                summary.record_items(1, 0);
                                summary.record_success();
                            }
                            Err(err) => {
                                error!(subreddit = %outcome.key, error = %err, "snapshot insert failed");
                                summary.record_failure();
                            }
                        }
                    }
                    Ok(None) => {
                        warn!(subreddit = %outcome.key, "skipping snapshot: subreddit not in database");
                        summary.record_failure();
                    }
                    Err(err) => {
                        error!(subreddit = %outcome.key, error = %err, "parent lookup failed");
                        summary.record_failure();
                    }
                }
            }
        }
        summary.duration = started.elapsed();

        advance_and_persist(&batch_store, &mut current.snapshot);

        let text = format!(
            "> batch {}/{}\n{}",
            current.position,
            current.snapshot.total_batches,
            summary.render("Subreddit snapshot pipeline"),
        );
        SlackNotifier::new(&self.config.slack)
            .send("Reddit: Subreddit Snapshot", &text)
            .await;

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "subreddit snapshot pipeline finished"
        );
        Ok(summary)
    }
}
