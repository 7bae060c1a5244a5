//! Hot posts pipeline
//!
//! Walks the marketable-subreddit population batch by batch; per
//! subreddit, fetches the current hot listing and inserts each post as a
//! child row deduplicated by Reddit post id.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use futures::{pin_mut, StreamExt};
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::{advance_and_persist, load_current_batch};
use crate::config::Config;
use crate::db::{PostWriter, Store};
use crate::engine::{collect_batch, BatchSnapshot, BatchStore, RunLock, RunSummary};
use crate::notify::SlackNotifier;
use crate::reddit::{RedditClient, SubredditCollector};

pub struct HotPostsPipeline {
    config: Config,
    pool: PgPool,
}

impl HotPostsPipeline {
    pub fn new(config: Config, pool: PgPool) -> Self {
        Self { config, pool }
    }

    /// Regenerate the batch snapshot from the marketable population.
    ///
    /// Destructive (resets the cursor); invoked on explicit operator
    /// action or when no snapshot exists yet.
    pub async fn generate_batches(&self) -> anyhow::Result<BatchSnapshot> {
        info!("generating hot-posts batches from marketable subreddits");
        let population = Store::new(self.pool.clone())
            .marketable_subreddit_names()
            .await
            .context("failed to enumerate marketable subreddits")?;
        let store = BatchStore::new(&self.config.hot_posts.batch_file);
        Ok(store.generate(&population, self.config.hot_posts.batch_size)?)
    }

    /// Run one batch under the single-instance guard.
    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        info!("starting hot posts pipeline");
        let settings = &self.config.hot_posts;
        let started = Instant::now();

        let mut lock = RunLock::open(&settings.lock_file)?;
        let _guard = lock.try_acquire()?;

        let batch_store = BatchStore::new(&settings.batch_file);
        if !batch_store.exists() {
            info!("batch file does not exist yet, generating");
            self.generate_batches().await?;
        }
        let mut current = load_current_batch(&batch_store)?;

        // One shared client per batch; workers borrow it read-only.
        let client = RedditClient::connect(&self.config.reddit, settings.fetch_timeout())
            .await
            .context("reddit authentication failed")?;
        let limiter = Arc::new(settings.limiter()?);
        let writer = PostWriter::new(Store::new(self.pool.clone()), Utc::now());

        let mut summary = RunSummary::default();
        {
            let client = &client;
            let fetch_limit = settings.fetch_limit;
            let stream = collect_batch(
                current.keys.clone(),
                limiter,
                settings.fan_out(),
                move |name| async move {
                    let collector = SubredditCollector::fetch(client, &name).await?;
                    collector.collect_hot_posts(fetch_limit).await
                },
            );
            pin_mut!(stream);

            while let Some(outcome) = stream.next().await {
                match outcome.result {
                    Ok(posts) if posts.is_empty() => {
                        info!(subreddit = %outcome.key, "no posts returned");
                        summary.record_success();
                    }
                    Ok(posts) => match writer.write_posts(&outcome.key, &posts).await {
                        Ok(Some(stats)) => {
                            summary.record_items(stats.inserted, stats.skipped);
                            summary.record_success();
                        }
                        Ok(None) => {
                            // Parent missing from the database; writer logged it.
                            summary.record_failure();
                        }
                        Err(err) => {
                            error!(subreddit = %outcome.key, error = %err, "post write failed");
                            summary.record_failure();
                        }
                    },
                    Err(err) => {
                        error!(subreddit = %outcome.key, error = %err, "fetch failed");
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
            summary.render("Hot posts pipeline"),
        );
        SlackNotifier::new(&self.config.slack)
            .send("Reddit: Hot Posts Pipeline", &text)
            .await;

        if summary.failed > 0 {
            warn!(
                failed = summary.failed,
                processed = summary.processed,
                "hot posts pipeline finished with failures"
            );
        } else {
            info!(
                processed = summary.processed,
                inserted = summary.items_inserted,
                "hot posts pipeline finished"
            );
        }
        Ok(summary)
    }
}
