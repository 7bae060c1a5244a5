//! Subreddit meta update pipeline
//!
//! Fills in metadata for subreddits that have none yet. The population
//! comes straight from the database (missing-meta query, bounded by the
//! configured batch size) rather than a batch file — once every
//! subreddit has a row, a run is a no-op. Forbidden subreddits (private
//! or banned) get an all-null row so they stop being re-attempted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use futures::{pin_mut, StreamExt};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Store;
use crate::engine::{collect_batch, RunLock, RunSummary};
use crate::notify::SlackNotifier;
use crate::reddit::{FetchError, RedditClient, SubredditCollector, SubredditMetaFields};

pub struct MetaUpdatePipeline {
    config: Config,
    pool: PgPool,
}

impl MetaUpdatePipeline {
    pub fn new(config: Config, pool: PgPool) -> Self {
        Self { config, pool }
    }

    /// Run one missing-meta batch under the single-instance guard.
    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        info!("starting subreddit meta update pipeline");
        let settings = &self.config.meta_update;
        let started = Instant::now();

        let mut lock = RunLock::open(&settings.lock_file)?;
        let _guard = lock.try_acquire()?;

        let store = Store::new(self.pool.clone());
        let missing = store
            .subreddits_missing_meta(settings.batch_size)
            .await
            .context("failed to query subreddits missing metadata")?;

        if missing.is_empty() {
            info!("all subreddits already have metadata, nothing to update");
            return Ok(RunSummary::default());
        }
        info!(count = missing.len(), "updating missing subreddit metadata");

        let ids_by_name: HashMap<String, i64> = missing
            .iter()
            .map(|sub| (sub.name.clone(), sub.id))
            .collect();
        let keys: Vec<String> = missing.into_iter().map(|sub| sub.name).collect();

        let client = RedditClient::connect(&self.config.reddit, settings.fetch_timeout())
            .await
            .context("reddit authentication failed")?;
        let limiter = Arc::new(settings.limiter()?);

        let mut summary = RunSummary::default();
        {
            let client = &client;
            let stream = collect_batch(keys, limiter, settings.fan_out(), move |name| async move {
                let collector = SubredditCollector::fetch(client, &name).await?;
                Ok(collector.collect_meta().await)
            });
            pin_mut!(stream);

            while let Some(outcome) = stream.next().await {
                let Some(&subreddit_id) = ids_by_name.get(&outcome.key) else {
                    // Keys come from ids_by_name, so this cannot happen;
                    // count it rather than trust it.
                    error!(subreddit = %outcome.key, "no id for fetched subreddit");
                    summary.record_failure();
                    continue;
                };

                let fields = match outcome.result {
                    Ok(fields) => fields,
                    Err(FetchError::Forbidden) => {
                        warn!(
                            subreddit = %outcome.key,
                            "forbidden subreddit, storing null metadata"
                        );
                        SubredditMetaFields::all_null()
                    }
                    Err(err) => {
                        error!(subreddit = %outcome.key, error = %err, "meta fetch failed");
                        summary.record_failure();
                        continue;
                    }
                };

                match store.upsert_meta(subreddit_id, &fields).await {
                    Ok(()) => {
                        info!(subreddit = %outcome.key, "meta upserted");
                        summary.record_items(1, 0);
                        summary.record_success();
                    }
                    Err(err) => {
                        // The transaction rolled back; only this subreddit
                        // is affected.
                        error!(subreddit = %outcome.key, error = %err, "meta upsert failed");
                        summary.record_failure();
                    }
                }
            }
        }
        summary.duration = started.elapsed();

        SlackNotifier::new(&self.config.slack)
            .send(
                "Reddit: Subreddit Meta Update",
                &summary.render("Subreddit meta update pipeline"),
            )
            .await;

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "subreddit meta update pipeline finished"
        );
        Ok(summary)
    }
}
