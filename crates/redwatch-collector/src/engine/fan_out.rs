//! Bounded fan-out with completion-order results
//!
//! Launches one fetch task per entity key, capped at `concurrency` tasks
//! in flight, and yields each outcome as soon as its task finishes —
//! not in submission order. Downstream writing and logging start on the
//! first completed entity instead of waiting for the whole batch, and one
//! slow entity never delays reporting of the others.
//!
//! The rate-limiter token is acquired *inside* the gated section, so the
//! concurrency cap bounds fetch-plus-token-wait occupancy jointly with
//! the rate limit. Failures are values: every error (including a fetch
//! that outlives its timeout) becomes a failure outcome and sibling tasks
//! keep running.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tokio::time::timeout;

use super::RateLimiter;
use crate::reddit::FetchError;

/// The per-entity result: a key plus success-XOR-failure.
///
/// An `Ok` payload may be empty (e.g. a subreddit with no posts); that is
/// an empty-but-successful result, not an error.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub key: String,
    pub result: Result<T, FetchError>,
}

impl<T> FetchOutcome<T> {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// Fan-out parameters shared by all pipelines.
#[derive(Debug, Clone, Copy)]
pub struct FanOutConfig {
    /// Maximum tasks simultaneously inside the gated section.
    pub concurrency: usize,
    /// Per-entity deadline covering token wait plus fetch; an entity whose
    /// fetch never returns becomes a `Timeout` failure instead of stalling
    /// the run.
    pub task_timeout: Duration,
}

/// Launch one rate-limited task per key and stream outcomes as they
/// complete.
///
/// `fetch` is invoked once per key; the shared client behind it is
/// whatever the closure captures — acquired once per batch by the caller,
/// not per entity.
pub fn collect_batch<T, F, Fut>(
    keys: Vec<String>,
    limiter: Arc<RateLimiter>,
    config: FanOutConfig,
    fetch: F,
) -> impl Stream<Item = FetchOutcome<T>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let tasks: Vec<_> = keys
        .into_iter()
        .map(|key| {
            let limiter = Arc::clone(&limiter);
            let fut = fetch(key.clone());
            async move {
                let result = match timeout(config.task_timeout, async {
                    limiter.acquire().await;
                    fut.await
                })
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout),
                };
                FetchOutcome { key, result }
            }
        })
        .collect();

    stream::iter(tasks).buffer_unordered(config.concurrency.max(1))
}
