//! Duplicate-safe post writer
//!
//! Applies one hot-posts outcome to storage: resolve the parent
//! subreddit, preload its stored post ids once, insert only unseen
//! posts. Parents are never created here — an unknown parent is a
//! data-integrity warning and the outcome is skipped whole. One failed
//! insert logs and moves on to the remaining posts of the same outcome.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::store::Store;
use super::DbResult;
use crate::reddit::PostMetrics;

/// Per-outcome write counts, accumulated into the run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Partition a payload against the preloaded id set.
///
/// Returns the posts to insert and the count skipped as already stored.
/// Pure so the dedup decision is testable without a database; repeated
/// ids within one payload are also collapsed.
pub fn split_new_posts<'a>(
    existing: &HashSet<String>,
    posts: &'a [PostMetrics],
) -> (Vec<&'a PostMetrics>, usize) {
    let mut seen_in_payload: HashSet<&str> = HashSet::new();
    let mut fresh = Vec::new();
    let mut skipped = 0;

    for post in posts {
        if existing.contains(&post.post_id) || !seen_in_payload.insert(post.post_id.as_str()) {
            skipped += 1;
        } else {
            fresh.push(post);
        }
    }
    (fresh, skipped)
}

/// Writer for hot-posts outcomes.
pub struct PostWriter {
    store: Store,
    fetched_at: DateTime<Utc>,
}

impl PostWriter {
    pub fn new(store: Store, fetched_at: DateTime<Utc>) -> Self {
        Self { store, fetched_at }
    }

    /// Write one subreddit's posts, returning `None` when the parent is
    /// missing from the database.
    pub async fn write_posts(
        &self,
        subreddit_name: &str,
        posts: &[PostMetrics],
    ) -> DbResult<Option<WriteStats>> {
        let Some(parent) = self.store.subreddit_by_name(subreddit_name).await? else {
            warn!(
                subreddit = subreddit_name,
                "skipping outcome: subreddit not present in database"
            );
            return Ok(None);
        };

        let existing = self.store.existing_post_ids(parent.id).await?;
        let (fresh, mut skipped) = split_new_posts(&existing, posts);

        let mut stats = WriteStats::default();
        for post in fresh {
            match self.store.insert_post(parent.id, post, self.fetched_at).await {
                // false means a concurrent writer got there first; that is
                // the same outcome as "skipped as duplicate".
                Ok(true) => stats.inserted += 1,
                Ok(false) => skipped += 1,
                Err(err) => {
                    error!(
                        subreddit = subreddit_name,
                        post_id = %post.post_id,
                        error = %err,
                        "failed to insert post, continuing with the rest"
                    );
                }
            }
        }
        stats.skipped = skipped;

        info!(
            subreddit = subreddit_name,
            inserted = stats.inserted,
            skipped = stats.skipped,
            total = posts.len(),
            "posts written"
        );
        Ok(Some(stats))
    }
}
