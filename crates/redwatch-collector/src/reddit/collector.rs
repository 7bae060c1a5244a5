//! Per-subreddit metric collector
//!
//! One collector instance per subreddit per run. Meta sub-fetches (rules,
//! flairs) are memoized in an explicit per-instance map, populated on
//! first access and never shared across subreddits; the memo holds the
//! fetch-or-error result so a failed sub-fetch is not retried within the
//! run either.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use super::client::ListingSort;
use super::models::{PostMetrics, SnapshotMetrics, SubredditAbout, SubredditMetaFields};
use super::{FetchError, RedditClient, Result};

#[derive(Default)]
struct MetaMemo {
    rules: Option<std::result::Result<Value, FetchError>>,
    flairs: Option<std::result::Result<Value, FetchError>>,
}

/// Collector bound to one already-fetched subreddit.
pub struct SubredditCollector<'a> {
    client: &'a RedditClient,
    about: SubredditAbout,
    memo: Mutex<MetaMemo>,
}

impl<'a> SubredditCollector<'a> {
    /// Fetch `/about` for `name` and wrap it in a collector.
    pub async fn fetch(client: &'a RedditClient, name: &str) -> Result<SubredditCollector<'a>> {
        let about = client.subreddit_about(name).await?;
        Ok(Self {
            client,
            about,
            memo: Mutex::new(MetaMemo::default()),
        })
    }

    pub fn about(&self) -> &SubredditAbout {
        &self.about
    }

    /// Weekly-cadence metadata: description, rules, flairs, posting
    /// permissions.
    ///
    /// Rule/flair sub-fetch failures degrade to null columns with a
    /// warning rather than failing the subreddit; the about data already
    /// in hand is still worth storing.
    pub async fn collect_meta(&self) -> SubredditMetaFields {
        let description = self
            .about
            .public_description
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.about.description.clone());

        let rules_json = match self.memoized_rules().await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(subreddit = %self.about.name, error = %err, "rules fetch failed");
                None
            }
        };
        let flairs_json = match self.memoized_flairs().await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(subreddit = %self.about.name, error = %err, "flair fetch failed");
                None
            }
        };

        SubredditMetaFields {
            description,
            rules_json,
            flairs_json,
            allow_videos: self.about.allow_videos,
            allow_images: self.about.allow_images,
            allow_links: self.about.allow_links,
        }
    }

    /// Activity snapshot over the newest posts: counts, comment volume,
    /// and score statistics within the trailing window.
    pub async fn collect_snapshot(
        &self,
        limit: u32,
        window_minutes: i64,
    ) -> Result<SnapshotMetrics> {
        let posts = self
            .client
            .listing(&self.about.name, ListingSort::New, limit)
            .await?;
        Ok(compute_snapshot(
            &posts,
            self.about.subscribers,
            Utc::now(),
            window_minutes,
        ))
    }

    /// The current hot listing, for duplicate-safe post ingestion.
    pub async fn collect_hot_posts(&self, limit: u32) -> Result<Vec<PostMetrics>> {
        self.client
            .listing(&self.about.name, ListingSort::Hot, limit)
            .await
    }

    async fn memoized_rules(&self) -> std::result::Result<Value, FetchError> {
        let mut memo = self.memo.lock().await;
        if memo.rules.is_none() {
            memo.rules = Some(self.client.rules(&self.about.name).await);
        }
        memo.rules.clone().unwrap_or(Ok(Value::Null))
    }

    async fn memoized_flairs(&self) -> std::result::Result<Value, FetchError> {
        let mut memo = self.memo.lock().await;
        if memo.flairs.is_none() {
            memo.flairs = Some(self.client.link_flairs(&self.about.name).await);
        }
        memo.flairs.clone().unwrap_or(Ok(Value::Null))
    }
}

/// Pure window-metric computation over an already-fetched post list.
pub fn compute_snapshot(
    posts: &[PostMetrics],
    subscribers: Option<i64>,
    now: DateTime<Utc>,
    window_minutes: i64,
) -> SnapshotMetrics {
    let cutoff = now - ChronoDuration::minutes(window_minutes);
    let recent: Vec<&PostMetrics> = posts
        .iter()
        .filter(|post| post.created_utc.is_some_and(|created| created > cutoff))
        .collect();

    let comments: i64 = recent.iter().map(|post| post.num_comments).sum();
    let scores: Vec<i64> = recent.iter().map(|post| post.score).collect();
    let avg_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<i64>() as f64 / scores.len() as f64
    };

    SnapshotMetrics {
        subscribers,
        posts_in_window: recent.len() as i64,
        comments_in_window: comments,
        avg_score_in_window: avg_score,
        top_score_in_window: scores.iter().copied().max().unwrap_or(0),
    }
}
