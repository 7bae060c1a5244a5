//! Database row models

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

/// A row of the `subreddits` population table.
#[derive(Debug, Clone, FromRow)]
pub struct Subreddit {
    pub id: i64,
    pub name: String,
    pub title: Option<String>,
    pub created_utc: Option<DateTime<Utc>>,
    pub is_nsfw: Option<bool>,
    pub subreddit_type: Option<String>,
    pub lang: Option<String>,
}

/// A row of `subreddit_meta`; one per subreddit, maintained by upsert.
#[derive(Debug, Clone, FromRow)]
pub struct SubredditMetaRow {
    pub id: i64,
    pub subreddit_id: i64,
    pub description: Option<String>,
    pub rules_json: Option<Value>,
    pub flairs_json: Option<Value>,
    pub allow_videos: Option<bool>,
    pub allow_images: Option<bool>,
    pub allow_links: Option<bool>,
    pub updated_at: DateTime<Utc>,
}
