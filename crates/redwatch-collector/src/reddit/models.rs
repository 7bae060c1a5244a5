//! Reddit API wire formats and parsed metric payloads
//!
//! Wire structs mirror the JSON the API actually returns (thing/listing
//! envelopes, epoch-second floats); the parsed types are what the rest of
//! the system works with.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Wire envelopes
// ============================================================================

/// The `{"kind": ..., "data": ...}` envelope Reddit wraps everything in.
#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<PostData>>,
}

#[derive(Debug, Deserialize)]
pub struct AboutData {
    pub display_name: String,
    pub title: Option<String>,
    pub subscribers: Option<i64>,
    pub public_description: Option<String>,
    pub description: Option<String>,
    pub over18: Option<bool>,
    pub subreddit_type: Option<String>,
    pub lang: Option<String>,
    pub created_utc: Option<f64>,
    pub allow_videos: Option<bool>,
    pub allow_images: Option<bool>,
    pub allow_discovery: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PostData {
    pub id: String,
    pub title: Option<String>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub created_utc: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RulesResponse {
    #[serde(default = "Vec::new")]
    pub rules: Vec<RuleData>,
}

#[derive(Debug, Deserialize)]
pub struct RuleData {
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlairTemplate {
    pub text: Option<String>,
    pub css_class: Option<String>,
}

// ============================================================================
// Parsed payloads
// ============================================================================

/// Static subreddit identity and attributes from `/r/{name}/about`.
#[derive(Debug, Clone)]
pub struct SubredditAbout {
    /// Canonical name with the `r/` prefix, as stored in the database.
    pub name: String,
    pub title: Option<String>,
    pub subscribers: Option<i64>,
    pub public_description: Option<String>,
    pub description: Option<String>,
    pub is_nsfw: Option<bool>,
    pub subreddit_type: Option<String>,
    pub lang: Option<String>,
    pub created_utc: Option<DateTime<Utc>>,
    pub allow_videos: Option<bool>,
    pub allow_images: Option<bool>,
    pub allow_links: Option<bool>,
}

impl From<AboutData> for SubredditAbout {
    fn from(data: AboutData) -> Self {
        Self {
            name: format!("r/{}", data.display_name),
            title: data.title,
            subscribers: data.subscribers,
            public_description: data.public_description,
            description: data.description,
            is_nsfw: data.over18,
            subreddit_type: data.subreddit_type,
            lang: data.lang,
            created_utc: data.created_utc.and_then(epoch_to_datetime),
            allow_videos: data.allow_videos,
            allow_images: data.allow_images,
            allow_links: data.allow_discovery,
        }
    }
}

/// One post from a listing, keyed by its Reddit id — the natural key the
/// duplicate-safe writer deduplicates on.
#[derive(Debug, Clone)]
pub struct PostMetrics {
    pub post_id: String,
    pub title: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: Option<DateTime<Utc>>,
}

impl From<PostData> for PostMetrics {
    fn from(data: PostData) -> Self {
        Self {
            post_id: data.id,
            title: data.title.unwrap_or_default(),
            score: data.score.unwrap_or(0),
            num_comments: data.num_comments.unwrap_or(0),
            created_utc: data.created_utc.and_then(epoch_to_datetime),
        }
    }
}

/// Windowed activity metrics derived from the newest posts.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMetrics {
    pub subscribers: Option<i64>,
    pub posts_in_window: i64,
    pub comments_in_window: i64,
    pub avg_score_in_window: f64,
    pub top_score_in_window: i64,
}

/// Weekly-cadence metadata for one subreddit; every field nullable so a
/// forbidden subreddit can be recorded as an all-null row.
#[derive(Debug, Clone, Default)]
pub struct SubredditMetaFields {
    pub description: Option<String>,
    pub rules_json: Option<Value>,
    pub flairs_json: Option<Value>,
    pub allow_videos: Option<bool>,
    pub allow_images: Option<bool>,
    pub allow_links: Option<bool>,
}

impl SubredditMetaFields {
    /// The record stored for private/banned subreddits.
    pub fn all_null() -> Self {
        Self::default()
    }
}

fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch as i64, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn about_parses_from_wire_json() {
        let raw = r#"{
            "kind": "t5",
            "data": {
                "display_name": "rust",
                "title": "The Rust Programming Language",
                "subscribers": 300000,
                "public_description": "A place for all things Rust",
                "description": "long sidebar",
                "over18": false,
                "subreddit_type": "public",
                "lang": "en",
                "created_utc": 1264968000.0,
                "allow_videos": true,
                "allow_images": true,
                "allow_discovery": true
            }
        }"#;
        let thing: Thing<AboutData> = serde_json::from_str(raw).unwrap();
        let about = SubredditAbout::from(thing.data);

        assert_eq!(about.name, "r/rust");
        assert_eq!(about.subscribers, Some(300_000));
        assert_eq!(about.is_nsfw, Some(false));
        assert_eq!(about.created_utc.unwrap().timestamp(), 1_264_968_000);
    }

    #[test]
    fn listing_parses_posts_with_missing_fields() {
        let raw = r#"{
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"id": "abc", "title": "hello", "score": 10, "num_comments": 3, "created_utc": 1700000000.0}},
                    {"kind": "t3", "data": {"id": "def"}}
                ]
            }
        }"#;
        let listing: Thing<ListingData> = serde_json::from_str(raw).unwrap();
        let posts: Vec<PostMetrics> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post_id, "abc");
        assert_eq!(posts[1].score, 0);
        assert!(posts[1].created_utc.is_none());
    }
}
