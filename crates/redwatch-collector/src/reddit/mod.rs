// Reddit API collaborator
//
// The fetch side of the system: an OAuth2 client over the public data
// endpoints and a per-subreddit collector that turns raw listings into
// the metric payloads the pipelines persist.
//
// Failure reasons are a typed enum. Pipelines branch on variants
// (`Forbidden` gets special handling in meta updates), never on message
// text.

pub mod client;
pub mod collector;
pub mod models;

// Re-export main types
pub use client::{sanitize_subreddit_name, RedditAuthConfig, RedditClient};
pub use collector::SubredditCollector;
pub use models::{
    PostMetrics, SnapshotMetrics, SubredditAbout, SubredditMetaFields,
};

/// Result type for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Enumerated fetch failure reasons.
///
/// `Forbidden` is distinguishable on purpose: a private or banned
/// subreddit yields an all-null metadata record instead of a hard
/// failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("access forbidden (private, quarantined or banned)")]
    Forbidden,

    #[error("subreddit not found")]
    NotFound,

    #[error("authentication rejected")]
    Auth,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected API status {status}")]
    Api { status: u16 },

    #[error("malformed API payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl FetchError {
    /// Map an HTTP status to a typed reason; `None` for success statuses.
    pub fn from_status(status: reqwest::StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }
        Some(match status.as_u16() {
            401 => FetchError::Auth,
            403 => FetchError::Forbidden,
            404 => FetchError::NotFound,
            code => FetchError::Api { status: code },
        })
    }
}
