//! Reddit API client
//!
//! Thin OAuth2 client over the endpoints the pipelines need: subreddit
//! about, hot/new listings, rules, and link flair templates. One client
//! is created per batch and shared read-only by every worker task; the
//! rate limiter paces calls, the client only executes them.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::models::{
    AboutData, FlairTemplate, ListingData, RulesResponse, SubredditAbout, Thing,
};
use super::{FetchError, Result};

/// Credentials and endpoints for the password-grant script flow.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RedditAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    /// Token endpoint host, overridable for tests.
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    /// Data API host, overridable for tests.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_auth_base() -> String {
    "https://www.reddit.com".to_string()
}

fn default_api_base() -> String {
    "https://oauth.reddit.com".to_string()
}

/// Listing sort order for post fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSort {
    Hot,
    New,
}

impl ListingSort {
    fn as_str(self) -> &'static str {
        match self {
            ListingSort::Hot => "hot",
            ListingSort::New => "new",
        }
    }
}

/// Strip the `r/` (or `/r/`) prefix batch files and the database carry,
/// leaving the bare name the API paths expect.
pub fn sanitize_subreddit_name(name: &str) -> &str {
    let name = name.trim().trim_start_matches('/');
    name.strip_prefix("r/").unwrap_or(name)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authenticated Reddit API client with a per-request timeout.
pub struct RedditClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl RedditClient {
    /// Authenticate with the password grant and return a ready client.
    pub async fn connect(config: &RedditAuthConfig, timeout: Duration) -> Result<Self> {
        let user_agent = format!(
            "script:{}:v{} (by /u/{})",
            config.user_agent,
            env!("CARGO_PKG_VERSION"),
            config.username
        );
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        let response = http
            .post(format!("{}/api/v1/access_token", config.auth_base))
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", config.username.as_str()),
                ("password", config.password.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Auth);
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))?;

        debug!("authenticated against Reddit API");
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            token: token.access_token,
        })
    }

    /// Fetch `/r/{name}/about`.
    pub async fn subreddit_about(&self, name: &str) -> Result<SubredditAbout> {
        let thing: Thing<AboutData> = self
            .get_json(&format!("r/{}/about", sanitize_subreddit_name(name)))
            .await?;
        Ok(thing.data.into())
    }

    /// Fetch a hot/new listing, newest or hottest first as Reddit returns
    /// them.
    pub async fn listing(
        &self,
        name: &str,
        sort: ListingSort,
        limit: u32,
    ) -> Result<Vec<super::PostMetrics>> {
        let path = format!(
            "r/{}/{}?limit={}",
            sanitize_subreddit_name(name),
            sort.as_str(),
            limit
        );
        let thing: Thing<ListingData> = self.get_json(&path).await?;
        Ok(thing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect())
    }

    /// Fetch `/r/{name}/about/rules`, reduced to the fields worth keeping.
    pub async fn rules(&self, name: &str) -> Result<Value> {
        let response: RulesResponse = self
            .get_json(&format!("r/{}/about/rules", sanitize_subreddit_name(name)))
            .await?;
        let rules: Vec<Value> = response
            .rules
            .into_iter()
            .map(|rule| {
                json!({
                    "short_name": rule.short_name,
                    "description": rule.description,
                    "kind": rule.kind,
                })
            })
            .collect();
        Ok(Value::Array(rules))
    }

    /// Fetch the subreddit's link flair templates.
    pub async fn link_flairs(&self, name: &str) -> Result<Value> {
        let templates: Vec<FlairTemplate> = self
            .get_json(&format!("r/{}/api/link_flair", sanitize_subreddit_name(name)))
            .await?;
        let flairs: Vec<Value> = templates
            .into_iter()
            .map(|flair| {
                json!({
                    "flair_text": flair.text,
                    "flair_css_class": flair.css_class,
                })
            })
            .collect();
        Ok(Value::Array(flairs))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if let Some(err) = FetchError::from_status(response.status()) {
            return Err(err);
        }
        response
            .json()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }
}
