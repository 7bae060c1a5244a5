//! Slack run notifications
//!
//! Fire-and-forget delivery of the per-run summary to an incoming
//! webhook. Notification failures are logged and never fail the run; a
//! missing webhook URL disables delivery entirely.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::config::SlackConfig;

/// Posts run summaries to a Slack incoming webhook.
pub struct SlackNotifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            webhook_url: config.webhook_url.clone(),
            client,
        }
    }

    /// Send `text` with a header line. Never returns an error.
    pub async fn send(&self, header: &str, text: &str) {
        let Some(url) = self.webhook_url.as_deref() else {
            debug!("slack webhook not configured, skipping notification");
            return;
        };

        let payload = json!({ "text": format!("*{header}*\n{text}") });
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("slack notification delivered");
            }
            Ok(response) => {
                warn!(status = %response.status(), "slack notification rejected");
            }
            Err(err) => {
                warn!(error = %err, "slack notification failed");
            }
        }
    }
}
