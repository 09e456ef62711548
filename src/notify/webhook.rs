use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{NotificationSink, PublishError};
use crate::models::StatusChangeEvent;

/// Sink that POSTs each event as JSON to a configured endpoint.
///
/// Downstream consumers (tickers, alert bots) subscribe behind this endpoint;
/// the broker topology on the other side is not this process's concern.
pub struct WebhookSink {
    http: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(WebhookSink {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn publish(&self, event: &StatusChangeEvent) -> Result<(), PublishError> {
        debug!("Publishing status change for match {} to {}", event.match_id, self.url);

        let resp = self.http.post(&self.url).json(event).send().await?;

        if !resp.status().is_success() {
            return Err(PublishError::Rejected(resp.status()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
