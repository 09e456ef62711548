//! Change-event delivery.
//!
//! The sync core hands every detected status transition to a
//! [`NotificationSink`] and moves on; delivery is fire-and-forget beyond the
//! call's own result. A publish failure is reported in the cycle summary but
//! never rolls back the cache write for that match.

pub mod webhook;

pub use self::webhook::WebhookSink;

use async_trait::async_trait;
use tracing::info;

use crate::models::StatusChangeEvent;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The request never completed (DNS, connect, timeout).
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The receiver answered with a non-success status.
    #[error("webhook rejected event: HTTP {0}")]
    Rejected(reqwest::StatusCode),
}

/// Capability interface for delivering status-change events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &StatusChangeEvent) -> Result<(), PublishError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Sink that only logs events. Used in dry-run mode so a full cycle can run
/// without touching any external service.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, event: &StatusChangeEvent) -> Result<(), PublishError> {
        info!(
            "[dry-run] would publish: match {} ({}) -> {} [{}]",
            event.match_id, event.match_name, event.new_status, event.round
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
