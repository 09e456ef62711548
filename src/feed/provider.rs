use anyhow::Result;
use async_trait::async_trait;

use crate::models::Snapshot;

/// Trait that every tournament snapshot source must implement.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Return the tournament's current matches. Called once per sync cycle;
    /// a failed fetch skips the cycle, it is not retried.
    async fn fetch(&self) -> Result<Snapshot>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
