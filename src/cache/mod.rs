//! Durable cache capability for tournament and match state.
//!
//! The sync core only sees this trait; production wires in [`RedisStore`],
//! dry-run and tests use [`MemoryStore`]. Key layout is shared with the
//! services that consume the cache, so it is fixed here:
//!
//! - `tournamentId` → last-seen tournament identifier
//! - `match:<matchID>`, hash field `data` → match record as JSON
//! - `<status>_matches` sets → match IDs per status

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::collections::HashSet;

/// Key under which the current tournament identifier is stored.
pub const TOURNAMENT_KEY: &str = "tournamentId";

/// Hash field holding the serialized match record.
pub const MATCH_DATA_FIELD: &str = "data";

/// Hash key for one match's cached record.
pub fn match_key(match_id: &str) -> String {
    format!("match:{}", match_id)
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Redis-level failure (connectivity, protocol, type mismatch).
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The store cannot be reached at all.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Capability interface over the durable key/value + set store.
///
/// All calls may fail with a connectivity error; callers decide whether a
/// failure is fatal (tournament guard) or degraded (per-match writes).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_string(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn get_hash_field(&self, key: &str, field: &str)
        -> Result<Option<String>, CacheError>;
    async fn set_hash_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), CacheError>;

    async fn add_set_member(&self, set: &str, member: &str) -> Result<(), CacheError>;
    async fn remove_set_member(&self, set: &str, member: &str) -> Result<(), CacheError>;
    async fn list_set_members(&self, set: &str) -> Result<HashSet<String>, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Drop everything. Only the tournament guard's rollover path calls this.
    async fn flush_all(&self) -> Result<(), CacheError>;
}
