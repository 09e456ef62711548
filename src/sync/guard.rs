use crate::cache::{CacheError, CacheStore, TOURNAMENT_KEY};

/// Outcome of comparing the snapshot's tournament against the cached marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverDecision {
    /// Same tournament as last cycle; reconcile normally.
    Continue,
    /// A different (or first-ever) tournament. The caller must flush the
    /// whole cache and write the new marker before any match write.
    Rollover { previous: Option<String> },
}

/// Decide whether the cache still belongs to the snapshot's tournament.
///
/// A store failure here is fatal to the cycle: without the marker there is
/// no cache state that can be diffed against safely.
pub async fn check_tournament(
    store: &dyn CacheStore,
    current_id: &str,
) -> Result<RolloverDecision, CacheError> {
    let cached = store.get_string(TOURNAMENT_KEY).await?;
    match cached {
        Some(id) if id == current_id => Ok(RolloverDecision::Continue),
        previous => Ok(RolloverDecision::Rollover { previous }),
    }
}
