use tracing::debug;

use crate::cache::{match_key, CacheStore, MATCH_DATA_FIELD};
use crate::models::{MatchRecord, MatchStatus, StatusChangeEvent};

/// One pending mutation of the cache, produced by [`reconcile`] and applied
/// by the sync driver. Keys are derived when the write is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheWrite {
    /// Store the match record under `match:<id>` / `data`.
    PutRecord(MatchRecord),
    /// Add the match to the set for `status`.
    AddStatusMember {
        status: MatchStatus,
        match_id: String,
    },
    /// Remove the match from the set for `status` (its previous status).
    RemoveStatusMember {
        status: MatchStatus,
        match_id: String,
    },
}

/// Result of reconciling one match against its cached entry.
#[derive(Debug)]
pub struct Reconciliation {
    /// Present iff a status transition was observed.
    pub event: Option<StatusChangeEvent>,
    /// Writes that bring the cache in line with the snapshot.
    pub writes: Vec<CacheWrite>,
    /// Set when the cached entry could not be read or decoded; the match was
    /// then treated as never seen. Reported, never fatal.
    pub lookup_error: Option<String>,
}

/// Compare one snapshot match against the cache and plan the updates.
///
/// Per-match and independent: no outcome depends on any other match. The
/// cached entry is read here; all mutations are returned as [`CacheWrite`]s
/// for the driver to apply.
pub async fn reconcile(store: &dyn CacheStore, current: &MatchRecord) -> Reconciliation {
    let key = match_key(&current.match_id);
    let mut lookup_error = None;

    let cached = match load_cached(store, &key).await {
        Ok(cached) => cached,
        Err(detail) => {
            lookup_error = Some(detail);
            None
        }
    };

    let (event, writes) = diff(cached.as_ref(), current);
    Reconciliation {
        event,
        writes,
        lookup_error,
    }
}

async fn load_cached(store: &dyn CacheStore, key: &str) -> Result<Option<MatchRecord>, String> {
    let exists = store
        .exists(key)
        .await
        .map_err(|e| format!("cache lookup for {} failed: {}", key, e))?;
    if !exists {
        return Ok(None);
    }

    let raw = store
        .get_hash_field(key, MATCH_DATA_FIELD)
        .await
        .map_err(|e| format!("cache lookup for {} failed: {}", key, e))?;

    match raw {
        // Key exists but the data field is gone: nothing to diff against.
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| format!("cached entry for {} is malformed: {}", key, e)),
    }
}

/// Pure transition decision: what changed, and which writes follow.
///
/// The stored record is always refreshed (name and round can change without
/// a transition); an event is produced only when the status differs. On a
/// transition the match also leaves its previous status set, so each match
/// belongs to exactly one set afterwards.
pub fn diff(
    cached: Option<&MatchRecord>,
    current: &MatchRecord,
) -> (Option<StatusChangeEvent>, Vec<CacheWrite>) {
    let mut writes = vec![
        CacheWrite::PutRecord(current.clone()),
        CacheWrite::AddStatusMember {
            status: current.status.clone(),
            match_id: current.match_id.clone(),
        },
    ];

    let prev = match cached {
        // First sight: nothing to compare against, no event.
        None => return (None, writes),
        Some(prev) => prev,
    };

    if prev.status == current.status {
        return (None, writes);
    }

    debug!(
        "Match {} status: {} -> {}",
        current.match_id, prev.status, current.status
    );
    writes.push(CacheWrite::RemoveStatusMember {
        status: prev.status.clone(),
        match_id: current.match_id.clone(),
    });

    let event = StatusChangeEvent {
        match_id: current.match_id.clone(),
        new_status: current.status.clone(),
        match_name: current.name.clone(),
        round: current.round.clone(),
    };
    (Some(event), writes)
}
