//! The synchronization core: one cycle diffs a fresh tournament snapshot
//! against the cache, emits a notification per status transition, and leaves
//! the cache consistent with the snapshot.
//!
//! A cycle is not transactional. A crash or deadline partway through leaves a
//! prefix of the matches updated; the next cycle re-diffs against whatever is
//! actually cached and self-heals. At most one cycle runs at a time; the
//! poll loop serializes them.

pub mod guard;
pub mod reconcile;

pub use guard::RolloverDecision;
pub use reconcile::{diff, reconcile, CacheWrite, Reconciliation};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{match_key, CacheError, CacheStore, MATCH_DATA_FIELD, TOURNAMENT_KEY};
use crate::models::Snapshot;
use crate::notify::NotificationSink;

/// Where in the cycle a non-fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStage {
    /// The cached entry could not be read or decoded.
    CacheRead,
    /// One of the match's cache writes failed.
    CacheWrite,
    /// The notification sink refused the event.
    Publish,
}

impl std::fmt::Display for IssueStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueStage::CacheRead => f.write_str("cache-read"),
            IssueStage::CacheWrite => f.write_str("cache-write"),
            IssueStage::Publish => f.write_str("publish"),
        }
    }
}

/// A per-match error that did not abort the cycle.
#[derive(Debug, Clone)]
pub struct CycleIssue {
    pub match_id: String,
    pub stage: IssueStage,
    pub detail: String,
}

/// Summary of one completed cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub tournament_id: String,
    pub rolled_over: bool,
    pub matches_seen: usize,
    pub events_published: usize,
    pub issues: Vec<CycleIssue>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives one sync cycle end to end against injected collaborators.
pub struct SyncEngine {
    store: Arc<dyn CacheStore>,
    sink: Arc<dyn NotificationSink>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn CacheStore>, sink: Arc<dyn NotificationSink>) -> Self {
        SyncEngine { store, sink }
    }

    /// Run one full cycle over the snapshot.
    ///
    /// Fatal only when the cache store is unreachable at the tournament-guard
    /// stage (or during the rollover flush); every per-match failure is
    /// collected into the report instead.
    pub async fn run_cycle(&self, snapshot: &Snapshot) -> Result<CycleReport, CacheError> {
        let started_at = Utc::now();

        let decision =
            guard::check_tournament(self.store.as_ref(), &snapshot.tournament_id).await?;
        let rolled_over = matches!(decision, RolloverDecision::Rollover { .. });
        if let RolloverDecision::Rollover { previous } = decision {
            match previous {
                Some(previous) => info!(
                    "Tournament rollover: {} -> {}, flushing cache",
                    previous, snapshot.tournament_id
                ),
                None => info!(
                    "First cycle for tournament {}, initialising cache",
                    snapshot.tournament_id
                ),
            }
            // The flush and the new marker must both be durable before any
            // match write, so a crash cannot leave stale matches from the
            // previous tournament beside the new marker.
            self.store.flush_all().await?;
            self.store
                .set_string(TOURNAMENT_KEY, &snapshot.tournament_id)
                .await?;
        }

        let mut issues = Vec::new();
        let mut events_published = 0;

        for record in &snapshot.matches {
            let outcome = reconcile::reconcile(self.store.as_ref(), record).await;

            if let Some(detail) = outcome.lookup_error {
                warn!("Match {}: {}", record.match_id, detail);
                issues.push(CycleIssue {
                    match_id: record.match_id.clone(),
                    stage: IssueStage::CacheRead,
                    detail,
                });
            }

            for write in &outcome.writes {
                if let Err(e) = self.apply_write(write).await {
                    warn!("Match {}: cache write failed: {}", record.match_id, e);
                    issues.push(CycleIssue {
                        match_id: record.match_id.clone(),
                        stage: IssueStage::CacheWrite,
                        detail: e.to_string(),
                    });
                }
            }

            if let Some(event) = outcome.event {
                info!(
                    "Status change detected: match {} ({}) -> {} [{}]",
                    event.match_id, event.match_name, event.new_status, event.round
                );
                match self.sink.publish(&event).await {
                    Ok(()) => events_published += 1,
                    Err(e) => {
                        warn!(
                            "Failed to publish status change for match {} via {}: {}",
                            event.match_id,
                            self.sink.name(),
                            e
                        );
                        issues.push(CycleIssue {
                            match_id: event.match_id.clone(),
                            stage: IssueStage::Publish,
                            detail: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(CycleReport {
            tournament_id: snapshot.tournament_id.clone(),
            rolled_over,
            matches_seen: snapshot.matches.len(),
            events_published,
            issues,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn apply_write(&self, write: &CacheWrite) -> anyhow::Result<()> {
        match write {
            CacheWrite::PutRecord(record) => {
                let json = serde_json::to_string(record)?;
                self.store
                    .set_hash_field(&match_key(&record.match_id), MATCH_DATA_FIELD, &json)
                    .await?;
            }
            CacheWrite::AddStatusMember { status, match_id } => {
                self.store
                    .add_set_member(&status.set_name(), match_id)
                    .await?;
            }
            CacheWrite::RemoveStatusMember { status, match_id } => {
                self.store
                    .remove_set_member(&status.set_name(), match_id)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::cache::MemoryStore;
    use crate::models::{MatchRecord, MatchStatus, StatusChangeEvent};
    use crate::notify::PublishError;

    /// Sink that records published events; can be told to reject them.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<StatusChangeEvent>>,
        reject: AtomicBool,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<StatusChangeEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn publish(&self, event: &StatusChangeEvent) -> Result<(), PublishError> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(PublishError::Rejected(reqwest::StatusCode::BAD_GATEWAY));
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn record(id: &str, name: &str, status: &str, round: &str) -> MatchRecord {
        MatchRecord {
            match_id: id.to_string(),
            name: name.to_string(),
            status: MatchStatus::from(status),
            round: round.to_string(),
        }
    }

    fn snapshot(tournament_id: &str, matches: Vec<MatchRecord>) -> Snapshot {
        Snapshot {
            tournament_id: tournament_id.to_string(),
            tournament_name: Some("UK Championship".to_string()),
            season: Some(2025),
            matches,
            fetched_at: Utc::now(),
        }
    }

    fn engine(store: Arc<MemoryStore>, sink: Arc<RecordingSink>) -> SyncEngine {
        SyncEngine::new(store, sink)
    }

    #[tokio::test]
    async fn test_unseen_match_cached_without_event() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        let report = engine
            .run_cycle(&snapshot("T1", vec![record("7", "Brown vs Green", "Scheduled", "R1")]))
            .await
            .unwrap();

        assert_eq!(report.matches_seen, 1);
        assert_eq!(report.events_published, 0);
        assert!(report.issues.is_empty());
        assert!(sink.events().is_empty());

        assert!(store.exists(&match_key("7")).await.unwrap());
        assert!(store
            .list_set_members("scheduled_matches")
            .await
            .unwrap()
            .contains("7"));
    }

    #[tokio::test]
    async fn test_scheduled_to_live_transition() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Scheduled", "QF")]))
            .await
            .unwrap();
        let report = engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await
            .unwrap();

        assert_eq!(report.events_published, 1);
        assert!(!report.rolled_over);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].match_id, "42");
        assert_eq!(events[0].new_status, MatchStatus::from("Live"));
        assert_eq!(events[0].match_name, "Smith vs Jones");
        assert_eq!(events[0].round, "QF");

        // The match moved sets: in live_matches, no longer in scheduled_matches
        assert!(store
            .list_set_members("live_matches")
            .await
            .unwrap()
            .contains("42"));
        assert!(!store
            .list_set_members("scheduled_matches")
            .await
            .unwrap()
            .contains("42"));
    }

    #[tokio::test]
    async fn test_repeated_cycle_publishes_nothing_new() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        let snap = snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]);
        engine.run_cycle(&snap).await.unwrap();
        engine.run_cycle(&snap).await.unwrap();
        let report = engine.run_cycle(&snap).await.unwrap();

        assert_eq!(report.events_published, 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_rollover_flushes_then_marks_before_match_writes() {
        let store = Arc::new(MemoryStore::journaling());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await
            .unwrap();
        let report = engine
            .run_cycle(&snapshot("T2", vec![record("90", "Davis vs White", "Scheduled", "R1")]))
            .await
            .unwrap();

        assert!(report.rolled_over);

        // Everything from T1 is gone
        assert!(!store.exists(&match_key("42")).await.unwrap());
        assert!(store.list_set_members("live_matches").await.unwrap().is_empty());
        assert_eq!(
            store.get_string(TOURNAMENT_KEY).await.unwrap(),
            Some("T2".to_string())
        );

        // Ordering: second flush, then the T2 marker, then any T2 match write
        let journal = store.journal();
        let flush = journal.iter().rposition(|op| op == "flush_all").unwrap();
        let marker = journal
            .iter()
            .position(|op| op == "set_string tournamentId=T2")
            .unwrap();
        let first_write = journal
            .iter()
            .position(|op| op.starts_with("set_hash_field match:90"))
            .unwrap();
        assert!(flush < marker, "flush must precede the new marker");
        assert!(marker < first_write, "marker must precede match writes");
    }

    #[tokio::test]
    async fn test_rollover_does_not_replay_old_statuses_as_transitions() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await
            .unwrap();
        // New tournament reuses the match ID with a different status; the
        // flush makes it first-sight again, so no event fires.
        let report = engine
            .run_cycle(&snapshot("T2", vec![record("42", "Davis vs White", "Scheduled", "R1")]))
            .await
            .unwrap();

        assert_eq!(report.events_published, 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_per_match_order_independence() {
        let a = record("1", "Smith vs Jones", "Live", "QF");
        let b = record("2", "Brown vs Green", "Completed", "SF");

        let mut finals = Vec::new();
        for matches in [vec![a.clone(), b.clone()], vec![b.clone(), a.clone()]] {
            let store = Arc::new(MemoryStore::new());
            let sink = Arc::new(RecordingSink::default());
            let engine = engine(store.clone(), sink.clone());

            // Seed both as Scheduled, then transition both in the given order
            engine
                .run_cycle(&snapshot(
                    "T1",
                    vec![
                        record("1", "Smith vs Jones", "Scheduled", "QF"),
                        record("2", "Brown vs Green", "Scheduled", "SF"),
                    ],
                ))
                .await
                .unwrap();
            let report = engine.run_cycle(&snapshot("T1", matches)).await.unwrap();
            assert_eq!(report.events_published, 2);

            let mut event_ids: Vec<String> =
                sink.events().into_iter().map(|e| e.match_id).collect();
            event_ids.sort();

            finals.push((
                event_ids,
                store.list_set_members("live_matches").await.unwrap(),
                store.list_set_members("completed_matches").await.unwrap(),
                store.list_set_members("scheduled_matches").await.unwrap(),
            ));
        }

        assert_eq!(finals[0], finals[1]);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_cache_current() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Scheduled", "QF")]))
            .await
            .unwrap();

        sink.reject.store(true, Ordering::SeqCst);
        let report = engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await
            .unwrap();

        // Degraded but completed: the cache moved on, the failure is reported
        assert_eq!(report.events_published, 0);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].stage, IssueStage::Publish);
        assert_eq!(report.issues[0].match_id, "42");
        assert!(store
            .list_set_members("live_matches")
            .await
            .unwrap()
            .contains("42"));

        // The transition is not re-detected next cycle: the cache already
        // holds the new status
        sink.reject.store(false, Ordering::SeqCst);
        let report = engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await
            .unwrap();
        assert_eq!(report.events_published, 0);
    }

    #[tokio::test]
    async fn test_malformed_entry_reported_and_repaired() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        store.set_string(TOURNAMENT_KEY, "T1").await.unwrap();
        store
            .set_hash_field(&match_key("42"), MATCH_DATA_FIELD, "corrupt{")
            .await
            .unwrap();

        let report = engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await
            .unwrap();

        assert_eq!(report.events_published, 0);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].stage, IssueStage::CacheRead);

        // The entry was overwritten with a valid record; the next cycle is clean
        let report = engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await
            .unwrap();
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_the_cycle() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        store.set_offline(true);
        let result = engine
            .run_cycle(&snapshot("T1", vec![record("42", "Smith vs Jones", "Live", "QF")]))
            .await;
        assert!(result.is_err());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_snapshot_still_writes_marker() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(store.clone(), sink.clone());

        let report = engine.run_cycle(&snapshot("T1", vec![])).await.unwrap();
        assert!(report.rolled_over);
        assert_eq!(report.matches_seen, 0);
        assert_eq!(
            store.get_string(TOURNAMENT_KEY).await.unwrap(),
            Some("T1".to_string())
        );
    }
}
