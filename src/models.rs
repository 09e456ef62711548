use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One match as delivered by the tournament feed.
///
/// Field names on the wire follow the WST JSON (`matchID`, `name`, `status`,
/// `round`); cached entries use the same encoding. `round` is defaulted
/// because entries written by older builds lack it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "matchID")]
    pub match_id: String,
    #[serde(default)]
    pub name: String,
    pub status: MatchStatus,
    #[serde(default)]
    pub round: String,
}

/// A match status as reported by the feed.
///
/// The vocabulary (`Scheduled`, `Live`, `Completed`, …) is open-ended, so the
/// raw string is kept rather than an exhaustive enum. Each status maps to one
/// cache set holding the IDs of matches currently in that status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchStatus(String);

impl MatchStatus {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the cache set for this status: `Live` → `live_matches`,
    /// `Completed` → `completed_matches`. Unknown statuses get a set of
    /// their own instead of being dropped.
    pub fn set_name(&self) -> String {
        let slug: String = self
            .as_str()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_matches", slug)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchStatus {
    fn from(s: &str) -> Self {
        MatchStatus(s.to_string())
    }
}

/// One fetch cycle's complete view of a tournament.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tournament_id: String,
    pub tournament_name: Option<String>,
    pub season: Option<i32>,
    pub matches: Vec<MatchRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// Emitted when a match's status differs from the cached one.
///
/// Wire shape matches the event consumed by downstream services:
/// `{"matchID": …, "status": …, "matchName": …, "round": …}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    #[serde(rename = "matchID")]
    pub match_id: String,
    #[serde(rename = "status")]
    pub new_status: MatchStatus,
    #[serde(rename = "matchName")]
    pub match_name: String,
    pub round: String,
}
