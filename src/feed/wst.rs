use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::provider::SnapshotSource;
use crate::models::{MatchRecord, Snapshot};

/// Snapshot source backed by the WST tournaments API.
/// One tournament document per request: `GET {base_url}/{tournament_id}`.
pub struct WstApi {
    http: Client,
    /// Base URL for overriding in tests
    base_url: String,
    tournament_id: String,
}

impl WstApi {
    pub fn new(base_url: &str, tournament_id: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(WstApi {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tournament_id: tournament_id.to_string(),
        })
    }
}

#[async_trait]
impl SnapshotSource for WstApi {
    fn name(&self) -> &str {
        "wst-api"
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let url = format!("{}/{}", self.base_url, self.tournament_id);
        debug!("Fetching tournament snapshot from {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("WST API request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("WST API error: {}", resp.status());
        }

        let body = resp
            .text()
            .await
            .context("Failed to read WST API response")?;

        parse_snapshot(&body)
    }
}

// The feed wraps the tournament in a JSON:API-style envelope:
// {"data": {"id": …, "attributes": {"tournamentID": …, "matches": […]}}}

#[derive(Deserialize)]
struct Envelope {
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    id: String,
    attributes: TournamentAttributes,
}

#[derive(Deserialize)]
struct TournamentAttributes {
    #[serde(rename = "tournamentID", default)]
    tournament_id: String,
    name: Option<String>,
    season: Option<i32>,
    #[serde(default)]
    matches: Vec<MatchRecord>,
}

/// Parse a WST tournament document into a [`Snapshot`].
///
/// The attributes carry their own `tournamentID`; the envelope's `data.id`
/// is used when that is blank (older documents only set one of the two).
pub fn parse_snapshot(body: &str) -> Result<Snapshot> {
    let envelope: Envelope =
        serde_json::from_str(body).context("Failed to parse WST tournament document")?;

    let attrs = envelope.data.attributes;
    let tournament_id = if attrs.tournament_id.is_empty() {
        envelope.data.id
    } else {
        attrs.tournament_id
    };
    if tournament_id.is_empty() {
        anyhow::bail!("Tournament document carries no tournament identifier");
    }

    Ok(Snapshot {
        tournament_id,
        tournament_name: attrs.name,
        season: attrs.season,
        matches: attrs.matches,
        fetched_at: Utc::now(),
    })
}
