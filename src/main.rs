use anyhow::Result;
use clap::Parser;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

mod cache;
mod config;
mod feed;
mod models;
mod notify;
mod sync;

use cache::{CacheStore, MemoryStore, RedisStore};
use config::Config;
use feed::{SnapshotSource, WstApi};
use models::MatchStatus;
use notify::{LogSink, NotificationSink, WebhookSink};
use sync::SyncEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.dry_run {
        info!("🟡 DRY RUN mode – in-memory cache, events logged instead of published");
    } else {
        info!("🔴 LIVE mode – cache writes go to Redis and events WILL be published");
    }

    let store: Arc<dyn CacheStore> = if config.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(RedisStore::connect(&config.redis_url).await?)
    };

    let sink: Arc<dyn NotificationSink> =
        if let (false, Some(url)) = (config.dry_run, &config.webhook_url) {
            Arc::new(WebhookSink::new(url)?)
        } else {
            Arc::new(LogSink)
        };

    let source: Arc<dyn SnapshotSource> = Arc::new(WstApi::new(
        &config.tournament_api_url,
        &config.tournament_id,
    )?);
    info!(
        "Monitoring tournament {} via {} (sink: {}, every {}s)",
        config.tournament_id,
        source.name(),
        sink.name(),
        config.poll_interval_secs
    );

    let engine = SyncEngine::new(store.clone(), sink);

    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let cycle_deadline = Duration::from_secs(config.cycle_timeout_secs);

    if config.once {
        return tokio::time::timeout(
            cycle_deadline,
            run_one_cycle(source.as_ref(), &engine, store.as_ref()),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!("sync cycle exceeded {}s deadline", config.cycle_timeout_secs)
        })?;
    }

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping");
                break;
            }
            _ = interval.tick() => {}
        }

        // Spread ticks slightly so many watchers restarted together don't
        // hit the feed at the same instant
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
        tokio::time::sleep(jitter).await;

        match tokio::time::timeout(
            cycle_deadline,
            run_one_cycle(source.as_ref(), &engine, store.as_ref()),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Sync cycle failed: {:#}", e),
            Err(_) => warn!(
                "Sync cycle exceeded {}s deadline, abandoned until next tick",
                config.cycle_timeout_secs
            ),
        }
    }

    Ok(())
}

/// Fetch one snapshot and reconcile the cache against it.
async fn run_one_cycle(
    source: &dyn SnapshotSource,
    engine: &SyncEngine,
    store: &dyn CacheStore,
) -> Result<()> {
    let snapshot = source.fetch().await?;
    info!(
        "Snapshot fetched: tournament {} ({}, season {}) with {} matches",
        snapshot.tournament_id,
        snapshot.tournament_name.as_deref().unwrap_or("unnamed"),
        snapshot
            .season
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string()),
        snapshot.matches.len()
    );
    debug!("Snapshot timestamp: {}", snapshot.fetched_at);

    let report = engine.run_cycle(&snapshot).await?;

    let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();
    let rollover_note = if report.rolled_over { " after rollover" } else { "" };
    if report.issues.is_empty() {
        info!(
            "Cycle complete for {}{}: {} matches, {} events published in {}ms",
            report.tournament_id, rollover_note, report.matches_seen, report.events_published,
            elapsed_ms
        );
    } else {
        warn!(
            "Cycle degraded for {}{}: {} matches, {} events published, {} issues in {}ms",
            report.tournament_id,
            rollover_note,
            report.matches_seen,
            report.events_published,
            report.issues.len(),
            elapsed_ms
        );
        for issue in &report.issues {
            warn!(
                "  match {} [{}]: {}",
                issue.match_id, issue.stage, issue.detail
            );
        }
    }

    // Readback for operators tailing the log at debug level
    match store
        .list_set_members(&MatchStatus::from("Live").set_name())
        .await
    {
        Ok(live) if !live.is_empty() => debug!("Live matches now: {:?}", live),
        Ok(_) => {}
        Err(e) => warn!("Could not list live matches: {}", e),
    }

    Ok(())
}
