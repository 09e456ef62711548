use clap::Parser;

/// Tournament match monitor: syncs the WST match feed into Redis and
/// notifies downstream consumers of status changes
#[derive(Parser, Debug, Clone)]
#[command(name = "matchsync", version, about)]
pub struct Config {
    /// Tournament identifier to monitor (path segment of the feed URL)
    #[arg(long, env = "TOURNAMENT_ID")]
    pub tournament_id: String,

    /// Tournament feed base URL
    #[arg(
        long,
        env = "TOURNAMENT_API_URL",
        default_value = "https://tournaments.snooker.web.gc.wstservices.co.uk/v2"
    )]
    pub tournament_api_url: String,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    pub redis_url: String,

    /// Endpoint that receives status-change events (required unless --dry-run)
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Feed polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "60")]
    pub poll_interval_secs: u64,

    /// Deadline for one sync cycle in seconds
    #[arg(long, env = "CYCLE_TIMEOUT_SECS", default_value = "30")]
    pub cycle_timeout_secs: u64,

    /// Run against an in-memory cache and log events instead of publishing
    #[arg(long, env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Run a single sync cycle and exit
    #[arg(long, default_value = "false")]
    pub once: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.dry_run && self.webhook_url.is_none() {
            anyhow::bail!(
                "WEBHOOK_URL is required outside dry-run mode. Use --dry-run to log events instead."
            );
        }
        if self.tournament_id.trim().is_empty() {
            anyhow::bail!("tournament_id must not be empty");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        if self.cycle_timeout_secs == 0 {
            anyhow::bail!("cycle_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
