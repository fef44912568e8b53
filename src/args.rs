use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;
use clap::{Parser, ValueEnum};

use crate::announce::DEFAULT_MESSAGE_BUDGET;
use crate::leaderboard::client::{DEFAULT_BASE_URL, DEFAULT_FETCH_TIMEOUT, LeaderboardSource};
use crate::store::DEFAULT_CACHE_TTL;
use crate::sync::scheduler::DEFAULT_POLL_INTERVAL;

const DEFAULT_USER_AGENT: &str = concat!("starwatch/", env!("CARGO_PKG_VERSION"));

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// One file per key under `--data-dir`
    File,
    Redis,
    /// Process memory; the checkpoint is lost on restart
    Memory,
}

#[derive(Parser, Debug)]
#[command(version, about = "Announces new stars on an Advent of Code private leaderboard")]
pub struct Cli {
    /// AoC `session` cookie value
    #[arg(long, env = "AOC_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: String,

    /// Private leaderboard id
    #[arg(long, env = "AOC_LEADERBOARD_ID")]
    pub leaderboard_id: String,

    /// Event year
    #[arg(long, env = "AOC_YEAR", default_value_t = 2024)]
    pub year: i32,

    #[arg(long, env = "AOC_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Identifying User-Agent sent with every leaderboard request
    #[arg(long, env = "AOC_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Seconds a cached snapshot stays fresh
    #[arg(long, env = "CACHE_TTL", default_value_t = DEFAULT_CACHE_TTL.as_secs())]
    pub cache_ttl: u64,

    /// Seconds before a leaderboard request is abandoned
    #[arg(long, env = "FETCH_TIMEOUT", default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs())]
    pub fetch_timeout: u64,

    /// Seconds between scheduled check cycles
    #[arg(long, env = "POLL_INTERVAL", default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval: u64,

    /// Max characters per announcement message
    #[arg(long, env = "MESSAGE_BUDGET", default_value_t = DEFAULT_MESSAGE_BUDGET)]
    pub message_budget: usize,

    /// Discord webhook that receives announcements
    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Log announcements instead of delivering them
    #[arg(long, env = "TESTING_MODE")]
    pub testing_mode: bool,

    #[arg(long = "store", env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::File)]
    pub store: StoreBackend,

    /// Directory holding the cache and checkpoint files
    #[arg(long, env = "DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Address the on-demand API listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Token required in the `Authorization` header of API requests
    #[arg(long, env = "INTERNAL_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.session_token.trim().is_empty(),
            "session token must not be empty"
        );
        ensure!(
            !self.leaderboard_id.trim().is_empty(),
            "leaderboard id must not be empty"
        );

        for (name, value) in [
            ("cache-ttl", self.cache_ttl),
            ("fetch-timeout", self.fetch_timeout),
            ("poll-interval", self.poll_interval),
            ("message-budget", self.message_budget as u64),
        ] {
            ensure!(value > 0, "{name} must be greater than zero");
        }

        Ok(())
    }

    /// Announcements are simulated in testing mode and whenever there is no webhook to post to
    pub fn dry_run(&self) -> bool {
        self.testing_mode || self.webhook_url.is_none()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn source(&self) -> LeaderboardSource {
        LeaderboardSource {
            base_url: self.base_url.clone(),
            year: self.year,
            leaderboard_id: self.leaderboard_id.clone(),
            session_token: self.session_token.clone(),
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.fetch_timeout),
        }
    }
}

/// Loads `.env`, parses the command line and validates it
pub fn parse_cli_args() -> anyhow::Result<Arc<Cli>> {
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    args.validate()?;

    Ok(Arc::new(args))
}
