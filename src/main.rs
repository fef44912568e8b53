use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::announce::{Dispatcher, DryRunDispatcher, WebhookDispatcher};
use crate::args::{Cli, StoreBackend};
use crate::leaderboard::client::LeaderboardClient;
use crate::store::redis::DEFAULT_KEY_PREFIX;
use crate::store::{CheckpointStore, FileStore, KeyValueStore, MemoryStore, RedisStore, SnapshotCache};
use crate::sync::scheduler::Scheduler;
use crate::sync::{Tracker, TrackerSettings};
use crate::util::clock::{Clock, SystemClock};

mod announce;
mod api;
mod args;
mod leaderboard;
mod store;
mod sync;
mod util;

const DRY_RUN_CHANNEL: &str = "dry-run";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = args::parse_cli_args()?;
    util::tracing::build_subscriber();

    tracing::info!(
        year = args.year,
        leaderboard_id = %args.leaderboard_id,
        store = ?args.store,
        "starting starwatch"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = open_store(&args).await?;

    let cache = SnapshotCache::new(store.clone(), clock.clone(), args.cache_ttl());
    let client = LeaderboardClient::new(&args.source(), cache, clock.clone())
        .context("failed to build leaderboard client")?;
    let checkpoints = CheckpointStore::new(store, clock.clone());

    let (dispatcher, channel): (Arc<dyn Dispatcher>, String) = match &args.webhook_url {
        Some(url) if !args.testing_mode => {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(args.fetch_timeout))
                .build()
                .context("failed to build webhook client")?;
            (Arc::new(WebhookDispatcher::new(http)), url.clone())
        }
        _ => {
            if args.webhook_url.is_none() && !args.testing_mode {
                tracing::warn!("no webhook configured; announcements will only be logged");
            }
            (Arc::new(DryRunDispatcher::new()), DRY_RUN_CHANNEL.to_string())
        }
    };
    tracing::info!(dry_run = args.dry_run(), "dispatcher ready");

    let settings = TrackerSettings {
        year: args.year,
        channel,
        message_budget: args.message_budget,
    };
    let tracker = Arc::new(Tracker::new(client, checkpoints, dispatcher, clock, settings).await);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("received ctrl-c, shutting down"),
                Err(e) => tracing::error!(error = ?e, "failed to listen for ctrl-c"),
            }
            shutdown.cancel();
        }
    });

    let scheduler = Scheduler::new(tracker.clone(), args.poll_interval(), shutdown.clone());
    let state = api::AppState {
        tracker,
        api_token: args.api_token.as_deref().map(Arc::from),
    };

    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        let listen = args.listen;
        async move {
            let res = api::serve(listen, state, shutdown.clone()).await;
            shutdown.cancel();
            res
        }
    });

    scheduler.run().await;
    server
        .await
        .context("api task panicked")?
        .context("api server failed")?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn open_store(args: &Cli) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match args.store {
        StoreBackend::File => Arc::new(FileStore::new(args.data_dir.clone())),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Redis => Arc::new(
            RedisStore::new(&args.redis_url, DEFAULT_KEY_PREFIX)
                .await
                .context("failed to connect to redis")?,
        ),
    };

    Ok(store)
}
