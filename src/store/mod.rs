pub mod file;
pub mod memory;
pub mod redis;

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::leaderboard::Snapshot;
use crate::util::clock::Clock;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

pub const SNAPSHOT_KEY: &str = "leaderboard_cache.json";
pub const CHECKPOINT_KEY: &str = "last_check.txt";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(900);

/// How far back the first ever scan looks when no checkpoint has been stored
pub const DEFAULT_LOOKBACK_SECS: i64 = 15 * 60;

/// Minimal string store backing the snapshot cache and the checkpoint
#[async_trait]
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replaces any previous value for `key` in a single step
    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;
}

pub type StoreResult<T> = core::result::Result<T, StoreErr>;

#[derive(Debug, Error)]
pub enum StoreErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error("invalid store key '{0}'")]
    InvalidKey(String),
}

#[derive(Debug, Deserialize)]
struct CacheEntry {
    timestamp: f64,
    data: Snapshot,
}

#[derive(Debug, Serialize)]
struct CacheEntryRef<'a> {
    timestamp: f64,
    data: &'a Snapshot,
}

/// Last fetched snapshot, considered fresh for `ttl` after it was written
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Returns the cached snapshot if one exists, parses, and is younger than the TTL.
    ///
    /// Anything else (missing, unreadable, malformed, stale) is reported as `None`.
    #[instrument(skip(self))]
    pub async fn read(&self) -> Option<Snapshot> {
        let raw = match self.store.get(SNAPSHOT_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("no cached snapshot");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "unable to read snapshot cache");
                return None;
            }
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "malformed snapshot cache, ignoring");
                return None;
            }
        };

        let age = now_secs(self.clock.as_ref()) - entry.timestamp;
        if age >= self.ttl.as_secs_f64() {
            tracing::debug!(age, ttl = self.ttl.as_secs(), "snapshot cache expired");
            return None;
        }

        tracing::debug!(age, "using cached snapshot");
        let mut snapshot = entry.data;
        snapshot.fetched_at = entry.timestamp as i64;

        Some(snapshot)
    }

    /// Stores `snapshot` stamped with the current time, overwriting the previous entry
    #[instrument(skip(self, snapshot), fields(members = snapshot.members.len()))]
    pub async fn write(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let entry = CacheEntryRef {
            timestamp: now_secs(self.clock.as_ref()),
            data: snapshot,
        };

        let serialized = serde_json::to_string(&entry)?;
        self.store.put(SNAPSHOT_KEY, &serialized).await?;

        tracing::debug!(timestamp = entry.timestamp, "wrote snapshot cache");
        Ok(())
    }
}

fn now_secs(clock: &dyn Clock) -> f64 {
    clock.now().timestamp_millis() as f64 / 1000.0
}

/// Timestamp up to which achievements have already been announced
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the stored checkpoint, or fifteen minutes ago when there is no usable value
    #[instrument(skip(self))]
    pub async fn read(&self) -> i64 {
        let fallback = || self.clock.timestamp() - DEFAULT_LOOKBACK_SECS;

        match self.store.get(CHECKPOINT_KEY).await {
            Ok(Some(raw)) => raw.trim().parse::<i64>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, raw = %raw, "corrupt checkpoint, using default");
                fallback()
            }),
            Ok(None) => {
                tracing::info!("no stored checkpoint, using default");
                fallback()
            }
            Err(e) => {
                tracing::warn!(error = ?e, "unable to read checkpoint, using default");
                fallback()
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn write(&self, timestamp: i64) -> StoreResult<()> {
        self.store.put(CHECKPOINT_KEY, &timestamp.to_string()).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::leaderboard::test::SAMPLE_BODY;
    use crate::util::clock::ManualClock;

    fn stores(now: i64) -> (Arc<MemoryStore>, Arc<ManualClock>) {
        (Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(now)))
    }

    fn sample() -> Snapshot {
        serde_json::from_str(SAMPLE_BODY).unwrap()
    }

    #[tokio::test]
    async fn test_cache_freshness_window() {
        let (store, clock) = stores(0);
        let cache = SnapshotCache::new(store, clock.clone(), DEFAULT_CACHE_TTL);

        cache.write(&sample()).await.unwrap();

        clock.set(899);
        let cached = cache.read().await.unwrap();
        assert_eq!(cached.members, sample().members);
        assert_eq!(cached.fetched_at, 0);

        clock.set(900);
        assert!(cache.read().await.is_none());

        clock.set(901);
        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn test_cache_write_overwrites() {
        let (store, clock) = stores(100);
        let cache = SnapshotCache::new(store, clock.clone(), DEFAULT_CACHE_TTL);

        cache.write(&sample()).await.unwrap();
        clock.set(1_000);
        cache.write(&Snapshot::default()).await.unwrap();

        clock.set(1_500);
        let cached = cache.read().await.unwrap();
        assert!(cached.members.is_empty());
        assert_eq!(cached.fetched_at, 1_000);
    }

    #[tokio::test]
    async fn test_cache_malformed_is_absent() {
        let (store, clock) = stores(0);
        let cache = SnapshotCache::new(store.clone(), clock, DEFAULT_CACHE_TTL);

        assert!(cache.read().await.is_none());

        for raw in [
            "not json",
            r#"{"timestamp": 0}"#,
            r#"{"data": {"members": {}}}"#,
            r#"{"timestamp": 0, "data": {"no_members": true}}"#,
        ] {
            store.put(SNAPSHOT_KEY, raw).await.unwrap();
            assert!(cache.read().await.is_none(), "accepted '{raw}'");
        }
    }

    #[tokio::test]
    async fn test_cache_reads_legacy_layout() {
        let (store, clock) = stores(1_000);
        let cache = SnapshotCache::new(store.clone(), clock, DEFAULT_CACHE_TTL);

        let raw = format!(r#"{{"timestamp": 999.5, "data": {SAMPLE_BODY}}}"#);
        store.put(SNAPSHOT_KEY, &raw).await.unwrap();

        let cached = cache.read().await.unwrap();
        assert_eq!(cached.members.len(), 2);
        assert_eq!(cached.fetched_at, 999);
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let (store, clock) = stores(5_000);
        let checkpoints = CheckpointStore::new(store, clock);

        for ts in [0, 1, 1701432000, -42, i64::MAX] {
            checkpoints.write(ts).await.unwrap();
            assert_eq!(checkpoints.read().await, ts);
        }
    }

    #[tokio::test]
    async fn test_checkpoint_default() {
        let (store, clock) = stores(5_000);
        let checkpoints = CheckpointStore::new(store.clone(), clock);

        assert_eq!(checkpoints.read().await, 5_000 - DEFAULT_LOOKBACK_SECS);

        store.put(CHECKPOINT_KEY, "yesterday").await.unwrap();
        assert_eq!(checkpoints.read().await, 5_000 - DEFAULT_LOOKBACK_SECS);

        store.put(CHECKPOINT_KEY, " 1234\n").await.unwrap();
        assert_eq!(checkpoints.read().await, 1234);
    }
}
