use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::instrument;

use super::{KeyValueStore, StoreResult};

pub const DEFAULT_KEY_PREFIX: &str = "starwatch:";

/// Keeps the cache and checkpoint in redis, for deployments without a writable disk.
///
/// `SET` replaces the value in one step, which is all the stores above need.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    prefix: String,
}

impl core::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    #[instrument]
    pub async fn new(redis_url: &str, prefix: &str) -> StoreResult<Self> {
        tracing::debug!(redis_url, "connecting to redis server");

        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            manager,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        prefixed(&self.prefix, key)
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.key(key)).await?;

        Ok(value)
    }

    #[instrument(skip(self, value), fields(len = value.len()))]
    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.set(self.key(key), value).await?;

        Ok(())
    }
}
