use std::time::Duration;

use deadpool_redis::{
    Config, Pool, Runtime, redis::AsyncCommands,
};
use serde_json::Value;
use tracing::instrument;

use crate::backend::{CacheError, CacheResult};

/// All keys live under one namespace so the edge can share a Redis
/// instance with other tenants.
const NAMESPACE: &str = "ex:";

pub fn connect_redis(url: &str) -> Result<Pool, String> {
    Config::from_url(url)
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| format!("failed to create Redis pool: {e}"))
}

/// External cache backend. Plain `SET EX` semantics: the stale window
/// does not exist here, entries simply expire at their TTL.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self { Self { pool } }

    fn namespaced(key: &str) -> String { format!("{NAMESPACE}{key}") }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> =
            conn.get(Self::namespaced(key)).await?;
        match raw {
            Some(raw) => {
                let value = serde_json::from_str(&raw).map_err(|e| {
                    CacheError::Serialization(e.to_string())
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value))]
    pub async fn set(
        &self, key: &str, value: &Value, ttl: Duration,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(
            Self::namespaced(key),
            raw,
            ttl.as_secs().max(1),
        )
        .await?;
        Ok(())
    }

    pub async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        let removed: u64 = conn.del(Self::namespaced(key)).await?;
        Ok(removed > 0)
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        Ok(conn.exists(Self::namespaced(key)).await?)
    }

    /// `KEYS` is fine here: the only pattern scan is the hot set, which
    /// stays small by construction.
    pub async fn keys_matching(
        &self, pattern: &str,
    ) -> CacheResult<Vec<String>> {
        let mut conn = self.pool.get().await?;
        let keys: Vec<String> =
            conn.keys(Self::namespaced(pattern)).await?;
        Ok(keys
            .into_iter()
            .map(|key| {
                key.strip_prefix(NAMESPACE)
                    .map(str::to_string)
                    .unwrap_or(key)
            })
            .collect())
    }
}
