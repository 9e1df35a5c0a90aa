use std::time::Duration;

use serde_json::Value;

use crate::{memory::MemoryStore, redis::RedisStore};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Coalesced refresh failed: {0}")]
    Refresh(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Temporal state of a stored entry. Only the SWR layer ever looks at
/// this; handlers read through `SwrCache` and never make freshness
/// decisions themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// TTL key/value store with glob key scan. The memory backend keeps a
/// per-key fresh/stale window pair; the Redis backend is a plain
/// `SET EX` store, so everything it returns reads as fresh.
pub enum CacheBackend {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl CacheBackend {
    /// Returns the stored value while `now <= stale_until`. Callers
    /// cannot tell fresh from stale here; that distinction stays inside
    /// the SWR layer.
    pub async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.probe(key).await?.map(|(value, _)| value))
    }

    /// Stores `value` with `fresh_until = now + ttl` and
    /// `stale_until = now + ttl * stale_multiplier` (memory), or a
    /// plain expiry of `ttl` (Redis).
    pub async fn set(
        &self, key: &str, value: &Value, ttl: Duration,
    ) -> CacheResult<()> {
        match self {
            Self::Memory(store) => {
                store.set(key, value, ttl);
                Ok(())
            }
            Self::Redis(store) => store.set(key, value, ttl).await,
        }
    }

    pub async fn del(&self, key: &str) -> CacheResult<bool> {
        match self {
            Self::Memory(store) => Ok(store.del(key)),
            Self::Redis(store) => store.del(key).await,
        }
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        match self {
            Self::Memory(store) => Ok(store.exists(key)),
            Self::Redis(store) => store.exists(key).await,
        }
    }

    /// All live keys matching a `*`/`?` glob. Only used for hot-set
    /// enumeration, which is low-cardinality.
    pub async fn keys_matching(
        &self, pattern: &str,
    ) -> CacheResult<Vec<String>> {
        match self {
            Self::Memory(store) => Ok(store.keys_matching(pattern)),
            Self::Redis(store) => store.keys_matching(pattern).await,
        }
    }

    /// Value plus freshness, for the SWR layer.
    pub(crate) async fn probe(
        &self, key: &str,
    ) -> CacheResult<Option<(Value, Freshness)>> {
        match self {
            Self::Memory(store) => Ok(store.probe(key)),
            Self::Redis(store) => {
                Ok(store
                    .get(key)
                    .await?
                    .map(|value| (value, Freshness::Fresh)))
            }
        }
    }

    /// Whether the backend can distinguish fresh from stale. The Redis
    /// backend cannot, so stale-while-revalidate degrades to TTL-only
    /// there.
    pub fn supports_swr(&self) -> bool {
        matches!(self, Self::Memory(_))
    }
}
