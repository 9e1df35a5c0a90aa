use std::{future::Future, sync::Arc, time::Duration};

use coalesce::{CoalesceResult, RequestCoalescer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{CacheBackend, CacheError, CacheResult, Freshness};

/// Read-through cache with request coalescing and
/// stale-while-revalidate.
///
/// `get_or_set` is the only place freshness decisions happen:
/// - fresh entry: returned as-is;
/// - stale entry: returned immediately, a coalesced refresh runs in the
///   background, failures there are swallowed;
/// - miss: the caller blocks on the coalesced factory, failures
///   propagate to every waiter of the key.
///
/// A factory yielding `None` (provider answered with no content) never
/// overwrites the cache.
#[derive(Clone)]
pub struct SwrCache {
    backend: Arc<CacheBackend>,
    coalescer: RequestCoalescer<Option<Value>>,
    enable_swr: bool,
}

impl SwrCache {
    pub fn new(backend: Arc<CacheBackend>, enable_swr: bool) -> Self {
        Self {
            enable_swr: enable_swr && backend.supports_swr(),
            backend,
            coalescer: RequestCoalescer::new(),
        }
    }

    pub fn backend(&self) -> &Arc<CacheBackend> { &self.backend }

    /// Shared with the odds worker pool so a demand miss and a poll
    /// refresh for the same key collapse into one upstream call.
    pub fn coalescer(&self) -> &RequestCoalescer<Option<Value>> {
        &self.coalescer
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.backend.get(key).await
    }

    pub async fn set(
        &self, key: &str, value: &Value, ttl: Duration,
    ) -> CacheResult<()> {
        self.backend.set(key, value, ttl).await
    }

    pub async fn del(&self, key: &str) -> CacheResult<bool> {
        self.backend.del(key).await
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.backend.exists(key).await
    }

    pub async fn keys_matching(
        &self, pattern: &str,
    ) -> CacheResult<Vec<String>> {
        self.backend.keys_matching(pattern).await
    }

    pub async fn get_or_set<F, Fut>(
        &self, key: &str, ttl: Duration, factory: F,
    ) -> CacheResult<Option<Value>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CoalesceResult<Option<Value>>>
            + Send
            + 'static,
    {
        match self.backend.probe(key).await? {
            Some((value, Freshness::Fresh)) => Ok(Some(value)),
            Some((value, Freshness::Stale)) => {
                if self.enable_swr {
                    debug!("serving stale {key}, refreshing behind it");
                    self.spawn_refresh(key, ttl, factory);
                }
                Ok(Some(value))
            }
            None => {
                refresh(
                    self.backend.clone(),
                    &self.coalescer,
                    key,
                    ttl,
                    factory,
                )
                .await
                .map_err(|err| CacheError::Refresh(err.to_string()))
            }
        }
    }

    /// Fire-and-forget stale refresh; the next tick retries on failure.
    fn spawn_refresh<F, Fut>(&self, key: &str, ttl: Duration, factory: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CoalesceResult<Option<Value>>>
            + Send
            + 'static,
    {
        let backend = self.backend.clone();
        let coalescer = self.coalescer.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(err) =
                refresh(backend, &coalescer, &key, ttl, factory).await
            {
                warn!("stale refresh for {key} failed: {err}");
            }
        });
    }
}

/// One coalesced fetch-and-store pass. The store happens inside the
/// coalesced task so N waiters produce exactly one cache write.
async fn refresh<F, Fut>(
    backend: Arc<CacheBackend>,
    coalescer: &RequestCoalescer<Option<Value>>, key: &str,
    ttl: Duration, factory: F,
) -> CoalesceResult<Option<Value>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = CoalesceResult<Option<Value>>> + Send + 'static,
{
    let store_key = key.to_string();
    coalescer
        .coalesce(key, move || {
            async move {
                let fetched = factory().await?;
                if let Some(value) = &fetched {
                    if let Err(err) =
                        backend.set(&store_key, value, ttl).await
                    {
                        warn!(
                            "cache write for {store_key} failed: {err}"
                        );
                    }
                }
                Ok(fetched)
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use coalesce::CoalesceError;
    use serde_json::json;
    use tokio::time::sleep;

    use super::*;
    use crate::memory::MemoryStore;

    fn memory_cache(stale_multiplier: u32) -> SwrCache {
        let backend = Arc::new(CacheBackend::Memory(MemoryStore::new(
            stale_multiplier,
        )));
        SwrCache::new(backend, true)
    }

    #[tokio::test]
    async fn fresh_hit_never_calls_the_factory() {
        let cache = memory_cache(2);
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .set("matches:4", &json!(["m1"]), Duration::from_secs(60))
            .await
            .unwrap();

        let counted = calls.clone();
        let value = cache
            .get_or_set("matches:4", Duration::from_secs(60), move || {
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json!(["m2"])))
                }
            })
            .await
            .unwrap();

        assert_eq!(value, Some(json!(["m1"])));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_blocks_fetches_and_stores() {
        let cache = memory_cache(2);

        let value = cache
            .get_or_set("odds:1", Duration::from_secs(60), || {
                async { Ok(Some(json!({"back": 2.1}))) }
            })
            .await
            .unwrap();

        assert_eq!(value, Some(json!({"back": 2.1})));
        assert_eq!(
            cache.get("odds:1").await.unwrap(),
            Some(json!({"back": 2.1}))
        );
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_factory_run() {
        let cache = memory_cache(2);
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..25 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_set(
                        "odds:herd",
                        Duration::from_secs(60),
                        move || {
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                sleep(Duration::from_millis(30)).await;
                                Ok(Some(json!(1.5)))
                            }
                        },
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Some(json!(1.5)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entry_serves_immediately_and_refreshes_behind() {
        let cache = memory_cache(2);
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .set("matches:4", &json!("old"), Duration::from_millis(30))
            .await
            .unwrap();
        sleep(Duration::from_millis(40)).await;

        let counted = calls.clone();
        let value = cache
            .get_or_set(
                "matches:4",
                Duration::from_secs(60),
                move || {
                    async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                        Ok(Some(json!("new")))
                    }
                },
            )
            .await
            .unwrap();

        // The stale payload comes back without waiting for upstream.
        assert_eq!(value, Some(json!("old")));

        sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get("matches:4").await.unwrap(),
            Some(json!("new"))
        );
    }

    #[tokio::test]
    async fn stale_refresh_failure_is_swallowed() {
        let cache = memory_cache(2);

        cache
            .set("matches:4", &json!("old"), Duration::from_millis(50))
            .await
            .unwrap();
        sleep(Duration::from_millis(60)).await;

        let value = cache
            .get_or_set("matches:4", Duration::from_secs(60), || {
                async {
                    Err(CoalesceError::Fetch("upstream down".into()))
                }
            })
            .await
            .unwrap();

        assert_eq!(value, Some(json!("old")));

        // Still serving the stale entry afterwards.
        sleep(Duration::from_millis(20)).await;
        assert_eq!(
            cache.get("matches:4").await.unwrap(),
            Some(json!("old"))
        );
    }

    #[tokio::test]
    async fn miss_failure_propagates_and_cleans_up() {
        let cache = memory_cache(2);

        let result = cache
            .get_or_set("odds:down", Duration::from_secs(60), || {
                async { Err(CoalesceError::Fetch("refused".into())) }
            })
            .await;
        assert!(matches!(result, Err(CacheError::Refresh(_))));
        assert_eq!(cache.coalescer().active_count(), 0);

        // Next call retries and succeeds.
        let value = cache
            .get_or_set("odds:down", Duration::from_secs(60), || {
                async { Ok(Some(json!(2.0))) }
            })
            .await
            .unwrap();
        assert_eq!(value, Some(json!(2.0)));
    }

    #[tokio::test]
    async fn empty_provider_payload_is_not_cached() {
        let cache = memory_cache(2);

        let value = cache
            .get_or_set("details:77", Duration::from_secs(60), || {
                async { Ok(None) }
            })
            .await
            .unwrap();

        assert_eq!(value, None);
        assert_eq!(cache.get("details:77").await.unwrap(), None);
    }
}
