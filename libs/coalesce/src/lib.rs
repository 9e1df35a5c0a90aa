use std::{future::Future, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::broadcast;
use tracing::debug;

/// Failure of a coalesced fetch. Cloneable so one settlement can fan out
/// to every waiter on the key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoalesceError {
    #[error("upstream fetch failed: {0}")]
    Fetch(String),
    #[error("in-flight fetch settled without a result")]
    Abandoned,
}

pub type CoalesceResult<T> = Result<T, CoalesceError>;

type InFlightMap<T> =
    DashMap<String, broadcast::Sender<CoalesceResult<T>>>;

/// Collapses concurrent fetches for the same key into one in-flight
/// operation shared by all callers.
///
/// The first caller for a key spawns the fetch as a detached task, so
/// the slot settles and cleans up even if every caller goes away
/// mid-flight. The slot is removed from the index before the result is
/// broadcast; a caller arriving after that starts a fresh fetch.
pub struct RequestCoalescer<T> {
    in_flight: Arc<InFlightMap<T>>,
}

impl<T> Clone for RequestCoalescer<T> {
    fn clone(&self) -> Self {
        Self {
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self { Self::new() }
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Number of keys currently in flight.
    pub fn active_count(&self) -> usize { self.in_flight.len() }

    /// Run `fetch` for `key`, or join the fetch already in flight for
    /// it. Every caller receives the same settlement, value or failure.
    pub async fn coalesce<F, Fut>(
        &self, key: &str, fetch: F,
    ) -> CoalesceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CoalesceResult<T>> + Send + 'static,
    {
        let mut rx = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(slot) => {
                debug!("joining in-flight fetch for {key}");
                slot.get().subscribe()
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = broadcast::channel(1);
                slot.insert(tx.clone());

                let fut = fetch();
                let in_flight = self.in_flight.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    let result = fut.await;
                    // Clear the slot before waiters observe the result,
                    // so a retry never finds a settled entry.
                    in_flight.remove(&key);
                    let _ = tx.send(result);
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            Err(_) => Err(CoalesceError::Abandoned),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use tokio::time::sleep;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let coalescer = RequestCoalescer::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .coalesce("odds:1001", move || {
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_millis(50)).await;
                            Ok(7)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_fans_out_to_all_waiters() {
        let coalescer = RequestCoalescer::<u32>::new();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let coalescer = coalescer.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .coalesce("odds:1002", || {
                        async {
                            sleep(Duration::from_millis(20)).await;
                            Err(CoalesceError::Fetch("boom".into()))
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                Err(CoalesceError::Fetch("boom".into()))
            );
        }
    }

    #[tokio::test]
    async fn slot_is_cleared_after_settlement() {
        let coalescer = RequestCoalescer::<u32>::new();

        let result = coalescer
            .coalesce("odds:1003", || async { Ok(1) })
            .await;
        assert_eq!(result, Ok(1));
        assert_eq!(coalescer.active_count(), 0);

        // A failed fetch clears the slot too, so the next call retries.
        let result = coalescer
            .coalesce("odds:1003", || {
                async { Err(CoalesceError::Fetch("down".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(coalescer.active_count(), 0);

        let result = coalescer
            .coalesce("odds:1003", || async { Ok(2) })
            .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently() {
        let coalescer = RequestCoalescer::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for i in 0..4 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .coalesce(&format!("odds:{i}"), move || {
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_millis(20)).await;
                            Ok(i)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_leak_the_slot() {
        let coalescer = RequestCoalescer::<u32>::new();

        let handle = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .coalesce("odds:1004", || {
                        async {
                            sleep(Duration::from_millis(50)).await;
                            Ok(9)
                        }
                    })
                    .await
            })
        };

        // Drop the only caller mid-flight; the detached fetch still
        // settles and cleans up.
        sleep(Duration::from_millis(10)).await;
        handle.abort();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(coalescer.active_count(), 0);
    }
}
