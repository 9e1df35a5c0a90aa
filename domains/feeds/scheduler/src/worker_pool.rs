use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use cache_store::SwrCache;
use coalesce::CoalesceError;
use feeds_models::cache_keys;
use provider_client::ProviderClient;
use tracing::{debug, warn};

/// One hot match to refresh. The queue does not de-duplicate; the
/// coalescer makes duplicates cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddsJob {
    pub game_id: String,
    pub sport_id: i64,
}

/// Posted once per tick when the queue drains and the last worker
/// retires. The scheduler clears its in-progress flag on receipt.
#[derive(Debug, Clone, Copy)]
pub struct TickComplete;

/// Bounded-concurrency fetcher for the hot set. FIFO queue, at most
/// `max_concurrency` workers, per-entry failure and panic isolation.
#[derive(Clone)]
pub struct OddsWorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    queue: Mutex<VecDeque<OddsJob>>,
    active: AtomicUsize,
    processing: AtomicBool,
    max_concurrency: usize,
    cache: SwrCache,
    provider: Arc<dyn ProviderClient>,
    odds_ttl: Duration,
    tick_tx: flume::Sender<TickComplete>,
}

impl OddsWorkerPool {
    pub fn new(
        cache: SwrCache, provider: Arc<dyn ProviderClient>,
        odds_ttl: Duration, max_concurrency: usize,
    ) -> (Self, flume::Receiver<TickComplete>) {
        let (tick_tx, tick_rx) = flume::unbounded();
        let pool = Self {
            inner: Arc::new(PoolInner {
                queue: Mutex::new(VecDeque::new()),
                active: AtomicUsize::new(0),
                processing: AtomicBool::new(false),
                max_concurrency: max_concurrency.max(1),
                cache,
                provider,
                odds_ttl,
                tick_tx,
            }),
        };
        (pool, tick_rx)
    }

    /// Append a batch and make sure enough workers are running to
    /// drain it.
    pub fn enqueue(&self, jobs: Vec<OddsJob>) {
        if jobs.is_empty() {
            return;
        }
        self.inner.lock_queue().extend(jobs);
        self.inner.processing.store(true, Ordering::SeqCst);
        PoolInner::spawn_workers(self.inner.clone());
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize { self.inner.lock_queue().len() }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }
}

impl PoolInner {
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<OddsJob>> {
        self.queue.lock().expect("odds queue lock poisoned")
    }

    fn spawn_workers(inner: Arc<Self>) {
        loop {
            let active = inner.active.load(Ordering::SeqCst);
            if active >= inner.max_concurrency {
                break;
            }
            if inner.lock_queue().is_empty() {
                break;
            }
            if inner
                .active
                .compare_exchange(
                    active,
                    active + 1,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_err()
            {
                continue;
            }
            let worker = inner.clone();
            tokio::spawn(async move {
                Self::worker_loop(worker).await;
            });
        }
    }

    async fn worker_loop(inner: Arc<Self>) {
        loop {
            let Some(job) = inner.lock_queue().pop_front() else {
                break;
            };
            // One task per entry so a panic takes out the entry, not
            // the worker slot.
            let game_id = job.game_id.clone();
            let entry =
                tokio::spawn(Self::process(inner.clone(), job));
            if let Err(err) = entry.await {
                warn!("odds refresh for {game_id} panicked: {err}");
            }
        }

        let remaining =
            inner.active.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            if inner.lock_queue().is_empty() {
                inner.processing.store(false, Ordering::SeqCst);
                let _ = inner.tick_tx.send(TickComplete);
            }
            else {
                // An enqueue raced the drain; pick the work back up.
                Self::spawn_workers(inner);
            }
        }
    }

    async fn process(inner: Arc<Self>, job: OddsJob) {
        let key = cache_keys::odds(&job.game_id);
        let provider = inner.provider.clone();
        let game_id = job.game_id.clone();
        let sport_id = job.sport_id;

        let result = inner
            .cache
            .coalescer()
            .coalesce(&key, move || {
                async move {
                    provider
                        .get_match_odds(&game_id, sport_id)
                        .await
                        .map_err(|e| {
                            CoalesceError::Fetch(e.to_string())
                        })
                }
            })
            .await;

        match result {
            Ok(Some(value)) => {
                if let Err(err) = inner
                    .cache
                    .set(&key, &value, inner.odds_ttl)
                    .await
                {
                    warn!(
                        "odds cache write for {} failed: {err}",
                        job.game_id
                    );
                }
            }
            Ok(None) => {
                debug!("no odds content for {}", job.game_id);
            }
            Err(err) => {
                warn!("odds fetch for {} failed: {err}", job.game_id);
            }
        }
    }
}
