use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use cache_store::SwrCache;
use feeds_models::{cache_keys, is_empty_payload};
use provider_client::{ProviderClient, ProviderResult};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, interval_at, timeout},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::SchedulerConfig,
    hot_keys::HotKeyRegistry,
    worker_pool::{OddsJob, OddsWorkerPool, TickComplete},
};

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub active: usize,
    pub queued: usize,
    pub processing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub started: bool,
    pub odds_polling_active: bool,
    pub ticks_skipped: u64,
    pub coalescer_active: usize,
    pub worker: WorkerStats,
    pub hot_keys: Vec<String>,
    pub hot_key_count: usize,
}

#[derive(Debug, Clone, Copy)]
enum SlowTier {
    MatchList,
    TopEvents,
    Banners,
    Sidebar,
}

impl SlowTier {
    fn name(self) -> &'static str {
        match self {
            Self::MatchList => "matchList",
            Self::TopEvents => "topEvents",
            Self::Banners => "banners",
            Self::Sidebar => "sidebar",
        }
    }
}

/// Owns the periodic timers and dispatches per-tier refreshes.
///
/// Slow tiers call the provider directly and overwrite their canonical
/// cache keys. The 1-second odds tier is demand-driven: it enumerates
/// the hot set and hands it to the worker pool, skipping the tick
/// entirely while a previous tick is still draining.
#[derive(Clone)]
pub struct TieredScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    cache: SwrCache,
    provider: Arc<dyn ProviderClient>,
    registry: HotKeyRegistry,
    pool: OddsWorkerPool,
    tick_rx: flume::Receiver<TickComplete>,
    config: SchedulerConfig,
    started: AtomicBool,
    tick_in_progress: AtomicBool,
    ticks_skipped: AtomicU64,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TieredScheduler {
    pub fn new(
        cache: SwrCache, provider: Arc<dyn ProviderClient>,
        registry: HotKeyRegistry, config: SchedulerConfig,
    ) -> Self {
        let (pool, tick_rx) = OddsWorkerPool::new(
            cache.clone(),
            provider.clone(),
            config.ttls.odds,
            config.max_concurrency,
        );
        Self {
            inner: Arc::new(SchedulerInner {
                cache,
                provider,
                registry,
                pool,
                tick_rx,
                config,
                started: AtomicBool::new(false),
                tick_in_progress: AtomicBool::new(false),
                ticks_skipped: AtomicU64::new(0),
                shutdown: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Bootstrap the slow datasets, then install one timer per tier.
    /// Calling `start` on a running scheduler is a no-op.
    #[instrument(skip_all)]
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("scheduler already started");
            return;
        }
        info!("starting tiered scheduler");

        bootstrap(&self.inner).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = vec![
            spawn_tick_listener(
                self.inner.clone(),
                shutdown_rx.clone(),
            ),
            spawn_odds_loop(self.inner.clone(), shutdown_rx.clone()),
        ];
        for tier in [
            SlowTier::MatchList,
            SlowTier::TopEvents,
            SlowTier::Banners,
            SlowTier::Sidebar,
        ] {
            handles.push(spawn_slow_loop(
                self.inner.clone(),
                tier,
                shutdown_rx.clone(),
            ));
        }

        *self.inner.lock_shutdown() = Some(shutdown_tx);
        self.inner.lock_tasks().extend(handles);
        info!("tiered scheduler started");
    }

    /// Cooperative shutdown: timers stop firing, loops get one grace
    /// period to finish their current upstream call, then are aborted.
    /// Calling `stop` on a stopped scheduler is a no-op.
    #[instrument(skip_all)]
    pub async fn stop(&self) {
        if !self.inner.started.swap(false, Ordering::SeqCst) {
            debug!("scheduler already stopped");
            return;
        }
        info!("stopping tiered scheduler");

        if let Some(tx) = self.inner.lock_shutdown().take() {
            let _ = tx.send(true);
        }

        let tasks: Vec<JoinHandle<()>> =
            self.inner.lock_tasks().drain(..).collect();
        for mut task in tasks {
            if timeout(self.inner.config.shutdown_grace, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }
        info!("tiered scheduler stopped");
    }

    pub async fn stats(&self) -> SchedulerStats {
        let hot = self.inner.registry.list().await.unwrap_or_default();
        SchedulerStats {
            started: self.inner.started.load(Ordering::SeqCst),
            odds_polling_active: self
                .inner
                .tick_in_progress
                .load(Ordering::SeqCst),
            ticks_skipped: self
                .inner
                .ticks_skipped
                .load(Ordering::SeqCst),
            coalescer_active: self
                .inner
                .cache
                .coalescer()
                .active_count(),
            worker: WorkerStats {
                active: self.inner.pool.active(),
                queued: self.inner.pool.queued(),
                processing: self.inner.pool.is_processing(),
            },
            hot_key_count: hot.len(),
            hot_keys: hot
                .into_iter()
                .map(|record| record.game_id)
                .collect(),
        }
    }
}

impl SchedulerInner {
    fn lock_shutdown(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<watch::Sender<bool>>> {
        self.shutdown.lock().expect("shutdown lock poisoned")
    }

    fn lock_tasks(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().expect("task list lock poisoned")
    }
}

fn spawn_tick_listener(
    inner: Arc<SchedulerInner>, mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let rx = inner.tick_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = rx.recv_async() => {
                    match received {
                        Ok(TickComplete) => {
                            inner
                                .tick_in_progress
                                .store(false, Ordering::SeqCst);
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    })
}

fn spawn_odds_loop(
    inner: Arc<SchedulerInner>, mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(inner.config.poll_intervals.odds);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => odds_tick(&inner).await,
            }
        }
    })
}

async fn odds_tick(inner: &SchedulerInner) {
    if inner.tick_in_progress.load(Ordering::SeqCst) {
        inner.ticks_skipped.fetch_add(1, Ordering::SeqCst);
        debug!("odds tick still draining, skipping");
        return;
    }

    let hot = match inner.registry.list().await {
        Ok(hot) => hot,
        Err(err) => {
            warn!("hot set enumeration failed: {err}");
            return;
        }
    };
    if hot.is_empty() {
        return;
    }

    inner.tick_in_progress.store(true, Ordering::SeqCst);
    let jobs: Vec<OddsJob> = hot
        .into_iter()
        .map(|record| {
            OddsJob {
                game_id: record.game_id,
                sport_id: record.sport_id,
            }
        })
        .collect();
    debug!("odds tick dispatching {} hot keys", jobs.len());
    inner.pool.enqueue(jobs);
}

fn spawn_slow_loop(
    inner: Arc<SchedulerInner>, tier: SlowTier,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = match tier {
            SlowTier::MatchList => {
                inner.config.poll_intervals.match_list
            }
            SlowTier::TopEvents => {
                inner.config.poll_intervals.top_events
            }
            SlowTier::Banners => inner.config.poll_intervals.banners,
            SlowTier::Sidebar => inner.config.poll_intervals.sidebar,
        };
        // Bootstrap already did the first sweep; start one period out.
        let mut ticker =
            interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => run_slow_tier(&inner, tier).await,
            }
        }
    })
}

async fn run_slow_tier(inner: &SchedulerInner, tier: SlowTier) {
    match tier {
        SlowTier::MatchList => run_match_list_sweep(inner).await,
        SlowTier::TopEvents => {
            let result = inner.provider.get_top_events().await;
            store_tier_result(
                inner,
                tier.name(),
                cache_keys::TOP_EVENTS,
                inner.config.ttls.top_events,
                result,
            )
            .await;
        }
        SlowTier::Banners => {
            let result = inner.provider.get_banners().await;
            store_tier_result(
                inner,
                tier.name(),
                cache_keys::BANNERS,
                inner.config.ttls.banners,
                result,
            )
            .await;
        }
        SlowTier::Sidebar => {
            let result = inner.provider.get_sidebar_tree().await;
            store_tier_result(
                inner,
                tier.name(),
                cache_keys::SIDEBAR,
                inner.config.ttls.sidebar,
                result,
            )
            .await;
        }
    }
}

/// One match-list pass over every known sport. The sports list comes
/// from cache; when it is missing the sweep refetches it first.
async fn run_match_list_sweep(inner: &SchedulerInner) {
    let sports = match inner.cache.get(cache_keys::SPORTS).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            match inner.provider.get_all_sports().await {
                Ok(Some(value)) => {
                    store_payload(
                        inner,
                        "matchList",
                        cache_keys::SPORTS,
                        inner.config.ttls.sports,
                        &value,
                    )
                    .await;
                    value
                }
                Ok(None) => {
                    debug!("matchList: sports list is empty upstream");
                    return;
                }
                Err(err) => {
                    warn!("matchList: sports refetch failed: {err}");
                    return;
                }
            }
        }
        Err(err) => {
            warn!("matchList: sports cache read failed: {err}");
            return;
        }
    };

    for sport_id in extract_sport_ids(&sports) {
        let result = inner.provider.get_match_list(sport_id).await;
        store_tier_result(
            inner,
            "matchList",
            &cache_keys::match_list(sport_id),
            inner.config.ttls.match_list,
            result,
        )
        .await;
    }
}

/// The one-shot bootstrap: slow datasets plus a first match-list sweep
/// per sport. Failures are logged, never fatal; routes serve empty data
/// until the next tier tick succeeds.
#[instrument(skip_all)]
async fn bootstrap(inner: &SchedulerInner) {
    info!("bootstrapping slow feed tiers");

    let sports = inner.provider.get_all_sports().await;
    store_tier_result(
        inner,
        "bootstrap",
        cache_keys::SPORTS,
        inner.config.ttls.sports,
        sports,
    )
    .await;

    let sidebar = inner.provider.get_sidebar_tree().await;
    store_tier_result(
        inner,
        "bootstrap",
        cache_keys::SIDEBAR,
        inner.config.ttls.sidebar,
        sidebar,
    )
    .await;

    let top_events = inner.provider.get_top_events().await;
    store_tier_result(
        inner,
        "bootstrap",
        cache_keys::TOP_EVENTS,
        inner.config.ttls.top_events,
        top_events,
    )
    .await;

    let banners = inner.provider.get_banners().await;
    store_tier_result(
        inner,
        "bootstrap",
        cache_keys::BANNERS,
        inner.config.ttls.banners,
        banners,
    )
    .await;

    run_match_list_sweep(inner).await;
}

async fn store_tier_result(
    inner: &SchedulerInner, tier: &str, key: &str, ttl: Duration,
    result: ProviderResult<Option<Value>>,
) {
    match result {
        Ok(Some(value)) if !is_empty_payload(&value) => {
            store_payload(inner, tier, key, ttl, &value).await;
        }
        Ok(_) => debug!("{tier}: no content for {key}"),
        Err(err) => warn!("{tier}: refresh of {key} failed: {err}"),
    }
}

async fn store_payload(
    inner: &SchedulerInner, tier: &str, key: &str, ttl: Duration,
    value: &Value,
) {
    if let Err(err) = inner.cache.set(key, value, ttl).await {
        warn!("{tier}: cache write for {key} failed: {err}");
    }
    else {
        debug!("{tier}: refreshed {key}");
    }
}

/// The sports payload is opaque to the cache, but the sweep needs ids
/// out of it. Accepts bare id arrays and the common object spellings.
fn extract_sport_ids(payload: &Value) -> Vec<i64> {
    match payload {
        Value::Array(items) => {
            items.iter().filter_map(sport_id_of).collect()
        }
        Value::Object(fields) => {
            fields
                .get("sports")
                .map(extract_sport_ids)
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn sport_id_of(item: &Value) -> Option<i64> {
    match item {
        Value::Number(id) => id.as_i64(),
        Value::Object(fields) => {
            ["sportId", "sport_id", "id"]
                .iter()
                .find_map(|key| {
                    fields.get(*key).and_then(Value::as_i64)
                })
        }
        _ => None,
    }
}
