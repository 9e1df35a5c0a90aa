use std::time::Duration;

/// Cadence of each refresh tier.
#[derive(Debug, Clone)]
pub struct PollIntervals {
    pub odds: Duration,
    pub match_list: Duration,
    pub top_events: Duration,
    pub banners: Duration,
    pub sidebar: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            odds: Duration::from_millis(1000),
            match_list: Duration::from_secs(60),
            top_events: Duration::from_secs(3600),
            banners: Duration::from_secs(3600),
            sidebar: Duration::from_secs(86_400),
        }
    }
}

/// Fresh TTL written with each tier's cache entries.
#[derive(Debug, Clone)]
pub struct TierTtls {
    pub sports: Duration,
    pub match_list: Duration,
    pub odds: Duration,
    pub on_demand: Duration,
    pub results: Duration,
    pub sidebar: Duration,
    pub top_events: Duration,
    pub banners: Duration,
}

impl Default for TierTtls {
    fn default() -> Self {
        Self {
            sports: Duration::from_secs(86_400),
            match_list: Duration::from_secs(120),
            odds: Duration::from_secs(2),
            on_demand: Duration::from_secs(86_400),
            results: Duration::from_secs(3600),
            sidebar: Duration::from_secs(172_800),
            top_events: Duration::from_secs(7200),
            banners: Duration::from_secs(7200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_intervals: PollIntervals,
    pub ttls: TierTtls,
    /// Hot-key aging window.
    pub hot_ttl: Duration,
    /// Worker pool concurrency cap.
    pub max_concurrency: usize,
    /// Sport id assumed for legacy hot records without metadata.
    pub default_sport_id: i64,
    /// How long `stop()` waits for loops before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_intervals: PollIntervals::default(),
            ttls: TierTtls::default(),
            hot_ttl: Duration::from_secs(30),
            max_concurrency: 5,
            default_sport_id: 4,
            shutdown_grace: Duration::from_millis(3000),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_intervals: PollIntervals {
                odds: env_millis("POLL_INTERVAL_ODDS_MS", 1000),
                match_list: env_millis(
                    "POLL_INTERVAL_MATCH_LIST_MS",
                    60_000,
                ),
                top_events: env_millis(
                    "POLL_INTERVAL_TOP_EVENTS_MS",
                    3_600_000,
                ),
                banners: env_millis(
                    "POLL_INTERVAL_BANNERS_MS",
                    3_600_000,
                ),
                sidebar: env_millis(
                    "POLL_INTERVAL_SIDEBAR_MS",
                    86_400_000,
                ),
            },
            ttls: defaults.ttls,
            hot_ttl: env_secs("ODDS_HOT_TTL_SECS", 30),
            max_concurrency: std::env::var("MAX_CONCURRENCY")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(5),
            default_sport_id: std::env::var("DEFAULT_SPORT_ID")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(4),
            shutdown_grace: env_millis(
                "PROVIDER_REQUEST_TIMEOUT_MS",
                3000,
            ),
        }
    }
}

fn env_millis(name: &str, default: u64) -> Duration {
    let millis = std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}

fn env_secs(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
