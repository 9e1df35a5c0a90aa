pub mod config;
pub mod hot_keys;
pub mod scheduler;
pub mod worker_pool;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{PollIntervals, SchedulerConfig, TierTtls};
pub use hot_keys::HotKeyRegistry;
pub use scheduler::{SchedulerStats, TieredScheduler, WorkerStats};
pub use worker_pool::{OddsJob, OddsWorkerPool, TickComplete};
