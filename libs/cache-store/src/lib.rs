pub mod backend;
pub mod config;
pub mod memory;
pub mod redis;
pub mod swr;

pub use backend::{CacheBackend, CacheError, CacheResult, Freshness};
pub use config::CacheConfig;
pub use memory::MemoryStore;
pub use redis::{RedisStore, connect_redis};
pub use swr::SwrCache;
