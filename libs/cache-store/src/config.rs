/// Cache backend selection and staleness policy, assembled once at
/// startup from the environment.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL. `None` selects the in-memory backend.
    pub backend_url: Option<String>,
    /// `false` forces the in-memory backend even when a URL is set.
    pub enabled: bool,
    /// Stale window relative to the fresh TTL. Memory backend only.
    pub stale_multiplier: u32,
    /// Serve-stale-while-refreshing. Only honored on the memory path;
    /// the Redis backend has no stale concept and degrades to TTL-only.
    pub enable_swr: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            enabled: true,
            stale_multiplier: default_stale_multiplier(),
            enable_swr: true,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            backend_url: std::env::var("CACHE_BACKEND_URL").ok(),
            enabled: env_bool("CACHE_ENABLED", true),
            stale_multiplier: std::env::var("CACHE_STALE_MULTIPLIER")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(default_stale_multiplier)
                .max(1),
            enable_swr: env_bool("CACHE_ENABLE_SWR", true),
        }
    }

    pub fn use_redis(&self) -> bool {
        self.enabled && self.backend_url.is_some()
    }

    /// Effective multiplier for the memory store: with SWR off there is
    /// no point keeping entries readable past their fresh TTL.
    pub fn effective_stale_multiplier(&self) -> u32 {
        if self.enable_swr {
            self.stale_multiplier
        }
        else {
            1
        }
    }
}

fn default_stale_multiplier() -> u32 { 2 }

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|raw| {
            matches!(
                raw.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert!(config.backend_url.is_none());
        assert!(!config.use_redis());
        assert_eq!(config.stale_multiplier, 2);
        assert_eq!(config.effective_stale_multiplier(), 2);
    }

    #[test]
    fn swr_off_collapses_the_stale_window() {
        let config = CacheConfig {
            enable_swr: false,
            ..CacheConfig::default()
        };
        assert_eq!(config.effective_stale_multiplier(), 1);
    }
}
