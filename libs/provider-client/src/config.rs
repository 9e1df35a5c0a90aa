use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Root of the diamond-proxy gateway.
    pub base_url: String,
    /// Deadline for GET calls. Timer-driven polls inherit it.
    pub request_timeout: Duration,
    /// Deadline for POST calls.
    pub post_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: Duration::from_millis(3000),
            post_timeout: Duration::from_millis(5000),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| default_base_url()),
            request_timeout: env_millis(
                "PROVIDER_REQUEST_TIMEOUT_MS",
                3000,
            ),
            post_timeout: env_millis("PROVIDER_POST_TIMEOUT_MS", 5000),
        }
    }
}

fn default_base_url() -> String { "http://127.0.0.1:7000".to_string() }

fn env_millis(name: &str, default: u64) -> Duration {
    let millis = std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}
