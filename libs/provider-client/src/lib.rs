pub mod client;
pub mod config;
pub mod diamond;
pub mod error;
pub mod types;

pub use client::{ProviderClient, ProviderResult};
pub use config::ProviderConfig;
pub use diamond::DiamondProxyClient;
pub use error::ProviderError;
pub use types::PriorityMarketRequest;
