use async_trait::async_trait;
use serde_json::Value;

use crate::{error::ProviderError, types::PriorityMarketRequest};

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Typed surface of the upstream gateway. `Ok(None)` means the provider
/// responded but had no content for the query; that is not an error and
/// never overwrites a cache entry.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn get_all_sports(&self) -> ProviderResult<Option<Value>>;

    async fn get_match_list(
        &self, sport_id: i64,
    ) -> ProviderResult<Option<Value>>;

    async fn get_match_odds(
        &self, match_id: &str, sport_id: i64,
    ) -> ProviderResult<Option<Value>>;

    async fn get_match_details(
        &self, sport_id: i64, match_id: &str,
    ) -> ProviderResult<Option<Value>>;

    async fn get_live_tv_score(
        &self, match_id: &str, sport_id: i64,
    ) -> ProviderResult<Option<Value>>;

    async fn get_virtual_tv(
        &self, match_id: &str,
    ) -> ProviderResult<Option<Value>>;

    async fn get_results(
        &self, sport_id: i64, match_id: &str,
    ) -> ProviderResult<Option<Value>>;

    async fn get_sidebar_tree(&self) -> ProviderResult<Option<Value>>;

    async fn get_top_events(&self) -> ProviderResult<Option<Value>>;

    async fn get_banners(&self) -> ProviderResult<Option<Value>>;

    async fn post_priority_market(
        &self, payload: PriorityMarketRequest,
    ) -> ProviderResult<Value>;
}
