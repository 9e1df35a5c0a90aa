use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use cache_store::{CacheError, SwrCache};
use coalesce::CoalesceError;
use common_errors::AppError;
use feeds_models::{ApiResponse, cache_keys, is_empty_payload};
use feeds_scheduler::{HotKeyRegistry, TierTtls, TieredScheduler};
use provider_client::{
    PriorityMarketRequest, ProviderClient, ProviderError,
    ProviderResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

/// Everything a feed handler needs, assembled once at startup.
#[derive(Clone)]
pub struct FeedServices {
    pub cache: SwrCache,
    pub provider: Arc<dyn ProviderClient>,
    pub registry: HotKeyRegistry,
    pub scheduler: TieredScheduler,
    pub ttls: TierTtls,
}

pub struct FeedHandlers;

impl FeedHandlers {
    pub fn routes() -> Router<FeedServices> {
        Router::new()
            .route("/sports", get(get_sports))
            .route("/sidebar", get(get_sidebar))
            .route("/top-events", get(get_top_events))
            .route("/banners", get(get_banners))
            .route("/matches/{sport_id}", get(get_match_list))
            .route("/odds/{match_id}", get(get_match_odds))
            .route(
                "/details/{sport_id}/{match_id}",
                get(get_match_details),
            )
            .route("/tv/{match_id}", get(get_live_tv))
            .route("/vtv/{match_id}", get(get_virtual_tv))
            .route(
                "/results/{sport_id}/{match_id}",
                get(get_results),
            )
            .route("/priority-market", post(post_priority_market))
            .route("/stats", get(crate::stats::get_stats))
    }
}

fn cache_error(err: CacheError) -> AppError {
    match err {
        CacheError::Refresh(message) => AppError::upstream(message),
        other => AppError::internal(other.to_string()),
    }
}

fn provider_error(err: ProviderError) -> AppError {
    AppError::upstream(err.to_string())
}

/// Read-from-cache template: serve the cached payload, otherwise fetch,
/// cache when non-empty, and serve whatever came back.
async fn read_through(
    services: &FeedServices, key: &str, ttl: Duration,
    fetch: impl Future<Output = ProviderResult<Option<Value>>>,
) -> Result<Json<ApiResponse>, AppError> {
    if let Some(value) =
        services.cache.get(key).await.map_err(cache_error)?
    {
        return Ok(Json(ApiResponse::ok(value)));
    }

    match fetch.await.map_err(provider_error)? {
        Some(value) => {
            if !is_empty_payload(&value) {
                services
                    .cache
                    .set(key, &value, ttl)
                    .await
                    .map_err(cache_error)?;
            }
            Ok(Json(ApiResponse::ok(value)))
        }
        None => Ok(Json(ApiResponse::empty())),
    }
}

/// On-demand template: cached once per id, a missing entity is a 404.
async fn on_demand(
    services: &FeedServices, key: &str, ttl: Duration,
    fetch: impl Future<Output = ProviderResult<Option<Value>>>,
) -> Result<Json<ApiResponse>, AppError> {
    if let Some(value) =
        services.cache.get(key).await.map_err(cache_error)?
    {
        return Ok(Json(ApiResponse::ok(value)));
    }

    match fetch.await.map_err(provider_error)? {
        Some(value) => {
            services
                .cache
                .set(key, &value, ttl)
                .await
                .map_err(cache_error)?;
            Ok(Json(ApiResponse::ok(value)))
        }
        None => Err(AppError::not_found("no such match")),
    }
}

async fn mark_hot(
    services: &FeedServices, match_id: &str, sport_id: i64,
) {
    if let Err(err) = services.registry.mark(match_id, sport_id).await
    {
        warn!("failed to mark {match_id} hot: {err}");
    }
}

#[utoipa::path(
    get,
    path = "/api/feeds/sports",
    responses((status = 200, description = "All sports", body = ApiResponse)),
    tag = "feeds"
)]
#[instrument(skip_all)]
pub async fn get_sports(
    State(services): State<FeedServices>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    read_through(
        &services,
        cache_keys::SPORTS,
        services.ttls.sports,
        async move { provider.get_all_sports().await },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/feeds/sidebar",
    responses((status = 200, description = "Sidebar tree", body = ApiResponse)),
    tag = "feeds"
)]
#[instrument(skip_all)]
pub async fn get_sidebar(
    State(services): State<FeedServices>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    read_through(
        &services,
        cache_keys::SIDEBAR,
        services.ttls.sidebar,
        async move { provider.get_sidebar_tree().await },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/feeds/top-events",
    responses((status = 200, description = "Top events", body = ApiResponse)),
    tag = "feeds"
)]
#[instrument(skip_all)]
pub async fn get_top_events(
    State(services): State<FeedServices>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    read_through(
        &services,
        cache_keys::TOP_EVENTS,
        services.ttls.top_events,
        async move { provider.get_top_events().await },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/feeds/banners",
    responses((status = 200, description = "Banners", body = ApiResponse)),
    tag = "feeds"
)]
#[instrument(skip_all)]
pub async fn get_banners(
    State(services): State<FeedServices>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    read_through(
        &services,
        cache_keys::BANNERS,
        services.ttls.banners,
        async move { provider.get_banners().await },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/feeds/matches/{sport_id}",
    params(("sport_id" = i64, Path, description = "Sport id")),
    responses((status = 200, description = "Match list", body = ApiResponse)),
    tag = "feeds"
)]
#[instrument(skip_all, fields(sport_id))]
pub async fn get_match_list(
    State(services): State<FeedServices>, Path(sport_id): Path<i64>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    read_through(
        &services,
        &cache_keys::match_list(sport_id),
        services.ttls.match_list,
        async move { provider.get_match_list(sport_id).await },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct OddsParams {
    sport_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/feeds/odds/{match_id}",
    params(
        ("match_id" = String, Path, description = "Match id"),
        ("sport_id" = i64, Query, description = "Sport id"),
    ),
    responses(
        (status = 200, description = "Match odds", body = ApiResponse),
        (status = 400, description = "Missing sport_id"),
    ),
    tag = "feeds"
)]
#[instrument(skip_all, fields(match_id))]
pub async fn get_match_odds(
    State(services): State<FeedServices>,
    Path(match_id): Path<String>, Query(params): Query<OddsParams>,
) -> Result<Json<ApiResponse>, AppError> {
    let sport_id = params
        .sport_id
        .ok_or_else(|| AppError::validation("missing sport_id"))?;

    let key = cache_keys::odds(&match_id);
    if let Some(value) =
        services.cache.get(&key).await.map_err(cache_error)?
    {
        mark_hot(&services, &match_id, sport_id).await;
        return Ok(Json(ApiResponse::ok(value)));
    }

    let provider = services.provider.clone();
    let fetch_id = match_id.clone();
    let fetched = services
        .cache
        .get_or_set(&key, services.ttls.odds, move || {
            async move {
                provider
                    .get_match_odds(&fetch_id, sport_id)
                    .await
                    .map_err(|e| CoalesceError::Fetch(e.to_string()))
            }
        })
        .await
        .map_err(cache_error)?;

    mark_hot(&services, &match_id, sport_id).await;
    match fetched {
        Some(value) => Ok(Json(ApiResponse::ok(value))),
        None => Ok(Json(ApiResponse::empty())),
    }
}

#[utoipa::path(
    get,
    path = "/api/feeds/details/{sport_id}/{match_id}",
    params(
        ("sport_id" = i64, Path, description = "Sport id"),
        ("match_id" = String, Path, description = "Match id"),
    ),
    responses(
        (status = 200, description = "Match details", body = ApiResponse),
        (status = 404, description = "No such match"),
    ),
    tag = "feeds"
)]
#[instrument(skip_all, fields(match_id))]
pub async fn get_match_details(
    State(services): State<FeedServices>,
    Path((sport_id, match_id)): Path<(i64, String)>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    let fetch_id = match_id.clone();
    on_demand(
        &services,
        &cache_keys::details(&match_id),
        services.ttls.on_demand,
        async move {
            provider.get_match_details(sport_id, &fetch_id).await
        },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/feeds/tv/{match_id}",
    params(
        ("match_id" = String, Path, description = "Match id"),
        ("sport_id" = i64, Query, description = "Sport id"),
    ),
    responses(
        (status = 200, description = "Live TV score", body = ApiResponse),
        (status = 404, description = "No such match"),
    ),
    tag = "feeds"
)]
#[instrument(skip_all, fields(match_id))]
pub async fn get_live_tv(
    State(services): State<FeedServices>,
    Path(match_id): Path<String>, Query(params): Query<OddsParams>,
) -> Result<Json<ApiResponse>, AppError> {
    let sport_id = params
        .sport_id
        .ok_or_else(|| AppError::validation("missing sport_id"))?;
    let provider = services.provider.clone();
    let fetch_id = match_id.clone();
    on_demand(
        &services,
        &cache_keys::tv(&match_id),
        services.ttls.on_demand,
        async move {
            provider.get_live_tv_score(&fetch_id, sport_id).await
        },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/feeds/vtv/{match_id}",
    params(("match_id" = String, Path, description = "Match id")),
    responses(
        (status = 200, description = "Virtual TV", body = ApiResponse),
        (status = 404, description = "No such match"),
    ),
    tag = "feeds"
)]
#[instrument(skip_all, fields(match_id))]
pub async fn get_virtual_tv(
    State(services): State<FeedServices>,
    Path(match_id): Path<String>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    let fetch_id = match_id.clone();
    on_demand(
        &services,
        &cache_keys::vtv(&match_id),
        services.ttls.on_demand,
        async move { provider.get_virtual_tv(&fetch_id).await },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/feeds/results/{sport_id}/{match_id}",
    params(
        ("sport_id" = i64, Path, description = "Sport id"),
        ("match_id" = String, Path, description = "Match id"),
    ),
    responses(
        (status = 200, description = "Match results", body = ApiResponse),
        (status = 404, description = "No such match"),
    ),
    tag = "feeds"
)]
#[instrument(skip_all, fields(match_id))]
pub async fn get_results(
    State(services): State<FeedServices>,
    Path((sport_id, match_id)): Path<(i64, String)>,
) -> Result<Json<ApiResponse>, AppError> {
    let provider = services.provider.clone();
    let fetch_id = match_id.clone();
    on_demand(
        &services,
        &cache_keys::results(sport_id, &match_id),
        services.ttls.results,
        async move {
            provider.get_results(sport_id, &fetch_id).await
        },
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/feeds/priority-market",
    request_body = PriorityMarketRequest,
    responses((status = 200, description = "Gateway response", body = ApiResponse)),
    tag = "feeds"
)]
#[instrument(skip_all)]
pub async fn post_priority_market(
    State(services): State<FeedServices>,
    Json(payload): Json<PriorityMarketRequest>,
) -> Result<Json<ApiResponse>, AppError> {
    // Pass-through: no cache read, no cache write.
    let result = services
        .provider
        .post_priority_market(payload)
        .await
        .map_err(provider_error)?;
    Ok(Json(ApiResponse::ok(result)))
}
