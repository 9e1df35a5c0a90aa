use std::{net::SocketAddr, sync::Arc};

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use cache_store::{
    CacheBackend, CacheConfig, MemoryStore, RedisStore, SwrCache,
    connect_redis,
};
use feeds_http::{FeedHandlers, FeedServices};
use feeds_scheduler::{
    HotKeyRegistry, SchedulerConfig, TieredScheduler,
};
use provider_client::{DiamondProxyClient, ProviderConfig};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cache_config = CacheConfig::from_env();
    let provider_config = ProviderConfig::from_env();
    let scheduler_config = SchedulerConfig::from_env();

    info!("Initializing cache backend...");
    let backend = match (&cache_config.backend_url, cache_config.use_redis())
    {
        (Some(url), true) => {
            let pool = connect_redis(url)
                .map_err(|e| anyhow::anyhow!(e))?;
            info!("External cache backend selected: {url}");
            CacheBackend::Redis(RedisStore::new(pool))
        }
        _ => {
            info!("In-memory cache backend selected");
            CacheBackend::Memory(MemoryStore::new(
                cache_config.effective_stale_multiplier(),
            ))
        }
    };
    let cache = SwrCache::new(Arc::new(backend), cache_config.enable_swr);

    info!(
        "Provider gateway: {} (GET {}ms / POST {}ms)",
        provider_config.base_url,
        provider_config.request_timeout.as_millis(),
        provider_config.post_timeout.as_millis()
    );
    let provider = Arc::new(DiamondProxyClient::new(provider_config)?);

    let registry = HotKeyRegistry::new(
        cache.clone(),
        scheduler_config.hot_ttl,
        scheduler_config.default_sport_id,
    );
    let scheduler = TieredScheduler::new(
        cache.clone(),
        provider.clone(),
        registry.clone(),
        scheduler_config.clone(),
    );
    scheduler.start().await;

    let services = FeedServices {
        cache,
        provider,
        registry,
        scheduler: scheduler.clone(),
        ttls: scheduler_config.ttls,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/feeds",
            FeedHandlers::routes().with_state(services),
        )
        .merge(RapiDoc::new("/api-docs/openapi.json").path("/docs"))
        .route(
            "/api-docs/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(8880);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("🚀 OddsEdge server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining scheduler before exit");
    scheduler.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => warn!("failed to listen for SIGTERM: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        feeds_http::get_sports,
        feeds_http::get_sidebar,
        feeds_http::get_top_events,
        feeds_http::get_banners,
        feeds_http::get_match_list,
        feeds_http::get_match_odds,
        feeds_http::get_match_details,
        feeds_http::get_live_tv,
        feeds_http::get_virtual_tv,
        feeds_http::get_results,
        feeds_http::post_priority_market,
        feeds_http::get_stats,
    ),
    components(
        schemas(
            feeds_models::ApiResponse,
            feeds_http::StatsResponse,
            feeds_http::WorkerSnapshot,
            common_errors::ApiErrorBody,
            provider_client::PriorityMarketRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "feeds", description = "Live sports feed endpoints")
    ),
    info(
        title = "OddsEdge API",
        description = "Real-time sports-data edge cache and fan-out layer",
        version = "1.0.0"
    )
)]
struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check successful", body = String)
    ),
    tag = "health"
)]
async fn health_check() -> impl IntoResponse { (StatusCode::OK, "OK") }
