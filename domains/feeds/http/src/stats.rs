use axum::{extract::State, response::Json};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::handlers::FeedServices;

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkerSnapshot {
    pub active: usize,
    pub queued: usize,
    pub processing: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub started: bool,
    pub odds_polling_active: bool,
    pub ticks_skipped: u64,
    pub coalescer_active: usize,
    pub worker: WorkerSnapshot,
    pub hot_keys: Vec<String>,
    pub hot_key_count: usize,
}

#[utoipa::path(
    get,
    path = "/api/feeds/stats",
    responses(
        (status = 200, description = "Scheduler health", body = StatsResponse)
    ),
    tag = "feeds"
)]
#[instrument(skip_all)]
pub async fn get_stats(
    State(services): State<FeedServices>,
) -> Json<StatsResponse> {
    let stats = services.scheduler.stats().await;
    Json(StatsResponse {
        started: stats.started,
        odds_polling_active: stats.odds_polling_active,
        ticks_skipped: stats.ticks_skipped,
        coalescer_active: stats.coalescer_active,
        worker: WorkerSnapshot {
            active: stats.worker.active,
            queued: stats.worker.queued,
            processing: stats.worker.processing,
        },
        hot_keys: stats.hot_keys,
        hot_key_count: stats.hot_key_count,
    })
}
