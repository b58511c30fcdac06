//! Route definitions

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/sync/status", get(handlers::sync_status))
        .route("/api/v1/sync/{kind}/refresh", post(handlers::refresh_kind))
        .route("/api/v1/sync/{kind}/interval", put(handlers::set_interval))
        .route("/api/v1/alarms/active", get(handlers::active_alarms))
        .route("/api/v1/stations", get(handlers::list_stations))
        .route("/api/v1/areas", get(handlers::list_areas))
        .route("/api/v1/stats", get(handlers::station_stats))
        .route(
            "/api/v1/charts/{station_id}/{board_id}/{sensor_id}",
            get(handlers::get_chart),
        )
        .route(
            "/api/v1/cache/charts",
            delete(handlers::invalidate_chart_cache),
        )
        .route(
            "/api/v1/cache/charts/{station_id}/{board_id}/{sensor_id}",
            delete(handlers::invalidate_chart_entry),
        )
        .route("/api/v1/stats/cache", get(handlers::cache_stats))
        .route("/api/v1/stats/scheduler", get(handlers::scheduler_stats))
        .route("/api/v1/logging/level", put(handlers::set_log_level))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
