//! Request handlers

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use gridwatch_model::{AlarmRecord, Area, ChartSeries, SeriesKey, Station, StationStats};
use tracing::info;

use crate::api::models::{
    ApiError, CacheStatsResponse, HealthResponse, IntervalRequest, IntervalResponse,
    InvalidateResponse, LogLevelRequest, RefreshResponse, SchedulerStatsResponse,
};
use crate::orchestrator::{KindStatus, RefreshOutcome, SyncKind};
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: state.config.service.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

pub async fn sync_status(State(state): State<AppState>) -> Json<Vec<KindStatus>> {
    Json(state.orchestrator.snapshot_overview())
}

pub async fn refresh_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let kind: SyncKind = kind
        .parse()
        .map_err(|_| ApiError::bad_request(format!("unknown sync kind '{kind}'")))?;

    let response = match state.orchestrator.refresh(kind).await? {
        RefreshOutcome::Applied { total, new_items } => RefreshResponse {
            kind,
            outcome: "applied".to_string(),
            total: Some(total),
            new_items: Some(new_items),
        },
        RefreshOutcome::Skipped => RefreshResponse {
            kind,
            outcome: "skipped".to_string(),
            total: None,
            new_items: None,
        },
    };
    Ok(Json(response))
}

pub async fn set_interval(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<IntervalRequest>,
) -> Result<Json<IntervalResponse>, ApiError> {
    let kind: SyncKind = kind
        .parse()
        .map_err(|_| ApiError::bad_request(format!("unknown sync kind '{kind}'")))?;
    if request.secs == 0 {
        return Err(ApiError::bad_request("interval must be at least 1s"));
    }

    let applied = state
        .scheduler
        .set_interval(kind.as_str(), std::time::Duration::from_secs(request.secs));
    if !applied {
        return Err(ApiError::not_found(format!(
            "no polling task registered for '{kind}'"
        )));
    }

    info!("poll interval for {kind} set to {}s via API", request.secs);
    Ok(Json(IntervalResponse {
        kind,
        secs: request.secs,
    }))
}

pub async fn active_alarms(State(state): State<AppState>) -> Json<Vec<AlarmRecord>> {
    Json(state.orchestrator.active_alarms())
}

pub async fn list_stations(State(state): State<AppState>) -> Json<Vec<Station>> {
    Json(state.orchestrator.stations())
}

pub async fn list_areas(State(state): State<AppState>) -> Json<Vec<Area>> {
    Json(state.orchestrator.areas())
}

pub async fn station_stats(State(state): State<AppState>) -> Json<Vec<StationStats>> {
    Json(state.orchestrator.station_stats())
}

pub async fn get_chart(
    State(state): State<AppState>,
    Path((station_id, board_id, sensor_id)): Path<(u32, u32, u32)>,
) -> Result<Json<ChartSeries>, ApiError> {
    let key = SeriesKey::new(station_id, board_id, sensor_id);
    let series = state.charts.series(key).await?;
    Ok(Json((*series).clone()))
}

pub async fn invalidate_chart_cache(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let removed = state.charts.invalidate_all();
    info!("chart cache flushed via API, {removed} entries removed");
    Json(InvalidateResponse { removed })
}

pub async fn invalidate_chart_entry(
    State(state): State<AppState>,
    Path((station_id, board_id, sensor_id)): Path<(u32, u32, u32)>,
) -> Json<InvalidateResponse> {
    let key = SeriesKey::new(station_id, board_id, sensor_id);
    let removed = usize::from(state.charts.invalidate(&key));
    Json(InvalidateResponse { removed })
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.charts.cache_stats();
    Json(CacheStatsResponse {
        entries: state.charts.cache_len(),
        hits: stats.hits,
        misses: stats.misses,
        insertions: stats.insertions,
        evictions: stats.evictions,
        hit_rate: stats.hit_rate(),
    })
}

pub async fn scheduler_stats(State(state): State<AppState>) -> Json<SchedulerStatsResponse> {
    Json(SchedulerStatsResponse {
        tasks: state.scheduler.stats(),
        skipped_refreshes: state.orchestrator.skip_count(),
    })
}

pub async fn set_log_level(
    Json(request): Json<LogLevelRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    common::logging::set_log_level(&request.level).map_err(ApiError::bad_request)?;
    info!("log level set to '{}' via API", request.level);
    Ok(Json(serde_json::json!({ "level": request.level })))
}
