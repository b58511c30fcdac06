//! API request and response types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::SyncError;
use crate::orchestrator::SyncKind;
use crate::scheduler::TaskStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: String,
    pub version: String,
    pub status: String,
    pub uptime_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub kind: SyncKind,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_items: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub secs: u64,
}

#[derive(Debug, Serialize)]
pub struct IntervalResponse {
    pub kind: SyncKind,
    pub secs: u64,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct SchedulerStatsResponse {
    pub tasks: Vec<TaskStats>,
    pub skipped_refreshes: u64,
}

#[derive(Debug, Deserialize)]
pub struct LogLevelRequest {
    pub level: String,
}

/// API-facing error: a status code and a message body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status = match err {
            // upstream trouble, not ours
            SyncError::Transport(_) | SyncError::Parse(_) => StatusCode::BAD_GATEWAY,
            SyncError::Validation(_) => StatusCode::BAD_REQUEST,
            SyncError::Config(_) | SyncError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_status_mapping() {
        let api: ApiError = SyncError::Transport("timeout".into()).into();
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);

        let api: ApiError = SyncError::Validation("unknown sync kind".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_refresh_response_omits_absent_counts() {
        let response = RefreshResponse {
            kind: SyncKind::Stats,
            outcome: "skipped".into(),
            total: None,
            new_items: None,
        };
        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("total").is_none());
        assert_eq!(body["outcome"], "skipped");
    }
}
