//! API integration tests

#![allow(clippy::disallowed_methods)] // Integration test - unwrap is acceptable

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use common::*;
use syncsrv::api::create_router;
use syncsrv::orchestrator::SyncKind;

/// Helper to make JSON requests
async fn json_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = if let Some(json) = body {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let body: Value = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    let (status, body) = json_request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "syncsrv");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_sync_status_lists_all_kinds_idle() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    let (status, body) = json_request(&app, "GET", "/api/v1/sync/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds = body.as_array().unwrap();
    assert_eq!(kinds.len(), 4);
    for kind in kinds {
        assert_eq!(kind["state"], "idle");
        assert_eq!(kind["count"], 0);
        assert!(kind["taken_at"].is_null());
    }
}

#[tokio::test]
async fn test_refresh_endpoint_applies_snapshot() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    env.mock.queue_payload(
        &env.query(SyncKind::ActiveAlarms),
        payload(&[alarm_row(1, 10, 5), alarm_row(2, 11, 7)]),
    );

    let (status, body) =
        json_request(&app, "POST", "/api/v1/sync/active_alarms/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["total"], 2);
    assert_eq!(body["new_items"], 0);

    let (status, body) = json_request(&app, "GET", "/api/v1/alarms/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["id"], 1);
}

#[tokio::test]
async fn test_refresh_unknown_kind_is_rejected() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    let (status, body) = json_request(&app, "POST", "/api/v1/sync/bogus/refresh", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn test_refresh_surfaces_gateway_failure() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    env.mock
        .queue_transport_error(&env.query(SyncKind::Stats), "connection refused");
    let (status, body) = json_request(&app, "POST", "/api/v1/sync/stats/refresh", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_set_interval_requires_registered_task() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    // no polling tasks started in this test
    let (status, _) = json_request(
        &app,
        "PUT",
        "/api/v1/sync/stats/interval",
        Some(json!({ "secs": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_interval_applies_to_running_task() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    env.mock.set_sticky_payload(&env.query(SyncKind::Stats), "[]");
    env.mock
        .set_sticky_payload(&env.query(SyncKind::ActiveAlarms), "[]");
    env.mock
        .set_sticky_payload(&env.query(SyncKind::Stations), "[]");
    env.mock.set_sticky_payload(&env.query(SyncKind::Areas), "[]");
    env.state.start_sync_tasks();

    let (status, body) = json_request(
        &app,
        "PUT",
        "/api/v1/sync/stats/interval",
        Some(json!({ "secs": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["secs"], 120);

    let (status, body) = json_request(&app, "GET", "/api/v1/stats/scheduler", None).await;
    assert_eq!(status, StatusCode::OK);
    let stats_task = body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|task| task["name"] == "stats")
        .unwrap()
        .clone();
    assert_eq!(stats_task["interval_ms"], 120_000);

    env.state.scheduler.stop_all().await;
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    let (status, _) = json_request(
        &app,
        "PUT",
        "/api/v1/sync/areas/interval",
        Some(json!({ "secs": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chart_endpoint_fetches_and_caches() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    let now = chrono::Utc::now().timestamp_millis();
    env.mock.queue_payload(
        &env.chart_query(7, 1, 3),
        payload(&[
            chart_row(now - 60_000, Some(20.5)),
            chart_row(now - 30_000, None),
            chart_row(now, Some(21.0)),
        ]),
    );

    let (status, body) = json_request(&app, "GET", "/api/v1/charts/7/1/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"]["station_id"], 7);
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[0]["reading"]["status"], "valid");
    assert_eq!(points[1]["reading"]["status"], "anomalous");
    assert_eq!(body["min"], 20.5);
    assert_eq!(body["max"], 21.0);

    // second request is served from cache, no new gateway call
    let (status, _) = json_request(&app, "GET", "/api/v1/charts/7/1/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.mock.call_count(), 1);

    let (status, body) = json_request(&app, "GET", "/api/v1/stats/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"], 1);
    assert_eq!(body["hits"], 1);
    assert_eq!(body["misses"], 1);
}

#[tokio::test]
async fn test_chart_cache_invalidation_endpoints() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    env.mock
        .set_sticky_payload(&env.chart_query(1, 1, 1), "[]");
    env.mock
        .set_sticky_payload(&env.chart_query(2, 1, 1), "[]");
    json_request(&app, "GET", "/api/v1/charts/1/1/1", None).await;
    json_request(&app, "GET", "/api/v1/charts/2/1/1", None).await;

    let (status, body) = json_request(&app, "DELETE", "/api/v1/cache/charts/1/1/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, body) = json_request(&app, "DELETE", "/api/v1/cache/charts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, body) = json_request(&app, "DELETE", "/api/v1/cache/charts/9/9/9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
}

#[tokio::test]
async fn test_station_and_area_listings() {
    let env = TestEnv::create();
    let app = create_router(env.state.clone());

    env.mock.queue_payload(
        &env.query(SyncKind::Stations),
        payload(&[station_row(1, "Riverside Substation", 1)]),
    );
    env.mock
        .queue_payload(&env.query(SyncKind::Areas), payload(&[area_row(1, "North Grid")]));
    json_request(&app, "POST", "/api/v1/sync/stations/refresh", None).await;
    json_request(&app, "POST", "/api/v1/sync/areas/refresh", None).await;

    let (status, body) = json_request(&app, "GET", "/api/v1/stations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Riverside Substation");

    let (status, body) = json_request(&app, "GET", "/api/v1/areas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "North Grid");
}
