//! Shared test scaffolding and utilities
//!
//! Provides a scripted gateway client, sample row builders, and a fully
//! wired application state for end-to-end sync tests.

#![allow(clippy::disallowed_methods)] // Integration test - unwrap is acceptable
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use syncsrv::error::{Result, SyncError};
use syncsrv::remote::QueryClient;
use syncsrv::{AppState, SyncConfig};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Payload(String),
    TransportError(String),
}

#[derive(Default)]
struct MockInner {
    /// Replies queued per query text, consumed front to back
    queued: HashMap<String, VecDeque<MockReply>>,
    /// Fallback reply per query text, served when the queue is empty
    sticky: HashMap<String, MockReply>,
    /// Every query received, in order
    calls: Vec<String>,
    /// Artificial latency before answering
    delay: Option<Duration>,
}

/// Gateway client with scripted responses.
///
/// Queries are matched by their full text, which the default configuration
/// keeps distinct per sync kind. An unscripted query fails with a transport
/// error so a test never silently syncs an empty payload.
#[derive(Default)]
pub struct MockQueryClient {
    inner: Mutex<MockInner>,
}

impl MockQueryClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a one-shot payload for the given query.
    pub fn queue_payload(&self, query: &str, payload: impl Into<String>) {
        self.inner
            .lock()
            .queued
            .entry(query.to_string())
            .or_default()
            .push_back(MockReply::Payload(payload.into()));
    }

    /// Queues a one-shot transport failure for the given query.
    pub fn queue_transport_error(&self, query: &str, message: impl Into<String>) {
        self.inner
            .lock()
            .queued
            .entry(query.to_string())
            .or_default()
            .push_back(MockReply::TransportError(message.into()));
    }

    /// Sets the reply served whenever no queued reply is left.
    pub fn set_sticky_payload(&self, query: &str, payload: impl Into<String>) {
        self.inner
            .lock()
            .sticky
            .insert(query.to_string(), MockReply::Payload(payload.into()));
    }

    /// Every execute call delays this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn calls_for(&self, query: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.as_str() == query)
            .count()
    }
}

#[async_trait]
impl QueryClient for MockQueryClient {
    async fn execute(&self, query: &str) -> Result<String> {
        let delay = self.inner.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut inner = self.inner.lock();
            inner.calls.push(query.to_string());
            inner
                .queued
                .get_mut(query)
                .and_then(|queue| queue.pop_front())
                .or_else(|| inner.sticky.get(query).cloned())
        };

        match reply {
            Some(MockReply::Payload(payload)) => Ok(payload),
            Some(MockReply::TransportError(message)) => Err(SyncError::Transport(message)),
            None => Err(SyncError::Transport(format!(
                "no scripted reply for query: {query}"
            ))),
        }
    }
}

/// Test environment: scripted gateway plus fully wired state.
pub struct TestEnv {
    pub mock: Arc<MockQueryClient>,
    pub state: AppState,
    pub config: SyncConfig,
}

impl TestEnv {
    pub fn create() -> Self {
        let config = SyncConfig::default();
        let mock = MockQueryClient::new();
        let state = AppState::new(config.clone(), mock.clone());
        Self {
            mock,
            state,
            config,
        }
    }

    /// Query text for a sync kind, for scripting replies.
    pub fn query(&self, kind: syncsrv::orchestrator::SyncKind) -> String {
        self.config.queries.query_for(kind).to_string()
    }

    /// Chart history query as rendered for one sensor.
    pub fn chart_query(&self, station_id: u32, board_id: u32, sensor_id: u32) -> String {
        self.config
            .queries
            .chart_history
            .replace("{station_id}", &station_id.to_string())
            .replace("{board_id}", &board_id.to_string())
            .replace("{sensor_id}", &sensor_id.to_string())
    }
}

/// Collects everything currently sitting in an event receiver.
pub fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<syncsrv::events::SyncEvent>,
) -> Vec<syncsrv::events::SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---- sample row builders ----

pub fn alarm_row(id: u64, station_id: u32, sensor_id: u32) -> Value {
    json!({
        "alarm_id": id,
        "station_id": station_id,
        "area_id": 1,
        "area_name": "North Grid",
        "sensor_id": sensor_id,
        "raised_at": 1_700_000_000_000u64 + id * 1000,
        "severity": 2,
        "value": 118.4,
        "warn_limit": 100.0,
        "crit_limit": 115.0,
        "cleared": 0,
        "cleared_at": null
    })
}

pub fn station_row(id: u32, name: &str, area_id: u32) -> Value {
    json!({
        "station_id": id,
        "station_name": name,
        "area_id": area_id
    })
}

pub fn area_row(id: u32, name: &str) -> Value {
    json!({
        "area_id": id,
        "area_name": name
    })
}

pub fn stats_row(station_id: u32, name: &str, total: u32, online: u32, alarms: u32) -> Value {
    json!({
        "station_id": station_id,
        "station_name": name,
        "sensors_total": total,
        "sensors_online": online,
        "active_alarms": alarms
    })
}

pub fn chart_row(ts_millis: i64, value: Option<f64>) -> Value {
    match value {
        Some(v) => json!({ "ts": ts_millis, "value": v }),
        None => json!({ "ts": ts_millis, "value": null }),
    }
}

/// Serializes rows the way the gateway sends them.
pub fn payload(rows: &[Value]) -> String {
    serde_json::to_string(&Value::Array(rows.to_vec())).unwrap()
}
