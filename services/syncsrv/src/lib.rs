//! GridWatch Sync Service
//!
//! Polls the query gateway on fixed-delay schedules, keeps wholesale
//! snapshots of alarms, stations, areas and per-station stats, detects
//! newly raised alarms, and serves the results plus TTL-cached chart
//! history over HTTP.

pub mod api;
pub mod charts;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod payload;
pub mod remote;
pub mod scheduler;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

pub use crate::config::SyncConfig;
pub use crate::error::{Result, SyncError};

use crate::charts::ChartService;
use crate::events::EventHub;
use crate::orchestrator::{SyncKind, SyncOrchestrator};
use crate::remote::QueryClient;
use crate::scheduler::PollScheduler;

/// Shared application state. Cheap to clone; every field is behind an Arc.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SyncConfig>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub scheduler: Arc<PollScheduler>,
    pub charts: Arc<ChartService>,
    pub hub: Arc<EventHub>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wires the service together around the given gateway client. The
    /// client is injected so tests can run the full stack against a
    /// scripted one.
    pub fn new(config: SyncConfig, client: Arc<dyn QueryClient>) -> Self {
        let hub = Arc::new(EventHub::default());
        let charts = Arc::new(ChartService::new(
            client.clone(),
            std::time::Duration::from_secs(config.charts.ttl_secs),
            config.queries.chart_history.clone(),
            config.charts.window_hours,
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            client,
            config.queries.clone(),
            charts.clone(),
            hub.clone(),
        ));
        Self {
            config: Arc::new(config),
            orchestrator,
            scheduler: Arc::new(PollScheduler::new()),
            charts,
            hub,
            started_at: Utc::now(),
        }
    }

    /// Registers and starts one polling task per sync kind, at the
    /// intervals from the configuration.
    pub fn start_sync_tasks(&self) {
        for kind in SyncKind::ALL {
            let interval = self.config.poll.interval_for(kind);
            let orchestrator = self.orchestrator.clone();
            let task = self.scheduler.register(kind.as_str(), interval, move || {
                let orchestrator = orchestrator.clone();
                Box::pin(async move {
                    // a skipped cycle is not a task failure
                    orchestrator.refresh(kind).await?;
                    Ok(())
                })
            });
            self.scheduler.start(&task);
            debug!("sync task for {kind} scheduled every {interval:?}");
        }
    }
}
