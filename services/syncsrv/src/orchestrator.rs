//! Sync orchestration
//!
//! One refresh cycle per data kind: fetch from the gateway, decode,
//! replace the snapshot wholesale, then publish what changed. A cycle
//! that fails leaves the previous snapshot in place. Concurrent refreshes
//! of the same kind collapse to one: the late caller is skipped, not
//! queued.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gridwatch_cache::{diff, Snapshot, SnapshotCell};
use gridwatch_model::{
    AlarmRecord, Area, ResolvedAlarm, RowError, Station, StationStats,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::charts::ChartService;
use crate::config::QuerySection;
use crate::error::{Result, SyncError};
use crate::events::{EventHub, SyncEvent};
use crate::payload::{self, ParsedBatch};
use crate::remote::QueryClient;

/// The four data kinds kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    ActiveAlarms,
    Stats,
    Stations,
    Areas,
}

impl SyncKind {
    pub const ALL: [SyncKind; 4] = [
        SyncKind::ActiveAlarms,
        SyncKind::Stats,
        SyncKind::Stations,
        SyncKind::Areas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::ActiveAlarms => "active_alarms",
            SyncKind::Stats => "stats",
            SyncKind::Stations => "stations",
            SyncKind::Areas => "areas",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active_alarms" => Ok(SyncKind::ActiveAlarms),
            "stats" => Ok(SyncKind::Stats),
            "stations" => Ok(SyncKind::Stations),
            "areas" => Ok(SyncKind::Areas),
            other => Err(SyncError::Validation(format!("unknown sync kind '{other}'"))),
        }
    }
}

/// Per-kind cycle state, visible through the status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Fetching,
    Applying,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Applying => "applying",
            SyncState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a refresh call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Snapshot replaced. `new_items` is nonzero only for active alarms.
    Applied { total: usize, new_items: usize },
    /// Another refresh of the same kind was already in flight.
    Skipped,
}

/// Restores a kind to idle when the cycle ends, whichever way it ends.
struct CycleGuard<'a> {
    states: &'a DashMap<SyncKind, SyncState>,
    kind: SyncKind,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.states.insert(self.kind, SyncState::Idle);
    }
}

pub struct SyncOrchestrator {
    client: Arc<dyn QueryClient>,
    queries: QuerySection,
    alarms: SnapshotCell<AlarmRecord>,
    stats: SnapshotCell<StationStats>,
    stations: SnapshotCell<Station>,
    areas: SnapshotCell<Area>,
    station_names: DashMap<u32, String>,
    area_names: DashMap<u32, String>,
    charts: Arc<ChartService>,
    hub: Arc<EventHub>,
    states: DashMap<SyncKind, SyncState>,
    skips: AtomicU64,
}

impl SyncOrchestrator {
    pub fn new(
        client: Arc<dyn QueryClient>,
        queries: QuerySection,
        charts: Arc<ChartService>,
        hub: Arc<EventHub>,
    ) -> Self {
        let states = DashMap::new();
        for kind in SyncKind::ALL {
            states.insert(kind, SyncState::Idle);
        }
        Self {
            client,
            queries,
            alarms: SnapshotCell::new(),
            stats: SnapshotCell::new(),
            stations: SnapshotCell::new(),
            areas: SnapshotCell::new(),
            station_names: DashMap::new(),
            area_names: DashMap::new(),
            charts,
            hub,
            states,
            skips: AtomicU64::new(0),
        }
    }

    /// Runs one sync cycle for `kind`. Returns [`RefreshOutcome::Skipped`]
    /// without touching the gateway when a cycle for the same kind is
    /// already running.
    pub async fn refresh(&self, kind: SyncKind) -> Result<RefreshOutcome> {
        {
            // check-and-set under the entry lock so two callers cannot
            // both observe idle
            let mut entry = self.states.entry(kind).or_insert(SyncState::Idle);
            match *entry {
                SyncState::Fetching | SyncState::Applying => {
                    drop(entry);
                    self.skips.fetch_add(1, Ordering::Relaxed);
                    debug!("refresh of {kind} skipped, cycle already in flight");
                    return Ok(RefreshOutcome::Skipped);
                }
                SyncState::Idle | SyncState::Failed => {
                    *entry = SyncState::Fetching;
                }
            }
        }
        let _guard = CycleGuard {
            states: &self.states,
            kind,
        };

        match self.run_cycle(kind).await {
            Ok(outcome) => {
                if let RefreshOutcome::Applied { total, new_items } = outcome {
                    debug!("{kind} synced, {total} records ({new_items} new)");
                }
                Ok(outcome)
            }
            Err(e) => {
                self.states.insert(kind, SyncState::Failed);
                if e.log_level() == tracing::Level::ERROR {
                    error!("sync of {kind} failed: {e}");
                } else {
                    warn!("sync of {kind} failed: {e}");
                }
                self.hub.publish(SyncEvent::SyncFailed {
                    kind,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, kind: SyncKind) -> Result<RefreshOutcome> {
        let query = self.queries.query_for(kind);
        let body = self.client.execute(query).await?;

        self.states.insert(kind, SyncState::Applying);
        let rows = payload::parse_rows(&body)?;
        let taken_at = Utc::now();

        match kind {
            SyncKind::ActiveAlarms => self.apply_alarms(&rows, taken_at),
            SyncKind::Stats => {
                let batch = decode_batch(&rows, StationStats::from_row, "stats")?;
                Ok(self.apply_plain(kind, &self.stats, batch, taken_at))
            }
            SyncKind::Stations => {
                let batch = decode_batch(&rows, Station::from_row, "station")?;
                let outcome = self.apply_plain(kind, &self.stations, batch, taken_at);
                self.rebuild_station_names();
                Ok(outcome)
            }
            SyncKind::Areas => {
                let batch = decode_batch(&rows, Area::from_row, "area")?;
                let outcome = self.apply_plain(kind, &self.areas, batch, taken_at);
                self.rebuild_area_names();
                Ok(outcome)
            }
        }
    }

    /// Replaces a non-alarm snapshot and announces the change.
    fn apply_plain<T: Clone>(
        &self,
        kind: SyncKind,
        cell: &SnapshotCell<T>,
        batch: ParsedBatch<T>,
        taken_at: DateTime<Utc>,
    ) -> RefreshOutcome {
        let total = batch.records.len();
        cell.replace(batch.records, taken_at);
        self.hub.publish(SyncEvent::SnapshotChanged {
            kind,
            count: total,
            taken_at,
        });
        RefreshOutcome::Applied {
            total,
            new_items: 0,
        }
    }

    /// Alarm cycle: replace the snapshot, diff against the displaced one
    /// by alarm id, and on new alarms flush the chart cache and publish
    /// the resolved notification batch.
    fn apply_alarms(&self, rows: &[Value], taken_at: DateTime<Utc>) -> Result<RefreshOutcome> {
        let batch = decode_batch(rows, AlarmRecord::from_row, "alarm")?;
        let total = batch.records.len();

        let displaced = self.alarms.replace(batch.records, taken_at);
        let current = match self.alarms.current() {
            Some(snapshot) => snapshot,
            // unreachable after replace, but never panic in the sync path
            None => return Ok(RefreshOutcome::Applied { total, new_items: 0 }),
        };

        self.hub.publish(SyncEvent::AlarmsChanged {
            snapshot: current.clone(),
        });

        let fresh = diff::new_by_key(displaced.as_deref(), &current, |alarm| alarm.id);
        let new_items = fresh.len();
        if new_items > 0 {
            let flushed = self.charts.invalidate_all();
            info!(
                "{new_items} new alarms detected, {flushed} chart cache entries flushed"
            );
            let resolved: Vec<ResolvedAlarm> =
                fresh.iter().map(|alarm| self.resolve(alarm)).collect();
            self.hub.publish(SyncEvent::NewAlarms {
                alarms: Arc::new(resolved),
            });
        }

        Ok(RefreshOutcome::Applied { total, new_items })
    }

    /// Attaches display names to an alarm. Falls back to a synthetic name
    /// when the station or area is not (yet) known, so notifications never
    /// carry bare ids.
    fn resolve(&self, alarm: &AlarmRecord) -> ResolvedAlarm {
        let station_name = self
            .station_names
            .get(&alarm.station_id)
            .map(|name| name.clone())
            .unwrap_or_else(|| format!("station {}", alarm.station_id));
        let area_name = if alarm.area_name.is_empty() {
            self.area_names
                .get(&alarm.area_id)
                .map(|name| name.clone())
                .unwrap_or_else(|| format!("area {}", alarm.area_id))
        } else {
            alarm.area_name.clone()
        };
        ResolvedAlarm {
            alarm: alarm.clone(),
            station_name,
            area_name,
        }
    }

    fn rebuild_station_names(&self) {
        if let Some(snapshot) = self.stations.current() {
            self.station_names.clear();
            for station in snapshot.iter() {
                self.station_names.insert(station.id, station.name.clone());
            }
        }
    }

    fn rebuild_area_names(&self) {
        if let Some(snapshot) = self.areas.current() {
            self.area_names.clear();
            for area in snapshot.iter() {
                self.area_names.insert(area.id, area.name.clone());
            }
        }
    }

    // ---- read side, used by the API handlers ----

    pub fn active_alarms(&self) -> Vec<AlarmRecord> {
        self.alarms
            .current()
            .map(|snapshot| {
                snapshot
                    .iter()
                    .filter(|alarm| alarm.is_active())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn alarm_snapshot(&self) -> Option<Arc<Snapshot<AlarmRecord>>> {
        self.alarms.current()
    }

    pub fn stations(&self) -> Vec<Station> {
        self.stations
            .current()
            .map(|snapshot| snapshot.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn areas(&self) -> Vec<Area> {
        self.areas
            .current()
            .map(|snapshot| snapshot.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn station_stats(&self) -> Vec<StationStats> {
        self.stats
            .current()
            .map(|snapshot| snapshot.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn state(&self, kind: SyncKind) -> SyncState {
        self.states
            .get(&kind)
            .map(|entry| *entry)
            .unwrap_or(SyncState::Idle)
    }

    pub fn skip_count(&self) -> u64 {
        self.skips.load(Ordering::Relaxed)
    }

    /// Per-kind snapshot metadata for the status API.
    pub fn snapshot_overview(&self) -> Vec<KindStatus> {
        SyncKind::ALL
            .iter()
            .map(|&kind| {
                let (count, taken_at) = match kind {
                    SyncKind::ActiveAlarms => (self.alarms.len(), self.alarms.taken_at()),
                    SyncKind::Stats => (self.stats.len(), self.stats.taken_at()),
                    SyncKind::Stations => (self.stations.len(), self.stations.taken_at()),
                    SyncKind::Areas => (self.areas.len(), self.areas.taken_at()),
                };
                KindStatus {
                    kind,
                    state: self.state(kind),
                    count,
                    taken_at,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KindStatus {
    pub kind: SyncKind,
    pub state: SyncState,
    pub count: usize,
    pub taken_at: Option<DateTime<Utc>>,
}

/// Batch decode with the all-dropped guard: rows that exist but yield no
/// records mean the payload schema does not match, which is a parse
/// failure, not an empty result.
fn decode_batch<T>(
    rows: &[Value],
    from_row: fn(&Value) -> std::result::Result<T, RowError>,
    label: &str,
) -> Result<ParsedBatch<T>> {
    let batch = payload::parse_batch(rows, from_row, label);
    if !rows.is_empty() && batch.records.is_empty() {
        return Err(SyncError::Parse(format!(
            "no decodable {label} records in {} rows",
            rows.len()
        )));
    }
    Ok(batch)
}
