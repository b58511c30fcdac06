//! Service configuration
//!
//! Layered: built-in defaults, then the YAML file, then `SYNCSRV_*`
//! environment variables (double underscore separates nesting, e.g.
//! `SYNCSRV_REMOTE__TIMEOUT_MS=5000`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{Result, SyncError};
use crate::orchestrator::SyncKind;

pub const DEFAULT_CONFIG_PATH: &str = "config/syncsrv.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub poll: PollSection,
    #[serde(default)]
    pub charts: ChartsSection,
    #[serde(default)]
    pub queries: QuerySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_service_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    /// Query gateway endpoint, POST target for query requests
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout; a cycle never waits longer than this
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSection {
    #[serde(default = "default_alarms_secs")]
    pub active_alarms_secs: u64,
    #[serde(default = "default_stats_secs")]
    pub stats_secs: u64,
    #[serde(default = "default_stations_secs")]
    pub stations_secs: u64,
    #[serde(default = "default_areas_secs")]
    pub areas_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsSection {
    /// How long a fetched series stays served from cache
    #[serde(default = "default_chart_ttl_secs")]
    pub ttl_secs: u64,
    /// History window requested from the gateway
    #[serde(default = "default_chart_window_hours")]
    pub window_hours: i64,
}

/// Query text sent to the gateway, one per data kind. The chart history
/// query is a template with `{station_id}`, `{board_id}` and `{sensor_id}`
/// placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySection {
    #[serde(default = "default_query_active_alarms")]
    pub active_alarms: String,
    #[serde(default = "default_query_stats")]
    pub stats: String,
    #[serde(default = "default_query_stations")]
    pub stations: String,
    #[serde(default = "default_query_areas")]
    pub areas: String,
    #[serde(default = "default_query_chart_history")]
    pub chart_history: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_console_level")]
    pub console_level: String,
    #[serde(default = "default_file_level")]
    pub file_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

fn default_service_name() -> String {
    "syncsrv".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8085
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9000/query".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_alarms_secs() -> u64 {
    5
}

fn default_stats_secs() -> u64 {
    30
}

fn default_stations_secs() -> u64 {
    300
}

fn default_areas_secs() -> u64 {
    300
}

fn default_chart_ttl_secs() -> u64 {
    60
}

fn default_chart_window_hours() -> i64 {
    12
}

fn default_query_active_alarms() -> String {
    "SELECT alarm_id, station_id, area_id, area_name, sensor_id, raised_at, severity, \
     value, warn_limit, crit_limit, cleared, cleared_at FROM alarms WHERE cleared = 0"
        .to_string()
}

fn default_query_stats() -> String {
    "SELECT station_id, station_name, sensors_total, sensors_online, active_alarms \
     FROM station_stats"
        .to_string()
}

fn default_query_stations() -> String {
    "SELECT station_id, station_name, area_id FROM stations".to_string()
}

fn default_query_areas() -> String {
    "SELECT area_id, area_name FROM areas".to_string()
}

fn default_query_chart_history() -> String {
    "SELECT ts, value FROM history WHERE station_id = {station_id} AND board_id = {board_id} \
     AND sensor_id = {sensor_id} ORDER BY ts"
        .to_string()
}

fn default_console_level() -> String {
    "info".to_string()
}

fn default_file_level() -> String {
    "debug".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_max_log_files() -> usize {
    30
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            active_alarms_secs: default_alarms_secs(),
            stats_secs: default_stats_secs(),
            stations_secs: default_stations_secs(),
            areas_secs: default_areas_secs(),
        }
    }
}

impl Default for ChartsSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_chart_ttl_secs(),
            window_hours: default_chart_window_hours(),
        }
    }
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            active_alarms: default_query_active_alarms(),
            stats: default_query_stats(),
            stations: default_query_stations(),
            areas: default_query_areas(),
            chart_history: default_query_chart_history(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            console_level: default_console_level(),
            file_level: default_file_level(),
            log_dir: default_log_dir(),
            max_log_files: default_max_log_files(),
        }
    }
}

impl PollSection {
    pub fn interval_for(&self, kind: SyncKind) -> Duration {
        let secs = match kind {
            SyncKind::ActiveAlarms => self.active_alarms_secs,
            SyncKind::Stats => self.stats_secs,
            SyncKind::Stations => self.stations_secs,
            SyncKind::Areas => self.areas_secs,
        };
        Duration::from_secs(secs)
    }
}

impl QuerySection {
    pub fn query_for(&self, kind: SyncKind) -> &str {
        match kind {
            SyncKind::ActiveAlarms => &self.active_alarms,
            SyncKind::Stats => &self.stats,
            SyncKind::Stations => &self.stations,
            SyncKind::Areas => &self.areas,
        }
    }
}

impl LoggingSection {
    pub fn to_log_config(&self, service_name: &str) -> common::logging::LogConfig {
        common::logging::LogConfig {
            service_name: service_name.to_string(),
            log_dir: PathBuf::from(&self.log_dir),
            console_level: self.console_level.parse().unwrap_or(Level::INFO),
            file_level: self.file_level.parse().unwrap_or(Level::DEBUG),
            max_log_files: self.max_log_files,
        }
    }
}

impl SyncConfig {
    /// Load configuration from the given YAML file (or the default path)
    /// with environment overrides applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let config: SyncConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("SYNCSRV_").split("__"))
            .extract()
            .map_err(|e| SyncError::Config(format!("failed to load {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.endpoint.is_empty() {
            return Err(SyncError::Config("remote.endpoint must not be empty".into()));
        }
        if self.remote.timeout_ms == 0 {
            return Err(SyncError::Config("remote.timeout_ms must be positive".into()));
        }
        if self.api.port == 0 {
            return Err(SyncError::Config("api.port must be positive".into()));
        }
        for kind in SyncKind::ALL {
            if self.poll.interval_for(kind).is_zero() {
                return Err(SyncError::Config(format!(
                    "poll interval for {kind} must be at least 1s"
                )));
            }
        }
        if self.charts.ttl_secs == 0 {
            return Err(SyncError::Config("charts.ttl_secs must be positive".into()));
        }
        if self.charts.window_hours < 1 {
            return Err(SyncError::Config(
                "charts.window_hours must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
