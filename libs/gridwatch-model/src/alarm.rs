//! Alarm domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::row::{self, RowError};

/// Alarm severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlarmSeverity {
    /// Equipment fault (sensor offline, board unreachable)
    Equipment,
    /// Reading crossed the warning threshold
    Warning,
    /// Reading crossed the critical threshold
    Critical,
}

impl AlarmSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSeverity::Equipment => "Equipment",
            AlarmSeverity::Warning => "Warning",
            AlarmSeverity::Critical => "Critical",
        }
    }

    /// Numeric severity code used by the gateway (0/1/2).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AlarmSeverity::Equipment),
            1 => Some(AlarmSeverity::Warning),
            2 => Some(AlarmSeverity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlarmSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equipment" => Ok(AlarmSeverity::Equipment),
            "warning" => Ok(AlarmSeverity::Warning),
            "critical" => Ok(AlarmSeverity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// One alarm as reported by the remote store.
///
/// `id` is unique across the active and historical universe. A cleared
/// record stays in history; only uncleared records belong in the active
/// view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: u64,
    pub station_id: u32,
    pub area_id: u32,
    pub area_name: String,
    pub sensor_id: u32,
    pub raised_at: DateTime<Utc>,
    pub severity: AlarmSeverity,
    /// Reading that raised the alarm
    pub value: f64,
    pub warn_limit: f64,
    pub crit_limit: f64,
    pub cleared: bool,
    pub cleared_at: Option<DateTime<Utc>>,
}

impl AlarmRecord {
    /// Whether this alarm belongs in the active view.
    pub fn is_active(&self) -> bool {
        !self.cleared
    }

    /// Build a record from one gateway row.
    ///
    /// Expected columns: `alarm_id`, `station_id`, `area_id`, `area_name`,
    /// `sensor_id`, `raised_at`, `severity`, `value`, `warn_limit`,
    /// `crit_limit`, `cleared`, `cleared_at` (nullable).
    pub fn from_row(row: &Value) -> Result<Self, RowError> {
        let severity = parse_severity(row)?;
        Ok(Self {
            id: row::get_u64(row, "alarm_id")?,
            station_id: row::get_u32(row, "station_id")?,
            area_id: row::get_u32(row, "area_id")?,
            area_name: row::get_str(row, "area_name")?.to_string(),
            sensor_id: row::get_u32(row, "sensor_id")?,
            raised_at: row::get_timestamp(row, "raised_at")?,
            severity,
            value: row::get_f64(row, "value")?,
            warn_limit: row::get_f64(row, "warn_limit")?,
            crit_limit: row::get_f64(row, "crit_limit")?,
            cleared: parse_cleared_flag(row.get("cleared")),
            cleared_at: row::opt_timestamp(row, "cleared_at")?,
        })
    }
}

/// The single boolean rule for "cleared" flags.
///
/// Source systems disagree on the encoding ("Y" vs "1"), so one predicate
/// absorbs all of them: JSON `true`, the number `1`, or a string that
/// trims and lowercases to `"1"`, `"y"` or `"true"` mean cleared.
/// Anything else, including absence, means not cleared.
pub fn parse_cleared_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "y" | "true")
        },
        _ => false,
    }
}

fn parse_severity(row: &Value) -> Result<AlarmSeverity, RowError> {
    let value = row.get("severity").ok_or(RowError::Missing("severity"))?;
    match value {
        Value::Number(n) => n.as_i64().and_then(AlarmSeverity::from_code).ok_or_else(|| {
            RowError::Invalid {
                field: "severity",
                reason: format!("unknown code: {}", n),
            }
        }),
        Value::String(s) => s.parse().map_err(|reason| RowError::Invalid {
            field: "severity",
            reason,
        }),
        other => Err(RowError::Invalid {
            field: "severity",
            reason: format!("expected code or name, got {}", other),
        }),
    }
}

/// An alarm joined with the display names a subscriber needs.
///
/// Notifications never carry bare ids: the station and area names are
/// resolved before publish, falling back to a readable label when the
/// site snapshots have not caught up yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAlarm {
    pub alarm: AlarmRecord,
    pub station_name: String,
    pub area_name: String,
}

impl ResolvedAlarm {
    /// One-line operator-facing description.
    pub fn summary(&self) -> String {
        format!(
            "{} alarm {} at {} / {}: sensor {} reading {} (warn {}, crit {})",
            self.alarm.severity,
            self.alarm.id,
            self.station_name,
            self.area_name,
            self.alarm.sensor_id,
            self.alarm.value,
            self.alarm.warn_limit,
            self.alarm.crit_limit,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
