//! Site topology and per-station statistics

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::row::{self, RowError};

/// A monitored station inside an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: u32,
    pub name: String,
    pub area_id: u32,
}

impl Station {
    pub fn from_row(row: &Value) -> Result<Self, RowError> {
        Ok(Self {
            id: row::get_u32(row, "station_id")?,
            name: row::get_str(row, "station_name")?.to_string(),
            area_id: row::get_u32(row, "area_id")?,
        })
    }
}

/// A plant area grouping stations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: u32,
    pub name: String,
}

impl Area {
    pub fn from_row(row: &Value) -> Result<Self, RowError> {
        Ok(Self {
            id: row::get_u32(row, "area_id")?,
            name: row::get_str(row, "area_name")?.to_string(),
        })
    }
}

/// Per-station rollup the UI's overview widgets render directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStats {
    pub station_id: u32,
    pub station_name: String,
    pub sensors_total: u32,
    pub sensors_online: u32,
    pub active_alarms: u32,
}

impl StationStats {
    pub fn from_row(row: &Value) -> Result<Self, RowError> {
        Ok(Self {
            station_id: row::get_u32(row, "station_id")?,
            station_name: row::get_str(row, "station_name")?.to_string(),
            sensors_total: row::get_u32(row, "sensors_total")?,
            sensors_online: row::get_u32(row, "sensors_online")?,
            active_alarms: row::get_u32(row, "active_alarms")?,
        })
    }

    /// Fraction of sensors reporting, 0.0 when the station has none.
    pub fn online_ratio(&self) -> f64 {
        if self.sensors_total == 0 {
            0.0
        } else {
            f64::from(self.sensors_online) / f64::from(self.sensors_total)
        }
    }
}
