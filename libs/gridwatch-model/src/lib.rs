//! GridWatch Domain Model
//!
//! Plain domain types shared by the sync service and anything that
//! consumes its snapshots. No I/O, no service dependencies.
//!
//! # Modules
//!
//! - `row`: field extraction from gateway JSON rows, with per-field errors
//! - `alarm`: alarm records, severity, resolved notification payloads
//! - `site`: stations, areas, and per-station statistics
//! - `series`: chart series keys, readings, and rolling-window assembly

pub mod alarm;
pub mod row;
pub mod series;
pub mod site;

// Re-exports for convenience
pub use alarm::{AlarmRecord, AlarmSeverity, ResolvedAlarm};
pub use row::RowError;
pub use series::{ChartSeries, Reading, SeriesKey, SeriesPoint};
pub use site::{Area, Station, StationStats};
