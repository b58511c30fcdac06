//! Chart series types
//!
//! A series is identified by the (station, board, sensor) triple and
//! bounded to a rolling time window. Gateway anomaly markers never leak
//! past this module: raw samples are converted to [`Reading`] at the
//! boundary, so downstream math can only ever see valid numbers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Raw value the gateway emits for an unreadable point.
pub const RAW_ANOMALY_SENTINEL: f64 = -9999.0;

/// Identity of one chart series.
///
/// ## Example
///
/// ```
/// use gridwatch_model::SeriesKey;
///
/// let key = SeriesKey::new(3, 2, 17);
/// assert_eq!(key.to_string(), "3:2:17");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub station_id: u32,
    pub board_id: u32,
    pub sensor_id: u32,
}

impl SeriesKey {
    pub fn new(station_id: u32, board_id: u32, sensor_id: u32) -> Self {
        Self {
            station_id,
            board_id,
            sensor_id,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.station_id, self.board_id, self.sensor_id)
    }
}

/// One sensor reading, anomalies made explicit.
///
/// The gateway marks unreadable points with a sentinel number. Arithmetic
/// on that sentinel produces garbage silently, so it is replaced with a
/// dedicated variant as soon as a sample is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading {
    Valid(f64),
    Anomalous,
}

impl Reading {
    /// Classify a raw gateway value. `None`, NaN and the sentinel are
    /// anomalous; everything else is a valid reading.
    pub fn from_raw(raw: Option<f64>) -> Self {
        match raw {
            None => Reading::Anomalous,
            Some(v) if v.is_nan() => Reading::Anomalous,
            Some(v) if (v - RAW_ANOMALY_SENTINEL).abs() < f64::EPSILON => Reading::Anomalous,
            Some(v) => Reading::Valid(v),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Valid(v) => Some(*v),
            Reading::Anomalous => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Reading::Valid(_))
    }
}

/// A timestamped reading inside a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub reading: Reading,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, reading: Reading) -> Self {
        Self { timestamp, reading }
    }
}

/// An assembled chart series over a rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub key: SeriesKey,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Points ascending by timestamp, all within the window
    pub points: Vec<SeriesPoint>,
    /// Extremes over valid readings only; `None` when no point is valid
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ChartSeries {
    /// Assemble a series from raw samples.
    ///
    /// Samples older than `now - window` are dropped, the rest are sorted
    /// ascending. `window_end` is the assembly instant, the upper bound is
    /// not enforced so a slightly skewed gateway clock cannot hide fresh
    /// points.
    pub fn from_samples(
        key: SeriesKey,
        samples: Vec<SeriesPoint>,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let window_start = now - window;
        let mut points: Vec<SeriesPoint> = samples
            .into_iter()
            .filter(|p| p.timestamp >= window_start)
            .collect();
        points.sort_by_key(|p| p.timestamp);

        let mut min = None;
        let mut max = None;
        for value in points.iter().filter_map(|p| p.reading.value()) {
            min = Some(match min {
                None => value,
                Some(m) => value.min(m),
            });
            max = Some(match max {
                None => value,
                Some(m) => value.max(m),
            });
        }

        Self {
            key,
            window_start,
            window_end: now,
            points,
            min,
            max,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

    use super::*;
    use chrono::TimeZone;

    fn at(minutes_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(minutes_ago)
    }

    #[test]
    fn test_reading_from_raw() {
        assert_eq!(Reading::from_raw(Some(42.5)), Reading::Valid(42.5));
        assert_eq!(Reading::from_raw(Some(-9999.0)), Reading::Anomalous);
        assert_eq!(Reading::from_raw(Some(f64::NAN)), Reading::Anomalous);
        assert_eq!(Reading::from_raw(None), Reading::Anomalous);
        // Near the sentinel but not it
        assert_eq!(Reading::from_raw(Some(-9998.5)), Reading::Valid(-9998.5));
    }

    #[test]
    fn test_from_samples_trims_and_sorts() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let samples = vec![
            SeriesPoint::new(at(30, now), Reading::Valid(2.0)),
            SeriesPoint::new(at(10, now), Reading::Valid(3.0)),
            // 13 hours old, outside a 12h window
            SeriesPoint::new(at(13 * 60, now), Reading::Valid(99.0)),
            SeriesPoint::new(at(50, now), Reading::Valid(1.0)),
        ];

        let series = ChartSeries::from_samples(
            SeriesKey::new(1, 1, 1),
            samples,
            Duration::hours(12),
            now,
        );

        assert_eq!(series.len(), 3);
        // Ascending by timestamp: 50, 30, 10 minutes ago
        assert_eq!(series.points[0].reading, Reading::Valid(1.0));
        assert_eq!(series.points[2].reading, Reading::Valid(3.0));
        assert_eq!(series.window_end, now);
        assert_eq!(series.window_start, now - Duration::hours(12));
    }

    #[test]
    fn test_min_max_skip_anomalous() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let samples = vec![
            SeriesPoint::new(at(3, now), Reading::Valid(7.5)),
            SeriesPoint::new(at(2, now), Reading::Anomalous),
            SeriesPoint::new(at(1, now), Reading::Valid(4.25)),
        ];

        let series =
            ChartSeries::from_samples(SeriesKey::new(1, 1, 1), samples, Duration::hours(12), now);
        assert_eq!(series.min, Some(4.25));
        assert_eq!(series.max, Some(7.5));
    }

    #[test]
    fn test_min_max_none_when_all_anomalous() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let samples = vec![SeriesPoint::new(at(1, now), Reading::Anomalous)];

        let series =
            ChartSeries::from_samples(SeriesKey::new(1, 1, 1), samples, Duration::hours(12), now);
        assert_eq!(series.min, None);
        assert_eq!(series.max, None);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_key_display_collision_free() {
        // One million distinct sensor combinations, zero key collisions
        let mut seen = std::collections::HashSet::new();
        for station in 0..100u32 {
            for board in 0..100u32 {
                for sensor in 0..100u32 {
                    seen.insert(SeriesKey::new(station, board, sensor).to_string());
                }
            }
        }
        assert_eq!(seen.len(), 1_000_000);
    }
}
