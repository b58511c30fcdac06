//! Gateway payload decoding
//!
//! Payloads arrive as JSON, either a bare array of row objects or an
//! object with a `rows` array. Row-level failures are dropped and counted
//! so one bad record never blocks the rest of a batch.

use gridwatch_model::{row, Reading, RowError, SeriesPoint};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, SyncError};

/// Records that decoded, plus how many rows were dropped on the floor.
pub struct ParsedBatch<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

/// Extracts the row array from a raw payload.
pub fn parse_rows(payload: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| SyncError::Parse(format!("payload is not valid JSON: {e}")))?;
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("rows") {
            Some(Value::Array(rows)) => Ok(rows),
            Some(other) => Err(SyncError::Parse(format!(
                "'rows' is {}, expected array",
                row::type_name(&other)
            ))),
            None => Err(SyncError::Parse(
                "payload object has no 'rows' array".into(),
            )),
        },
        other => Err(SyncError::Parse(format!(
            "payload is {}, expected array or object",
            row::type_name(&other)
        ))),
    }
}

/// Decodes each row with `from_row`. Invalid rows are logged and counted,
/// valid ones keep their payload order.
pub fn parse_batch<T, F>(rows: &[Value], from_row: F, label: &str) -> ParsedBatch<T>
where
    F: Fn(&Value) -> std::result::Result<T, RowError>,
{
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0;
    for (index, value) in rows.iter().enumerate() {
        match from_row(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("{label} row {index} dropped: {e}");
                dropped += 1;
            }
        }
    }
    ParsedBatch { records, dropped }
}

/// Decodes chart history rows (`ts`, nullable `value`). Absent, null and
/// sentinel values become [`Reading::Anomalous`] instead of being dropped.
pub fn parse_chart_samples(rows: &[Value]) -> ParsedBatch<SeriesPoint> {
    parse_batch(
        rows,
        |value| {
            Ok(SeriesPoint {
                timestamp: row::get_timestamp(value, "ts")?,
                reading: Reading::from_raw(row::opt_f64(value, "value")?),
            })
        },
        "chart",
    )
}
