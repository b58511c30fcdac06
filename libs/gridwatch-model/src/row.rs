//! Field extraction from gateway JSON rows
//!
//! The query gateway returns result sets as JSON arrays of row objects.
//! Everything here pulls one field out of one row and says precisely what
//! was wrong when it cannot, so a single bad row can be dropped and
//! reported without discarding the batch it arrived in.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// A single row field could not be extracted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("field '{field}' is not usable: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl RowError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RowError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Required string field.
pub fn get_str<'a>(row: &'a Value, field: &'static str) -> Result<&'a str, RowError> {
    row.get(field)
        .ok_or(RowError::Missing(field))?
        .as_str()
        .ok_or_else(|| RowError::invalid(field, "expected string"))
}

/// Required unsigned integer field. Numeric strings are accepted because
/// some gateway versions quote every column.
pub fn get_u32(row: &Value, field: &'static str) -> Result<u32, RowError> {
    let value = row.get(field).ok_or(RowError::Missing(field))?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| RowError::invalid(field, format!("out of range: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|e| RowError::invalid(field, e.to_string())),
        other => Err(RowError::invalid(
            field,
            format!("expected number, got {}", type_name(other)),
        )),
    }
}

/// Required u64 field, same quoting tolerance as [`get_u32`].
pub fn get_u64(row: &Value, field: &'static str) -> Result<u64, RowError> {
    let value = row.get(field).ok_or(RowError::Missing(field))?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| RowError::invalid(field, format!("out of range: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| RowError::invalid(field, e.to_string())),
        other => Err(RowError::invalid(
            field,
            format!("expected number, got {}", type_name(other)),
        )),
    }
}

/// Required float field.
pub fn get_f64(row: &Value, field: &'static str) -> Result<f64, RowError> {
    let value = row.get(field).ok_or(RowError::Missing(field))?;
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| RowError::invalid(field, format!("not representable: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| RowError::invalid(field, e.to_string())),
        other => Err(RowError::invalid(
            field,
            format!("expected number, got {}", type_name(other)),
        )),
    }
}

/// Optional float: absent or null yields `None`.
pub fn opt_f64(row: &Value, field: &'static str) -> Result<Option<f64>, RowError> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_f64(row, field).map(Some),
    }
}

/// Required timestamp field.
///
/// Accepted encodings, tried in order:
/// 1. JSON number: epoch milliseconds
/// 2. `"%Y-%m-%d %H:%M:%S"` (gateway SQL text, UTC)
/// 3. RFC 3339 (newer gateways)
pub fn get_timestamp(row: &Value, field: &'static str) -> Result<DateTime<Utc>, RowError> {
    let value = row.get(field).ok_or(RowError::Missing(field))?;
    parse_timestamp(value).ok_or_else(|| {
        RowError::invalid(
            field,
            format!("expected epoch millis or datetime string, got {}", value),
        )
    })
}

/// Optional timestamp: absent, null or empty string yields `None`.
pub fn opt_timestamp(row: &Value, field: &'static str) -> Result<Option<DateTime<Utc>>, RowError> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(_) => get_timestamp(row, field).map(Some),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64()?;
            DateTime::from_timestamp_millis(millis)
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(naive.and_utc());
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        },
        _ => None,
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
