//! Error types for the sync service

use gridwatch_model::RowError;
use thiserror::Error;
use tracing::Level;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync service error
#[derive(Error, Debug)]
pub enum SyncError {
    /// Gateway unreachable, timed out, or returned a non-success status
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload could not be decoded into domain records
    #[error("parse error: {0}")]
    Parse(String),

    /// Individual record failed a domain constraint
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Whether the next poll cycle is likely to succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    /// Suggested log level for a failed poll cycle.
    pub fn log_level(&self) -> Level {
        match self {
            SyncError::Transport(_) => Level::WARN,
            SyncError::Parse(_) | SyncError::Validation(_) => Level::ERROR,
            SyncError::Config(_) | SyncError::Io(_) => Level::ERROR,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            SyncError::Transport(format!("connection failed: {err}"))
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

impl From<RowError> for SyncError {
    fn from(err: RowError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_retryable() {
        assert!(SyncError::Transport("connection refused".into()).is_retryable());
        assert!(!SyncError::Parse("bad json".into()).is_retryable());
        assert!(!SyncError::Validation("missing field".into()).is_retryable());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(
            SyncError::Transport("timeout".into()).log_level(),
            Level::WARN
        );
        assert_eq!(SyncError::Parse("garbage".into()).log_level(), Level::ERROR);
    }

    #[test]
    fn test_row_error_maps_to_validation() {
        let err: SyncError = RowError::Missing("station_id").into();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(err.to_string().contains("station_id"));
    }
}
