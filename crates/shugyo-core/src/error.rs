//! Core error types for shugyo-core.
//!
//! Every fallible boundary of the library reports through one of these
//! enums. The timer state machine itself only fails on invalid
//! configuration; collaborator failures (store, notifier) are caught by the
//! controller and surfaced as warnings.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for shugyo-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timer configuration or command errors
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// History store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Duration input errors
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the phase timers and the cycle controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Durations are whole seconds and must be at least one.
    #[error("Invalid duration: {0}s (minimum is 1 second)")]
    InvalidDuration(u64),

    /// Duration changes are only allowed while the timer is stopped.
    #[error("Cannot change the duration of a running timer")]
    Running,

    /// The guard window must close before a one-second phase can expire.
    #[error("Invalid guard window: {0}ms (must be below 1000ms)")]
    InvalidGuard(u64),

    /// The command needs an idle controller.
    #[error("A session is already in progress")]
    SessionActive,
}

/// Errors from a [`HistoryStore`](crate::history::HistoryStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record with this id
    #[error("History record {0} not found")]
    NotFound(i64),

    /// Backing database failure
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The store refused the operation (e.g. offline remote)
    #[error("History store unavailable: {0}")]
    Unavailable(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Data directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Notification collaborator errors. Never escape the controller.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Output device missing or blocked by the platform
    #[error("Notification output unavailable: {0}")]
    Unavailable(String),

    /// Writing the notification failed
    #[error("Notification write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from parsing user-entered durations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Nothing was entered
    #[error("Duration input is empty")]
    Empty,

    /// Input is not a number
    #[error("Not a number: '{0}'")]
    NotANumber(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }

    #[test]
    fn store_error_wraps_database_error() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Database(DatabaseError::QueryFailed(_))));
    }

    #[test]
    fn timer_error_converts_into_core_error() {
        let err: CoreError = TimerError::InvalidDuration(0).into();
        assert_eq!(
            err.to_string(),
            "Timer error: Invalid duration: 0s (minimum is 1 second)"
        );
    }
}
