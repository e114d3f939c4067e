//! Repository layer for event persistence.

mod migrations;
mod payloads;
mod pool;
mod records;
mod runs;
mod steps;

pub use migrations::run_migrations;
pub use payloads::PayloadRepository;
pub use pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
pub use runs::RunRepository;
pub use steps::StepRepository;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Repository error type.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] DieselError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Decode an optional JSON column, dropping undecodable content.
pub(crate) fn parse_json_opt(s: Option<String>) -> Option<serde_json::Value> {
    s.and_then(|s| serde_json::from_str(&s).ok())
}

/// Encode an optional JSON value for a TEXT column.
pub(crate) fn to_json_opt(value: Option<&serde_json::Value>) -> Result<Option<String>> {
    value
        .map(|v| serde_json::to_string(v).map_err(RepositoryError::from))
        .transpose()
}
