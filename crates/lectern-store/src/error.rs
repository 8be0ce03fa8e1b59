//! Errors raised by the key-value store.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a store round-trip.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value is not valid JSON, or a value could not be encoded.
    #[error("stored value is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema migration v{version}: {message}")]
    Migration { version: u32, message: String },

    /// The key holds a different kind of value than the operation expects.
    #[error("wrong type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// The operation cannot be applied, e.g. a counter at `i64::MAX`.
    #[error("rejected: {0}")]
    InvalidArgument(String),

    /// The blocking SQLite task was cancelled or panicked.
    #[error("sqlite task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
