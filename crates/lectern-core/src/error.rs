//! Error types for the lectern-core crate.
//!
//! Nothing in this crate retries. Every error reaches the immediate caller
//! carrying the key or username that failed, and no operation hands back
//! a partially filled result alongside an error.

use lectern_store::StoreError;

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the aggregation and caching layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A store round-trip failed; the store error is passed through as is.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// One of the lookups feeding a profile failed.
    #[error("lookup of {key} failed: {source}")]
    LookupFailed {
        /// The store key whose lookup failed.
        key: String,
        #[source]
        source: StoreError,
    },

    /// One member of a fan-out batch failed, so the batch failed.
    #[error("aggregation failed at user {username}: {source}")]
    PartialAggregationFailure {
        /// The user whose profile could not be assembled.
        username: String,
        #[source]
        source: Box<CoreError>,
    },

    /// No video is stored under the slug.
    #[error("unknown video: {slug}")]
    UnknownVideo { slug: String },

    /// The catalog file could not be read or is malformed.
    #[error("catalog {path}: {reason}")]
    Catalog { path: String, reason: String },

    /// A stored document did not have the expected shape, or a record
    /// could not be encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
