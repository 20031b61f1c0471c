//! Query errors.

use auditlog_store::StoreError;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("start date {start} is in the future")]
    StartDateInFuture { start: DateTime<Utc> },

    #[error("start date {start} is after end date {end}")]
    InvertedRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
