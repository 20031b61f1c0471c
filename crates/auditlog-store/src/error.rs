//! Store errors.

use thiserror::Error;
use uuid::Uuid;

/// Audit record persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit record {0} already exists")]
    Duplicate(Uuid),

    #[error("stored audit record is unreadable: {0}")]
    Corrupt(String),

    #[error("the sqlite backend needs a database path")]
    MissingPath,
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
