//! Engine setup errors.

use auditlog_common_config::ConfigError;
use auditlog_store::StoreError;
use thiserror::Error;

/// Failure to build an [`AuditEngine`](crate::AuditEngine).
///
/// Capture and persist failures never surface here; they are logged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("audit store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for engine setup.
pub type Result<T> = std::result::Result<T, EngineError>;
