//! Strategy errors.

use auditlog_common_config::ConfigStoreError;
use auditlog_types::PolicyKind;
use thiserror::Error;

/// Errors surfaced by the audit configuration API.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The operation needs a type list but the policy has none.
    #[error("operation not supported by the {policy} audit policy")]
    PolicyMismatch { policy: PolicyKind },

    /// The configuration store rejected the update. Cached policy state
    /// has been dropped regardless.
    #[error("failed to write audit configuration: {0}")]
    ConfigWriteFailure(#[from] ConfigStoreError),
}

/// Result type alias for strategy operations.
pub type Result<T> = std::result::Result<T, StrategyError>;
