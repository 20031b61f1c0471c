//! Capture errors.

use auditlog_types::{AuditAction, ObjectRef, UnitOfWorkId};
use thiserror::Error;

/// Failure to stage one object's change.
///
/// Never propagated to the host's write path; the engine logs it and
/// drops that object's audit entry.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{action} of {object} arrived without the state needed to diff it")]
    MissingState { object: String, action: AuditAction },

    #[error("unit of work {0} has already been drained")]
    UnitOfWorkClosed(UnitOfWorkId),
}

impl CaptureError {
    pub(crate) fn missing_state(object: &ObjectRef, action: AuditAction) -> Self {
        Self::MissingState {
            object: format!("{}:{}", object.type_id, object.uuid),
            action,
        }
    }
}

/// Result type alias for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
