//! The capture engine invoked from the host's write hooks.

use crate::diff::FieldDiffer;
use crate::unit_of_work::UnitOfWork;
use crate::{CaptureError, Result};
use auditlog_common_config::CaptureSettings;
use auditlog_strategy::StrategyResolver;
use auditlog_types::{AuditAction, ChangeCandidate, EntityState, ObjectRef};
use tracing::{debug, error};

/// One write observed by the host's persistence layer.
#[derive(Debug, Clone)]
pub struct EntityWrite {
    pub object: ObjectRef,
    pub action: AuditAction,
    pub before: Option<EntityState>,
    pub after: Option<EntityState>,
}

impl EntityWrite {
    /// An insert.
    pub fn created(object: ObjectRef, after: EntityState) -> Self {
        Self {
            object,
            action: AuditAction::Created,
            before: None,
            after: Some(after),
        }
    }

    /// An update with the previously loaded state.
    pub fn updated(object: ObjectRef, before: EntityState, after: EntityState) -> Self {
        Self {
            object,
            action: AuditAction::Updated,
            before: Some(before),
            after: Some(after),
        }
    }

    /// A delete with the last loaded state.
    pub fn deleted(object: ObjectRef, before: EntityState) -> Self {
        Self {
            object,
            action: AuditAction::Deleted,
            before: Some(before),
            after: None,
        }
    }
}

/// What happened to one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A candidate was staged or merged.
    Staged,
    /// The type is audited but nothing audited changed.
    Unchanged,
    /// The type is not audited.
    Ignored,
}

/// Turns host writes into staged change candidates.
#[derive(Clone)]
pub struct ChangeCaptureEngine {
    strategy: StrategyResolver,
    differ: FieldDiffer,
    store_deleted_state: bool,
}

impl ChangeCaptureEngine {
    /// Create an engine.
    pub fn new(strategy: StrategyResolver, settings: &CaptureSettings) -> Self {
        Self {
            strategy,
            differ: FieldDiffer::new(settings),
            store_deleted_state: settings.store_last_state_of_deleted_items,
        }
    }

    pub fn strategy(&self) -> &StrategyResolver {
        &self.strategy
    }

    pub fn differ(&self) -> &FieldDiffer {
        &self.differ
    }

    /// Hook called for every write before the host commits.
    ///
    /// Never fails: a write that cannot be captured is logged and its audit
    /// entry dropped, leaving the host's transaction untouched.
    pub fn before_commit(&self, uow: &UnitOfWork, write: EntityWrite) -> Option<CaptureOutcome> {
        let object = write.object.clone();
        match self.try_capture(uow, write) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(
                    unit_of_work = %uow.id(),
                    type_id = %object.type_id,
                    object = %object.uuid,
                    error = %e,
                    "failed to capture change; audit entry dropped"
                );
                None
            }
        }
    }

    /// Capture one write, surfacing failures.
    pub fn try_capture(&self, uow: &UnitOfWork, write: EntityWrite) -> Result<CaptureOutcome> {
        if !self.strategy.is_audited_or_implicit(&write.object.type_id) {
            return Ok(CaptureOutcome::Ignored);
        }

        let EntityWrite {
            object,
            action,
            before,
            after,
        } = write;

        let deltas = match action {
            AuditAction::Created => Default::default(),
            AuditAction::Deleted => match (&before, self.store_deleted_state) {
                (Some(state), true) => self.differ.last_state(state),
                _ => Default::default(),
            },
            AuditAction::Updated => {
                let (Some(old), Some(new)) = (&before, &after) else {
                    return Err(CaptureError::missing_state(&object, action));
                };
                let deltas = self.differ.diff(old, new);
                if deltas.is_empty() {
                    uow.touch(object, before, after)?;
                    return Ok(CaptureOutcome::Unchanged);
                }
                deltas
            }
        };

        debug!(
            unit_of_work = %uow.id(),
            type_id = %object.type_id,
            object = %object.uuid,
            action = %action,
            changes = deltas.len(),
            "staging change"
        );
        let candidate = ChangeCandidate::new(object, action)
            .with_deltas(deltas)
            .with_states(before, after);
        uow.stage_with(candidate, &self.differ)?;
        Ok(CaptureOutcome::Staged)
    }
}
