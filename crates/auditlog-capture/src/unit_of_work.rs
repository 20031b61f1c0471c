//! Per-transaction staging arena.

use crate::{CaptureError, FieldDiffer, Result};
use auditlog_types::{
    AuditAction, AuditActor, ChangeCandidate, EntityState, ObjectRef, PropertyValue, UnitOfWorkId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::trace;
use uuid::Uuid;

/// An object the unit of work wrote without producing a change.
#[derive(Debug, Clone)]
pub struct TouchedObject {
    pub object: ObjectRef,
    pub before: Option<EntityState>,
    pub after: Option<EntityState>,
}

impl TouchedObject {
    /// The most recent snapshot available.
    pub fn latest_state(&self) -> Option<&EntityState> {
        self.after.as_ref().or(self.before.as_ref())
    }
}

/// Everything staged by one unit of work, in first-touch order.
#[derive(Debug, Default)]
pub struct StagedChanges {
    pub candidates: Vec<ChangeCandidate>,
    /// Objects written without any audited difference.
    pub touched: Vec<TouchedObject>,
}

impl StagedChanges {
    /// Whether nothing will be recorded.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Default)]
struct Staging {
    order: Vec<Uuid>,
    candidates: HashMap<Uuid, ChangeCandidate>,
    touched: HashMap<Uuid, TouchedObject>,
    drained: bool,
}

/// One logical transaction of the host.
///
/// Staging is owned by this value rather than by the calling thread, so a
/// unit of work may be driven from any thread. Units of work never share
/// staging.
pub struct UnitOfWork {
    id: UnitOfWorkId,
    actor: AuditActor,
    started_at: DateTime<Utc>,
    staging: Mutex<Staging>,
}

impl UnitOfWork {
    /// Start a unit of work on behalf of `actor`.
    pub fn new(actor: AuditActor) -> Self {
        Self::with_id(UnitOfWorkId::new(), actor)
    }

    /// Start a unit of work with a caller-chosen id.
    pub fn with_id(id: UnitOfWorkId, actor: AuditActor) -> Self {
        Self {
            id,
            actor,
            started_at: Utc::now(),
            staging: Mutex::new(Staging::default()),
        }
    }

    pub fn id(&self) -> UnitOfWorkId {
        self.id
    }

    pub fn actor(&self) -> &AuditActor {
        &self.actor
    }

    /// Timestamp shared by every record of this unit of work.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stage a candidate, merging it with an earlier touch of the same
    /// object. Merged values are compared strictly.
    pub fn stage(&self, candidate: ChangeCandidate) -> Result<()> {
        self.stage_merging(candidate, PropertyValue::same_as)
    }

    /// Stage a candidate, dropping merged deltas that `differ` considers
    /// unchanged.
    pub fn stage_with(&self, candidate: ChangeCandidate, differ: &FieldDiffer) -> Result<()> {
        self.stage_merging(candidate, |old, new| differ.equivalent(old, new))
    }

    fn stage_merging<F>(&self, candidate: ChangeCandidate, equivalent: F) -> Result<()>
    where
        F: Fn(&PropertyValue, &PropertyValue) -> bool,
    {
        let mut staging = self.staging.lock();
        if staging.drained {
            return Err(CaptureError::UnitOfWorkClosed(self.id));
        }

        let uuid = candidate.object.uuid;
        let merged = match staging.candidates.remove(&uuid) {
            Some(mut earlier) => {
                earlier.absorb_with(candidate, equivalent);
                earlier
            }
            None => match staging.touched.remove(&uuid) {
                Some(touched) => {
                    let mut merged = candidate;
                    merged.before = merged.before.or(touched.before);
                    merged
                }
                None => {
                    staging.order.push(uuid);
                    candidate
                }
            },
        };

        if merged.is_noop() {
            trace!(object = %uuid, "changes cancelled out");
            staging.touched.insert(
                uuid,
                TouchedObject {
                    object: merged.object,
                    before: merged.before,
                    after: merged.after,
                },
            );
        } else {
            staging.candidates.insert(uuid, merged);
        }
        Ok(())
    }

    /// Remember an object written without an audited difference.
    pub fn touch(
        &self,
        object: ObjectRef,
        before: Option<EntityState>,
        after: Option<EntityState>,
    ) -> Result<()> {
        let mut staging = self.staging.lock();
        if staging.drained {
            return Err(CaptureError::UnitOfWorkClosed(self.id));
        }

        let uuid = object.uuid;
        if let Some(candidate) = staging.candidates.get_mut(&uuid) {
            if after.is_some() && candidate.action != AuditAction::Deleted {
                candidate.after = after;
            }
            return Ok(());
        }
        match staging.touched.get_mut(&uuid) {
            Some(existing) => {
                if existing.before.is_none() {
                    existing.before = before;
                }
                if after.is_some() {
                    existing.after = after;
                }
            }
            None => {
                staging.order.push(uuid);
                staging.touched.insert(uuid, TouchedObject { object, before, after });
            }
        }
        Ok(())
    }

    /// Number of objects with a pending change.
    pub fn staged_len(&self) -> usize {
        self.staging.lock().candidates.len()
    }

    /// The pending candidate for an object, if any.
    pub fn candidate(&self, uuid: Uuid) -> Option<ChangeCandidate> {
        self.staging.lock().candidates.get(&uuid).cloned()
    }

    /// Whether [`drain`](Self::drain) has been called.
    pub fn is_drained(&self) -> bool {
        self.staging.lock().drained
    }

    /// Take everything staged and close the unit of work.
    ///
    /// Later calls return an empty set.
    pub fn drain(&self) -> StagedChanges {
        let mut staging = self.staging.lock();
        let Staging {
            order,
            mut candidates,
            mut touched,
            ..
        } = std::mem::take(&mut *staging);
        staging.drained = true;

        let mut out = StagedChanges::default();
        for uuid in order {
            if let Some(candidate) = candidates.remove(&uuid) {
                out.candidates.push(candidate);
            } else if let Some(object) = touched.remove(&uuid) {
                out.touched.push(object);
            }
        }
        out
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("actor", &self.actor)
            .field("started_at", &self.started_at)
            .field("staged", &self.staged_len())
            .finish()
    }
}
