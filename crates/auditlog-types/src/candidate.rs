//! Transient change candidates.

use crate::{AuditAction, EntityState, ObjectRef, PropertyValue};
use std::collections::BTreeMap;

/// Raw before/after values of one changed property.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDelta {
    pub new: PropertyValue,
    pub old: PropertyValue,
}

impl FieldDelta {
    /// Create a delta.
    pub fn new(new: PropertyValue, old: PropertyValue) -> Self {
        Self { new, old }
    }
}

/// One staged create, update or delete, pending assembly.
///
/// Lives only for one unit of work. The snapshots are kept so that the
/// assembler can discover containment between staged objects.
#[derive(Debug, Clone)]
pub struct ChangeCandidate {
    pub object: ObjectRef,
    pub action: AuditAction,
    pub deltas: BTreeMap<String, FieldDelta>,
    pub before: Option<EntityState>,
    pub after: Option<EntityState>,
}

impl ChangeCandidate {
    /// Create a candidate without deltas.
    pub fn new(object: ObjectRef, action: AuditAction) -> Self {
        Self {
            object,
            action,
            deltas: BTreeMap::new(),
            before: None,
            after: None,
        }
    }

    /// Attach field deltas.
    pub fn with_deltas(mut self, deltas: BTreeMap<String, FieldDelta>) -> Self {
        self.deltas = deltas;
        self
    }

    /// Attach snapshots.
    pub fn with_states(mut self, before: Option<EntityState>, after: Option<EntityState>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// The most recent snapshot available.
    pub fn latest_state(&self) -> Option<&EntityState> {
        self.after.as_ref().or(self.before.as_ref())
    }

    /// Merge a later touch of the same object into this candidate,
    /// comparing values strictly.
    pub fn absorb(&mut self, later: ChangeCandidate) {
        self.absorb_with(later, PropertyValue::same_as)
    }

    /// Merge a later touch of the same object into this candidate.
    ///
    /// Creations carry no deltas and deletions keep only the later
    /// deltas. For updates, deltas keep the earliest old value and the
    /// latest new value; a delta whose net old and new values are
    /// `equivalent` is dropped.
    pub fn absorb_with<F>(&mut self, later: ChangeCandidate, equivalent: F)
    where
        F: Fn(&PropertyValue, &PropertyValue) -> bool,
    {
        self.action = self.action.coalesce(later.action);
        match self.action {
            AuditAction::Created => self.deltas.clear(),
            AuditAction::Deleted => self.deltas = later.deltas,
            AuditAction::Updated => {
                for (name, delta) in later.deltas {
                    match self.deltas.remove(&name) {
                        Some(earlier) => {
                            if !equivalent(&earlier.old, &delta.new) {
                                self.deltas
                                    .insert(name, FieldDelta::new(delta.new, earlier.old));
                            }
                        }
                        None => {
                            self.deltas.insert(name, delta);
                        }
                    }
                }
            }
        }
        if self.before.is_none() {
            self.before = later.before;
        }
        if later.after.is_some() || later.action == AuditAction::Deleted {
            self.after = later.after;
        }
    }

    /// Whether an update candidate has nothing left to report.
    pub fn is_noop(&self) -> bool {
        self.action == AuditAction::Updated && self.deltas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn delta(new: &str, old: &str) -> FieldDelta {
        FieldDelta::new(PropertyValue::text(new), PropertyValue::text(old))
    }

    fn updated(deltas: &[(&str, FieldDelta)]) -> ChangeCandidate {
        ChangeCandidate::new(ObjectRef::new("a.Concept", Uuid::nil()), AuditAction::Updated)
            .with_deltas(deltas.iter().cloned().map(|(k, d)| (k.to_string(), d)).collect())
    }

    #[test]
    fn test_absorb_keeps_earliest_old_value() {
        let mut first = updated(&[("name", delta("b", "a"))]);
        first.absorb(updated(&[("name", delta("c", "b"))]));
        assert_eq!(first.deltas["name"], delta("c", "a"));
    }

    #[test]
    fn test_absorb_drops_reverted_delta() {
        let mut first = updated(&[("name", delta("b", "a"))]);
        first.absorb(updated(&[("name", delta("a", "b"))]));
        assert!(first.deltas.is_empty());
        assert!(first.is_noop());
    }

    #[test]
    fn test_absorb_with_custom_equivalence() {
        let same_ignoring_case = |a: &PropertyValue, b: &PropertyValue| {
            a.as_text().map(str::to_lowercase) == b.as_text().map(str::to_lowercase)
        };
        let mut first = updated(&[("name", delta("y", "x"))]);
        first.absorb_with(updated(&[("name", delta("X", "y"))]), same_ignoring_case);
        assert!(first.is_noop());

        let mut strict = updated(&[("name", delta("y", "x"))]);
        strict.absorb(updated(&[("name", delta("X", "y"))]));
        assert_eq!(strict.deltas["name"], delta("X", "x"));
    }

    #[test]
    fn test_absorb_created_then_updated() {
        let object = ObjectRef::new("a.Concept", Uuid::nil());
        let mut first = ChangeCandidate::new(object.clone(), AuditAction::Created);
        first.absorb(ChangeCandidate::new(object, AuditAction::Updated));
        assert_eq!(first.action, AuditAction::Created);
        assert!(!first.is_noop());
    }
}
