//! Immutable policy snapshots.

use auditlog_types::{AuditPolicy, TypeId};
use dashmap::DashMap;
use std::collections::BTreeSet;

/// How a type is covered by the active policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Audited because the policy names or admits it.
    Explicit,
    /// Audited only because an audited type contains it.
    Implicit,
    /// Not audited.
    NotAudited,
}

impl Verdict {
    /// Whether records should be written for this type.
    pub fn is_audited(&self) -> bool {
        !matches!(self, Self::NotAudited)
    }
}

/// Explicitly and implicitly audited types among the mapped types.
///
/// The two sets are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditedTypeSet {
    pub explicit: BTreeSet<TypeId>,
    pub implicit: BTreeSet<TypeId>,
}

impl AuditedTypeSet {
    /// Whether a type is in either set.
    pub fn contains(&self, type_id: &TypeId) -> bool {
        self.explicit.contains(type_id) || self.implicit.contains(type_id)
    }
}

/// A fully built view of the policy, never mutated after publication
/// except for the lookup memo.
#[derive(Debug)]
pub struct PolicySnapshot {
    generation: u64,
    policy: AuditPolicy,
    types: AuditedTypeSet,
    verdicts: DashMap<TypeId, Verdict>,
}

impl PolicySnapshot {
    pub(crate) fn new(generation: u64, policy: AuditPolicy, types: AuditedTypeSet) -> Self {
        Self {
            generation,
            policy,
            types,
            verdicts: DashMap::new(),
        }
    }

    /// Configuration generation this snapshot was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The policy.
    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// Audited mapped types.
    pub fn audited_types(&self) -> &AuditedTypeSet {
        &self.types
    }

    /// Implicitly audited types.
    pub fn implicit(&self) -> &BTreeSet<TypeId> {
        &self.types.implicit
    }

    /// Coverage of a type, memoized per snapshot.
    pub fn verdict(&self, type_id: &TypeId) -> Verdict {
        if let Some(v) = self.verdicts.get(type_id) {
            return *v;
        }
        let verdict = if self.policy.audits(type_id) {
            Verdict::Explicit
        } else if !type_id.is_reserved() && self.types.implicit.contains(type_id) {
            Verdict::Implicit
        } else {
            Verdict::NotAudited
        };
        self.verdicts.insert(type_id.clone(), verdict);
        verdict
    }

    /// Number of memoized lookups.
    pub fn memoized(&self) -> usize {
        self.verdicts.len()
    }
}
