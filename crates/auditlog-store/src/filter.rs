//! Record filters shared by the stores.

use auditlog_types::{AuditAction, AuditRecord, TypeId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Selection of stored records. Empty sets mean "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub types: BTreeSet<TypeId>,
    pub actions: BTreeSet<AuditAction>,
    pub object_uuid: Option<Uuid>,
    /// Inclusive lower bound on the record timestamp.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the record timestamp.
    pub end: Option<DateTime<Utc>>,
    /// Only records without a parent.
    pub roots_only: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl AuditFilter {
    /// A filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(mut self, types: impl IntoIterator<Item = TypeId>) -> Self {
        self.types.extend(types);
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = AuditAction>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn object(mut self, uuid: Uuid) -> Self {
        self.object_uuid = Some(uuid);
        self
    }

    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn roots_only(mut self, roots_only: bool) -> Self {
        self.roots_only = roots_only;
        self
    }

    pub fn page(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Whether a single record matches, ignoring paging.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        (self.types.is_empty() || self.types.contains(&record.type_id))
            && (self.actions.is_empty() || self.actions.contains(&record.action))
            && self.object_uuid.map_or(true, |uuid| record.object_uuid == uuid)
            && self.start.map_or(true, |start| record.timestamp >= start)
            && self.end.map_or(true, |end| record.timestamp <= end)
            && (!self.roots_only || record.is_root())
    }
}

/// Newest first; ids break timestamp ties.
pub(crate) fn newest_first(a: &AuditRecord, b: &AuditRecord) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(action: AuditAction) -> AuditRecord {
        AuditRecord::builder(TypeId::new("a.Concept"), Uuid::new_v4(), action).build()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(AuditFilter::new().matches(&record(AuditAction::Deleted)));
    }

    #[test]
    fn test_filter_dimensions() {
        let r = record(AuditAction::Updated);
        assert!(AuditFilter::new().actions([AuditAction::Updated]).matches(&r));
        assert!(!AuditFilter::new().actions([AuditAction::Created]).matches(&r));
        assert!(!AuditFilter::new().types([TypeId::new("a.Other")]).matches(&r));
        assert!(AuditFilter::new().object(r.object_uuid).matches(&r));

        let later = r.timestamp + Duration::minutes(1);
        assert!(!AuditFilter::new().between(Some(later), None).matches(&r));
        assert!(AuditFilter::new().between(None, Some(later)).matches(&r));
        assert!(AuditFilter::new().between(Some(r.timestamp), Some(r.timestamp)).matches(&r));
    }

    #[test]
    fn test_roots_only() {
        let mut root = record(AuditAction::Updated);
        root.add_child(record(AuditAction::Created));
        let filter = AuditFilter::new().roots_only(true);
        assert!(filter.matches(&root));
        assert!(!filter.matches(&root.children[0]));
    }
}
