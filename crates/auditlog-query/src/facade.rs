//! The query facade.

use crate::error::{QueryError, Result};
use crate::request::{AuditQuery, Pagination};
use auditlog_metadata::TypeGraphResolver;
use auditlog_store::{AuditFilter, AuditRecordStore};
use auditlog_types::{AuditRecord, TypeId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Filtered reads over an [`AuditRecordStore`].
#[derive(Clone)]
pub struct AuditQueryFacade {
    store: Arc<dyn AuditRecordStore>,
    types: Arc<TypeGraphResolver>,
}

impl AuditQueryFacade {
    pub fn new(store: Arc<dyn AuditRecordStore>, types: Arc<TypeGraphResolver>) -> Self {
        Self { store, types }
    }

    /// Records matching `query`, most recent first.
    ///
    /// A start date in the future is rejected. An end date in the future
    /// places no upper bound on the result.
    pub fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        let filter = self.to_filter(query, Utc::now())?;
        let records = self.store.query(&filter)?;
        debug!(
            types = filter.types.len(),
            actions = filter.actions.len(),
            results = records.len(),
            "audit query"
        );
        Ok(records)
    }

    /// Number of records matching `query`, ignoring its pagination.
    pub fn count(&self, query: &AuditQuery) -> Result<usize> {
        let filter = self.to_filter(query, Utc::now())?.page(0, None);
        Ok(self.store.count(&filter)?)
    }

    /// Every record of one object, most recent first.
    ///
    /// `type_id` is widened to its subtypes so an object stored under a
    /// specialised type is still found through its base type.
    pub fn records_for_object(
        &self,
        type_id: &TypeId,
        object_uuid: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<AuditRecord>> {
        let filter = AuditFilter::new()
            .types(self.expand_types(std::slice::from_ref(type_id)))
            .object(object_uuid)
            .page(pagination.offset, pagination.limit);
        Ok(self.store.query(&filter)?)
    }

    pub fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<AuditRecord>> {
        Ok(self.store.find_by_uuid(uuid)?)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<AuditRecord>> {
        Ok(self.store.find_by_id(id)?)
    }

    fn to_filter(&self, query: &AuditQuery, now: DateTime<Utc>) -> Result<AuditFilter> {
        if let Some(start) = query.start {
            if start > now {
                return Err(QueryError::StartDateInFuture { start });
            }
        }
        let end = query.end.filter(|end| *end <= now);
        if let (Some(start), Some(end)) = (query.start, end) {
            if start > end {
                return Err(QueryError::InvertedRange { start, end });
            }
        }

        Ok(AuditFilter::new()
            .types(self.expand_types(&query.types))
            .actions(query.actions.iter().copied())
            .between(query.start, end)
            .roots_only(query.exclude_child_records)
            .page(query.pagination.offset, query.pagination.limit))
    }

    fn expand_types(&self, types: &[TypeId]) -> BTreeSet<TypeId> {
        let mut expanded = BTreeSet::new();
        for type_id in types {
            expanded.insert(type_id.clone());
            match self.types.concrete_subtypes(type_id) {
                Ok(subtypes) => expanded.extend(subtypes),
                Err(e) => warn!(type_id = %type_id, error = %e, "querying unknown type by name only"),
            }
        }
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_store::MemoryAuditStore;
    use auditlog_test_utils::{fixture_resolver, t, types};
    use chrono::Duration;

    fn facade() -> AuditQueryFacade {
        AuditQueryFacade::new(Arc::new(MemoryAuditStore::new()), fixture_resolver())
    }

    #[test]
    fn test_future_end_is_dropped() {
        let now = Utc::now();
        let query = AuditQuery::new().end(now + Duration::minutes(1));
        let filter = facade().to_filter(&query, now).unwrap();
        assert_eq!(filter.end, None);
    }

    #[test]
    fn test_past_end_is_kept() {
        let now = Utc::now();
        let end = now - Duration::hours(1);
        let filter = facade().to_filter(&AuditQuery::new().end(end), now).unwrap();
        assert_eq!(filter.end, Some(end));
    }

    #[test]
    fn test_start_now_is_accepted() {
        let now = Utc::now();
        assert!(facade().to_filter(&AuditQuery::new().start(now), now).is_ok());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let now = Utc::now();
        let query = AuditQuery::new()
            .start(now - Duration::hours(1))
            .end(now - Duration::hours(2));
        assert!(matches!(
            facade().to_filter(&query, now),
            Err(QueryError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_types_widen_to_subtypes() {
        let expanded = facade().expand_types(&[t(types::PERSON), t("org.example.Unknown")]);
        assert!(expanded.contains(&t(types::PERSON)));
        assert!(expanded.contains(&t(types::PATIENT)));
        assert!(expanded.contains(&t("org.example.Unknown")));
        assert!(!expanded.contains(&t(types::PERSON_NAME)));
    }
}
