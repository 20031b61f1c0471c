//! Query requests.

use auditlog_types::{AuditAction, TypeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Offset and page size. A missing limit returns every remaining record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: Option<usize>,
}

/// A filtered read over audit records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Types to include, each widened to its concrete subtypes. Empty means all.
    #[serde(default)]
    pub types: Vec<TypeId>,
    /// Actions to include. Empty means all.
    #[serde(default)]
    pub actions: Vec<AuditAction>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Leave out records that hang under a parent record.
    #[serde(default)]
    pub exclude_child_records: bool,
    #[serde(default)]
    pub pagination: Pagination,
}

impl AuditQuery {
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

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn exclude_child_records(mut self, exclude: bool) -> Self {
        self.exclude_child_records = exclude;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.pagination = Pagination {
            offset,
            limit: Some(limit),
        };
        self
    }
}
