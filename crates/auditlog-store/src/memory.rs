//! In-memory audit record store.

use crate::filter::{newest_first, AuditFilter};
use crate::{AuditRecordStore, Result, StoreError};
use auditlog_types::AuditRecord;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    next_id: i64,
    /// Records without children, by id.
    rows: BTreeMap<i64, AuditRecord>,
    by_uuid: HashMap<Uuid, i64>,
    children: HashMap<Uuid, Vec<i64>>,
}

impl Tables {
    fn load(&self, id: i64) -> Option<AuditRecord> {
        let mut record = self.rows.get(&id)?.clone();
        if let Some(child_ids) = self.children.get(&record.uuid) {
            record.children = child_ids.iter().filter_map(|id| self.load(*id)).collect();
        }
        Some(record)
    }

    fn matching(&self, filter: &AuditFilter) -> Vec<&AuditRecord> {
        let mut rows: Vec<&AuditRecord> = self.rows.values().filter(|r| filter.matches(r)).collect();
        rows.sort_by(|a, b| newest_first(a, b));
        rows
    }
}

/// Audit store keeping everything in process memory.
#[derive(Default)]
pub struct MemoryAuditStore {
    tables: RwLock<Tables>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.tables.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditRecordStore for MemoryAuditStore {
    fn save_all(&self, mut roots: Vec<AuditRecord>) -> Result<Vec<AuditRecord>> {
        let mut tables = self.tables.write();

        let mut seen = HashSet::new();
        for record in roots.iter().flat_map(|root| root.walk()) {
            if tables.by_uuid.contains_key(&record.uuid) || !seen.insert(record.uuid) {
                return Err(StoreError::Duplicate(record.uuid));
            }
        }

        for root in &mut roots {
            assign_ids(root, &mut tables);
        }
        Ok(roots)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<AuditRecord>> {
        Ok(self.tables.read().load(id))
    }

    fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<AuditRecord>> {
        let tables = self.tables.read();
        Ok(tables.by_uuid.get(&uuid).and_then(|id| tables.load(*id)))
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let tables = self.tables.read();
        let ids: Vec<i64> = tables
            .matching(filter)
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .filter_map(|r| r.id)
            .collect();
        Ok(ids.into_iter().filter_map(|id| tables.load(id)).collect())
    }

    fn count(&self, filter: &AuditFilter) -> Result<usize> {
        Ok(self.tables.read().matching(filter).len())
    }

    fn purge(&self, uuid: Uuid) -> Result<usize> {
        let mut tables = self.tables.write();
        let Some(id) = tables.by_uuid.get(&uuid).copied() else {
            return Ok(0);
        };

        if let Some(parent) = tables.rows.get(&id).and_then(|r| r.parent) {
            if let Some(siblings) = tables.children.get_mut(&parent) {
                siblings.retain(|sibling| *sibling != id);
            }
        }

        let mut pending = vec![id];
        let mut removed = 0;
        while let Some(id) = pending.pop() {
            if let Some(record) = tables.rows.remove(&id) {
                tables.by_uuid.remove(&record.uuid);
                if let Some(children) = tables.children.remove(&record.uuid) {
                    pending.extend(children);
                }
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn assign_ids(record: &mut AuditRecord, tables: &mut Tables) {
    tables.next_id += 1;
    let id = tables.next_id;
    record.id = Some(id);
    tables.by_uuid.insert(record.uuid, id);
    if let Some(parent) = record.parent {
        tables.children.entry(parent).or_default().push(id);
    }
    tables.rows.insert(id, record.detached());

    for child in &mut record.children {
        child.parent = Some(record.uuid);
        assign_ids(child, tables);
    }
}
