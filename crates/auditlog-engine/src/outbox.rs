//! Record batches waiting for a successful write.

use auditlog_types::AuditRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::warn;

/// Bounded queue of record batches whose persist step failed.
///
/// A batch holds every tree of one unit of work and is retried as a whole.
/// Capacity counts batches. When full, the oldest batch is dropped.
pub struct Outbox {
    capacity: usize,
    pending: Mutex<VecDeque<Vec<AuditRecord>>>,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a batch, returning the batch evicted to make room.
    pub fn push(&self, batch: Vec<AuditRecord>) -> Option<Vec<AuditRecord>> {
        let mut pending = self.pending.lock();
        let evicted = if pending.len() >= self.capacity {
            pending.pop_front()
        } else {
            None
        };
        if let Some(dropped) = &evicted {
            warn!(
                trees = dropped.len(),
                records = dropped.iter().map(AuditRecord::tree_size).sum::<usize>(),
                capacity = self.capacity,
                "audit outbox full; dropping oldest batch"
            );
        }
        pending.push_back(batch);
        evicted
    }

    /// Take every queued batch, oldest first.
    pub fn take_all(&self) -> Vec<Vec<AuditRecord>> {
        self.pending.lock().drain(..).collect()
    }

    /// Number of queued batches.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of record trees across all queued batches.
    pub fn trees(&self) -> usize {
        self.pending.lock().iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_types::{AuditAction, TypeId};
    use uuid::Uuid;

    fn tree() -> AuditRecord {
        AuditRecord::builder(TypeId::new("a.Concept"), Uuid::new_v4(), AuditAction::Created).build()
    }

    #[test]
    fn test_outbox_evicts_oldest_batch() {
        let outbox = Outbox::new(2);
        let first = vec![tree(), tree()];
        let first_uuid = first[0].uuid;
        assert!(outbox.push(first).is_none());
        assert!(outbox.push(vec![tree()]).is_none());
        assert_eq!(outbox.trees(), 3);

        let evicted = outbox.push(vec![tree()]).unwrap();
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].uuid, first_uuid);
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox.trees(), 2);

        assert_eq!(outbox.take_all().len(), 2);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_zero_capacity_still_keeps_latest() {
        let outbox = Outbox::new(0);
        outbox.push(vec![tree()]);
        outbox.push(vec![tree(), tree()]);
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox.trees(), 2);
        assert_eq!(outbox.capacity(), 1);
    }
}
