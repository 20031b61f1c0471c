//! Audit record storage.
//!
//! Record trees are written atomically: either every record of every tree
//! in a batch is stored or none is. Two backends are provided:
//!
//! - [`MemoryAuditStore`] for tests and embedded use
//! - [`SqliteAuditStore`] backed by a single `audit_records` table

mod error;
mod filter;
mod memory;
mod sqlite;

pub use error::{Result, StoreError};
pub use filter::AuditFilter;
pub use memory::MemoryAuditStore;
pub use sqlite::SqliteAuditStore;

use auditlog_common_config::{StoreBackend, StoreSettings};
use auditlog_types::AuditRecord;
use std::sync::Arc;
use uuid::Uuid;

/// Persistence for audit record trees.
pub trait AuditRecordStore: Send + Sync {
    /// Store a record tree in one atomic write and return it with ids
    /// assigned.
    fn save(&self, root: AuditRecord) -> Result<AuditRecord> {
        let uuid = root.uuid;
        self.save_all(vec![root])?
            .pop()
            .ok_or_else(|| StoreError::Corrupt(format!("record {uuid} was not returned by save")))
    }

    /// Store several record trees in one atomic write, in order.
    ///
    /// A duplicate uuid anywhere in the batch, including between two of
    /// its trees, stores nothing.
    fn save_all(&self, roots: Vec<AuditRecord>) -> Result<Vec<AuditRecord>>;

    /// Load a record and its descendants by primary key.
    fn find_by_id(&self, id: i64) -> Result<Option<AuditRecord>>;

    /// Load a record and its descendants by uuid.
    fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<AuditRecord>>;

    /// Records matching `filter`, newest first, each with its descendants.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>>;

    /// Number of records matching `filter`, ignoring offset and limit.
    fn count(&self, filter: &AuditFilter) -> Result<usize>;

    /// Delete a record and all of its descendants. Returns how many
    /// records were removed.
    fn purge(&self, uuid: Uuid) -> Result<usize>;
}

/// Open the store selected by configuration.
pub fn open_store(settings: &StoreSettings) -> Result<Arc<dyn AuditRecordStore>> {
    match settings.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryAuditStore::new())),
        StoreBackend::Sqlite => {
            let path = settings
                .sqlite_path
                .as_deref()
                .ok_or(StoreError::MissingPath)?;
            Ok(Arc::new(SqliteAuditStore::open(path)?))
        }
    }
}
