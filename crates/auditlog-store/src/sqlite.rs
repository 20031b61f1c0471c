//! SQLite audit record store.

use crate::filter::AuditFilter;
use crate::{AuditRecordStore, Result, StoreError};
use auditlog_types::{AuditAction, AuditActor, AuditRecord, SerializedChange, TypeId};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const COLUMNS: &str =
    "id, uuid, type, object_uuid, action, actor, timestamp, tool_version, parent_uuid, changes";

/// Audit store backed by SQLite.
pub struct SqliteAuditStore {
    conn: Arc<Mutex<Connection>>,
}

/// One row before decoding.
struct RawRecord {
    id: i64,
    uuid: String,
    type_id: String,
    object_uuid: String,
    action: String,
    actor: String,
    timestamp: String,
    tool_version: String,
    parent: Option<String>,
    changes: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            uuid: row.get(1)?,
            type_id: row.get(2)?,
            object_uuid: row.get(3)?,
            action: row.get(4)?,
            actor: row.get(5)?,
            timestamp: row.get(6)?,
            tool_version: row.get(7)?,
            parent: row.get(8)?,
            changes: row.get(9)?,
        })
    }

    fn decode(self) -> Result<AuditRecord> {
        let changes: BTreeMap<String, SerializedChange> = serde_json::from_str(&self.changes)?;
        let actor: AuditActor = serde_json::from_str(&self.actor)?;
        Ok(AuditRecord {
            id: Some(self.id),
            uuid: parse_uuid(&self.uuid)?,
            type_id: TypeId::new(self.type_id),
            object_uuid: parse_uuid(&self.object_uuid)?,
            action: AuditAction::from_str(&self.action)
                .map_err(|_| StoreError::Corrupt(format!("unknown action {}", self.action)))?,
            actor,
            timestamp: DateTime::parse_from_rfc3339(&self.timestamp)
                .map_err(|e| StoreError::Corrupt(format!("bad timestamp {}: {e}", self.timestamp)))?
                .with_timezone(&Utc),
            tool_version: self.tool_version,
            parent: self.parent.as_deref().map(parse_uuid).transpose()?,
            children: Vec::new(),
            changes,
        })
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("bad uuid {value}: {e}")))
}

/// Fixed-width UTC form, so text order equals time order.
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl SqliteAuditStore {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// A private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// Use a connection shared with the host.
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Create the audit table and its indexes.
    pub fn init_tables(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL,
                object_uuid TEXT NOT NULL,
                action TEXT NOT NULL,
                actor TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                tool_version TEXT NOT NULL,
                parent_uuid TEXT REFERENCES audit_records(uuid),
                changes TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_records_timestamp ON audit_records(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_records_object ON audit_records(object_uuid);
            CREATE INDEX IF NOT EXISTS idx_audit_records_parent ON audit_records(parent_uuid);",
        )?;
        Ok(())
    }

    fn load_tree(conn: &Connection, raw: RawRecord) -> Result<AuditRecord> {
        let mut record = raw.decode()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {COLUMNS} FROM audit_records WHERE parent_uuid = ?1 ORDER BY id"
        ))?;
        let children = stmt
            .query_map([record.uuid.to_string()], RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        for child in children {
            record.children.push(Self::load_tree(conn, child)?);
        }
        Ok(record)
    }

    fn find_where(&self, clause: &str, param: &dyn ToSql) -> Result<Option<AuditRecord>> {
        let conn = self.conn.lock();
        let params: &[&dyn ToSql] = &[param];
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM audit_records WHERE {clause}"),
                params,
                RawRecord::from_row,
            )
            .optional()?;
        raw.map(|raw| Self::load_tree(&conn, raw)).transpose()
    }
}

/// WHERE clause and parameters for a filter.
fn where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if !filter.types.is_empty() {
        let placeholders = vec!["?"; filter.types.len()].join(",");
        conditions.push(format!("type IN ({placeholders})"));
        params.extend(
            filter
                .types
                .iter()
                .map(|t| Box::new(t.as_str().to_string()) as Box<dyn ToSql>),
        );
    }
    if !filter.actions.is_empty() {
        let placeholders = vec!["?"; filter.actions.len()].join(",");
        conditions.push(format!("action IN ({placeholders})"));
        params.extend(
            filter
                .actions
                .iter()
                .map(|a| Box::new(a.to_string()) as Box<dyn ToSql>),
        );
    }
    if let Some(uuid) = filter.object_uuid {
        conditions.push("object_uuid = ?".to_string());
        params.push(Box::new(uuid.to_string()));
    }
    if let Some(start) = &filter.start {
        conditions.push("timestamp >= ?".to_string());
        params.push(Box::new(format_timestamp(start)));
    }
    if let Some(end) = &filter.end {
        conditions.push("timestamp <= ?".to_string());
        params.push(Box::new(format_timestamp(end)));
    }
    if filter.roots_only {
        conditions.push("parent_uuid IS NULL".to_string());
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (clause, params)
}

impl AuditRecordStore for SqliteAuditStore {
    fn save_all(&self, mut roots: Vec<AuditRecord>) -> Result<Vec<AuditRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO audit_records
                 (uuid, type, object_uuid, action, actor, timestamp, tool_version, parent_uuid, changes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            let mut pending: Vec<&mut AuditRecord> = roots.iter_mut().rev().collect();
            while let Some(record) = pending.pop() {
                let result = insert.execute(params![
                    record.uuid.to_string(),
                    record.type_id.as_str(),
                    record.object_uuid.to_string(),
                    record.action.to_string(),
                    serde_json::to_string(&record.actor)?,
                    format_timestamp(&record.timestamp),
                    &record.tool_version,
                    record.parent.map(|p| p.to_string()),
                    serde_json::to_string(&record.changes)?,
                ]);
                match result {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        return Err(StoreError::Duplicate(record.uuid));
                    }
                    Err(e) => return Err(e.into()),
                }
                record.id = Some(tx.last_insert_rowid());

                let parent = record.uuid;
                for child in record.children.iter_mut().rev() {
                    child.parent = Some(parent);
                    pending.push(child);
                }
            }
        }
        tx.commit()?;
        debug!(
            trees = roots.len(),
            records = roots.iter().map(AuditRecord::tree_size).sum::<usize>(),
            "audit records stored"
        );
        Ok(roots)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<AuditRecord>> {
        self.find_where("id = ?1", &id)
    }

    fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<AuditRecord>> {
        self.find_where("uuid = ?1", &uuid.to_string())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let (clause, mut params) = where_clause(filter);
        let limit = filter.limit.map_or(-1, |l| l as i64);
        params.push(Box::new(limit));
        params.push(Box::new(filter.offset as i64));
        let sql = format!(
            "SELECT {COLUMNS} FROM audit_records {clause}
             ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
        );

        let conn = self.conn.lock();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let raws = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(param_refs.as_slice(), RawRecord::from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        raws.into_iter()
            .map(|raw| Self::load_tree(&conn, raw))
            .collect()
    }

    fn count(&self, filter: &AuditFilter) -> Result<usize> {
        let (clause, params) = where_clause(filter);
        let conn = self.conn.lock();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM audit_records {clause}"),
            param_refs.as_slice(),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn purge(&self, uuid: Uuid) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "WITH RECURSIVE tree(uuid) AS (
                SELECT uuid FROM audit_records WHERE uuid = ?1
                UNION ALL
                SELECT r.uuid FROM audit_records r JOIN tree t ON r.parent_uuid = t.uuid
            )
            DELETE FROM audit_records WHERE uuid IN (SELECT uuid FROM tree)",
            [uuid.to_string()],
        )?;
        tx.commit()?;
        Ok(removed)
    }
}
