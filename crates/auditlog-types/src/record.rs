//! Persisted audit records.

use crate::{AuditAction, AuditActor, TypeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Serialized new and old text of one changed property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedChange {
    pub new: Option<String>,
    pub old: Option<String>,
}

impl SerializedChange {
    /// Create a change entry.
    pub fn new(new: Option<String>, old: Option<String>) -> Self {
        Self { new, old }
    }
}

/// An immutable audit record.
///
/// Records written by one unit of work form a tree: `children` are owned,
/// `parent` points back by uuid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned primary key, `None` until persisted.
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub type_id: TypeId,
    pub object_uuid: Uuid,
    pub action: AuditAction,
    pub actor: AuditActor,
    pub timestamp: DateTime<Utc>,
    pub tool_version: String,
    pub parent: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AuditRecord>,
    #[serde(default)]
    pub changes: BTreeMap<String, SerializedChange>,
}

impl AuditRecord {
    /// Create a new record builder.
    pub fn builder(type_id: TypeId, object_uuid: Uuid, action: AuditAction) -> AuditRecordBuilder {
        AuditRecordBuilder::new(type_id, object_uuid, action)
    }

    /// Whether this record has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Attach a child, pointing its parent back at this record.
    pub fn add_child(&mut self, mut child: AuditRecord) {
        child.parent = Some(self.uuid);
        self.children.push(child);
    }

    /// Number of records in this tree, this one included.
    pub fn tree_size(&self) -> usize {
        1 + self.children.iter().map(Self::tree_size).sum::<usize>()
    }

    /// Visit this record and its descendants, parents before children.
    pub fn walk(&self) -> Vec<&AuditRecord> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let node = out[i];
            out.extend(node.children.iter());
            i += 1;
        }
        out
    }

    /// Find a record by uuid within this tree.
    pub fn find(&self, uuid: Uuid) -> Option<&AuditRecord> {
        self.walk().into_iter().find(|r| r.uuid == uuid)
    }

    /// Copy of this record without its children.
    pub fn detached(&self) -> AuditRecord {
        AuditRecord {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// Builder for constructing audit records.
#[derive(Debug)]
pub struct AuditRecordBuilder {
    type_id: TypeId,
    object_uuid: Uuid,
    action: AuditAction,
    actor: Option<AuditActor>,
    timestamp: Option<DateTime<Utc>>,
    tool_version: Option<String>,
    changes: BTreeMap<String, SerializedChange>,
}

impl AuditRecordBuilder {
    /// Create a new builder.
    pub fn new(type_id: TypeId, object_uuid: Uuid, action: AuditAction) -> Self {
        Self {
            type_id,
            object_uuid,
            action,
            actor: None,
            timestamp: None,
            tool_version: None,
            changes: BTreeMap::new(),
        }
    }

    /// Set the acting user.
    pub fn actor(mut self, actor: AuditActor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set the timestamp (defaults to now).
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the tool version.
    pub fn tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = Some(version.into());
        self
    }

    /// Add one serialized change.
    pub fn change(
        mut self,
        property: impl Into<String>,
        new: Option<String>,
        old: Option<String>,
    ) -> Self {
        self.changes
            .insert(property.into(), SerializedChange::new(new, old));
        self
    }

    /// Replace all serialized changes.
    pub fn changes(mut self, changes: BTreeMap<String, SerializedChange>) -> Self {
        self.changes = changes;
        self
    }

    /// Build the record.
    pub fn build(self) -> AuditRecord {
        AuditRecord {
            id: None,
            uuid: Uuid::new_v4(),
            type_id: self.type_id,
            object_uuid: self.object_uuid,
            action: self.action,
            actor: self.actor.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            tool_version: self.tool_version.unwrap_or_default(),
            parent: None,
            children: Vec::new(),
            changes: self.changes,
        }
    }
}
