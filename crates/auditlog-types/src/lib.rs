//! Core types for the change-audit engine.
//!
//! Everything that crosses a crate boundary lives here:
//!
//! - Entity type identifiers and the reserved audit-record type
//! - The audit policy sum type
//! - Property values and entity snapshots handed over by the host
//! - Transient change candidates and persisted audit records

mod action;
mod actor;
mod candidate;
mod id;
mod policy;
mod record;
mod state;
mod type_id;
mod value;

pub use action::AuditAction;
pub use actor::AuditActor;
pub use candidate::{ChangeCandidate, FieldDelta};
pub use id::{IdParseError, UnitOfWorkId, UserId};
pub use policy::{AuditPolicy, PolicyKind, PolicyKindParseError};
pub use record::{AuditRecord, AuditRecordBuilder, SerializedChange};
pub use state::{EntityState, ObjectRef};
pub use type_id::{TypeId, AUDIT_RECORD_TYPE};
pub use value::{EntityRef, PersistentRef, PropertyValue};
