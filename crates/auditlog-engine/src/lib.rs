//! The audit engine.
//!
//! [`AuditEngine`] ties together change capture, record assembly and the
//! record store. The host calls [`LifecycleHooks::before_commit`] for every
//! write of a unit of work and [`LifecycleHooks::after_commit`] once its own
//! transaction has finished. Audit persistence is best-effort: a failed
//! write is logged and kept in an outbox, never reported to the host.

mod assembler;
mod engine;
mod error;
mod outbox;
pub mod serialize;

pub use assembler::{AuditRecordAssembler, RecordContext};
pub use engine::{AuditEngine, FlushReport, LifecycleHooks, TOOL_VERSION};
pub use error::{EngineError, Result};
pub use outbox::Outbox;
