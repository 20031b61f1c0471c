//! Change capture for the audit engine.
//!
//! The host's write hooks hand every create, update and delete to
//! [`ChangeCaptureEngine::before_commit`] together with the explicit
//! [`UnitOfWork`] it belongs to. The engine filters out unaudited types
//! and changes that are only noise, and stages what is left. Nothing is
//! written here; the staged candidates are drained by the assembler once
//! the host commits.

mod diff;
mod engine;
mod error;
mod unit_of_work;

pub use diff::FieldDiffer;
pub use engine::{CaptureOutcome, ChangeCaptureEngine, EntityWrite};
pub use error::{CaptureError, Result};
pub use unit_of_work::{StagedChanges, TouchedObject, UnitOfWork};
