//! Audit policy resolution.
//!
//! [`StrategyResolver`] answers "is this type audited?" from an immutable
//! [`PolicySnapshot`] built from the configuration store and the type
//! graph. Snapshots are rebuilt lazily after a configuration change and
//! published atomically, so concurrent readers never see a half-built
//! policy.

mod error;
mod resolver;
mod snapshot;

pub use error::{Result, StrategyError};
pub use resolver::StrategyResolver;
pub use snapshot::{AuditedTypeSet, PolicySnapshot, Verdict};
