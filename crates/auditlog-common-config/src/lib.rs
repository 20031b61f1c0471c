//! Configuration for the audit log.
//!
//! Two kinds of configuration live here:
//!
//! - the static `.auditlog/config.yaml` file ([`AuditLogConfig`]), loaded
//!   once at startup by [`ConfigLoader`]
//! - the live key/value [`ConfigStore`] holding the audit policy, which
//!   notifies subscribers whenever a key changes

pub mod env;
pub mod loader;
pub mod store;
pub mod types;

pub use env::*;
pub use loader::*;
pub use store::*;
pub use types::*;
