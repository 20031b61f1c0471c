//! Read-side access to persisted audit records.
//!
//! [`AuditQueryFacade`] validates date ranges, widens type filters to
//! concrete subtypes and hands the resulting [`auditlog_store::AuditFilter`]
//! to the configured store. Results come back newest first.

mod error;
mod facade;
mod request;

pub use error::{QueryError, Result};
pub use facade::AuditQueryFacade;
pub use request::{AuditQuery, Pagination};
