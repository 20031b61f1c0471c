//! Persistence metadata and type-graph resolution.
//!
//! The host persistence layer describes its types through a
//! [`MetadataCatalog`]. [`TypeGraphResolver`] compiles that catalog once
//! into an arena-backed [`TypeGraph`] and answers containment and subtype
//! queries from it.

mod catalog;
mod graph;
mod resolver;

pub use catalog::{
    Association, InMemoryCatalog, InMemoryCatalogBuilder, MetadataCatalog, PropertyDescriptor,
    TypeDescriptor, TypeKind,
};
pub use graph::{ContainmentEdge, TypeGraph};
pub use resolver::TypeGraphResolver;

use auditlog_types::TypeId;
use thiserror::Error;

/// Metadata lookup errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The type is not known to the metadata catalog.
    #[error("unknown type: {0}")]
    UnknownType(TypeId),
}

/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;
