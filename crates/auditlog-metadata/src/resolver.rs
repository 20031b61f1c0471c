//! Containment and subtype queries over the type graph.

use crate::catalog::MetadataCatalog;
use crate::graph::TypeGraph;
use crate::{MetadataError, Result};
use auditlog_types::TypeId;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Answers containment and subtype questions for the audit policy.
///
/// Queries are not memoized here; callers cache what they need. The graph
/// itself is rebuilt only through [`TypeGraphResolver::rebuild`].
pub struct TypeGraphResolver {
    catalog: Arc<dyn MetadataCatalog>,
    graph: RwLock<Arc<TypeGraph>>,
}

impl TypeGraphResolver {
    /// Build a resolver over a catalog.
    pub fn new(catalog: Arc<dyn MetadataCatalog>) -> Self {
        let graph = Arc::new(TypeGraph::build(catalog.as_ref()));
        Self {
            catalog,
            graph: RwLock::new(graph),
        }
    }

    /// Recompile the graph after the catalog changed.
    pub fn rebuild(&self) {
        let graph = Arc::new(TypeGraph::build(self.catalog.as_ref()));
        *self.graph.write() = graph;
        debug!("type graph rebuilt");
    }

    /// The current compiled graph.
    pub fn graph(&self) -> Arc<TypeGraph> {
        Arc::clone(&self.graph.read())
    }

    /// The catalog behind this resolver.
    pub fn catalog(&self) -> &Arc<dyn MetadataCatalog> {
        &self.catalog
    }

    /// Whether the catalog maps this type.
    pub fn is_known(&self, type_id: &TypeId) -> bool {
        self.graph().index_of(type_id).is_some()
    }

    /// Types contained by `type_id`, recursively.
    ///
    /// Follows one-to-one associations and collections, skipping
    /// many-to-many collections. Terminates on cyclic graphs. A type
    /// reachable from itself, such as a location holding child locations,
    /// is part of its own result.
    pub fn contained_types(&self, type_id: &TypeId) -> Result<BTreeSet<TypeId>> {
        let graph = self.graph();
        let index = graph
            .index_of(type_id)
            .ok_or_else(|| MetadataError::UnknownType(type_id.clone()))?;
        Ok(graph.reachable_from([index]))
    }

    /// Types contained by any of `roots`, computed in one traversal.
    ///
    /// Unknown roots are skipped.
    pub fn contained_types_from_all<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a TypeId>,
    ) -> BTreeSet<TypeId> {
        let graph = self.graph();
        let indices: Vec<usize> = roots.into_iter().filter_map(|t| graph.index_of(t)).collect();
        graph.reachable_from(indices)
    }

    /// Concrete types specializing `type_id`, the type itself excluded.
    pub fn concrete_subtypes(&self, type_id: &TypeId) -> Result<BTreeSet<TypeId>> {
        let graph = self.graph();
        let index = graph
            .index_of(type_id)
            .ok_or_else(|| MetadataError::UnknownType(type_id.clone()))?;
        Ok(graph.concrete_subtypes_of(index))
    }

    /// Names of the containment properties of `type_id`.
    pub fn containment_properties(&self, type_id: &TypeId) -> Vec<String> {
        let graph = self.graph();
        match graph.index_of(type_id) {
            Some(index) => graph
                .containment_edges(index)
                .iter()
                .map(|e| e.property.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether `sub` is `sup` or one of its subtypes.
    pub fn is_subtype_of(&self, sub: &TypeId, sup: &TypeId) -> bool {
        let graph = self.graph();
        match (graph.index_of(sub), graph.index_of(sup)) {
            (Some(a), Some(b)) => graph.is_subtype_of(a, b),
            _ => sub == sup,
        }
    }
}
