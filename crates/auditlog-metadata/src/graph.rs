//! Arena-backed type graph.

use crate::catalog::{MetadataCatalog, TypeKind};
use auditlog_types::TypeId;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// A containment edge from an owning type to a contained type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainmentEdge {
    pub property: String,
    pub target: usize,
}

#[derive(Debug, Clone)]
struct TypeNode {
    id: TypeId,
    kind: TypeKind,
    supertypes: Vec<usize>,
    subtypes: Vec<usize>,
    containment: Vec<ContainmentEdge>,
}

/// Node/edge view of the catalog, built once and queried many times.
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    nodes: Vec<TypeNode>,
    index: HashMap<TypeId, usize>,
}

impl TypeGraph {
    /// Compile a graph from a metadata catalog.
    ///
    /// Association targets the catalog does not map are ignored.
    pub fn build(catalog: &dyn MetadataCatalog) -> Self {
        let mut graph = Self::default();
        for descriptor in catalog.all_types() {
            graph.index.insert(descriptor.id.clone(), graph.nodes.len());
            graph.nodes.push(TypeNode {
                id: descriptor.id,
                kind: descriptor.kind,
                supertypes: Vec::new(),
                subtypes: Vec::new(),
                containment: Vec::new(),
            });
        }

        let mut edges = 0;
        for descriptor in catalog.all_types() {
            let Some(&node) = graph.index.get(&descriptor.id) else {
                continue;
            };
            for parent in &descriptor.supertypes {
                if let Some(&p) = graph.index.get(parent) {
                    graph.nodes[node].supertypes.push(p);
                    graph.nodes[p].subtypes.push(node);
                }
            }
            for property in catalog.properties_of(&descriptor.id) {
                if !property.is_containment() {
                    continue;
                }
                let target = property.target.as_ref().and_then(|t| graph.index.get(t));
                if let Some(&target) = target {
                    graph.nodes[node].containment.push(ContainmentEdge {
                        property: property.name,
                        target,
                    });
                    edges += 1;
                }
            }
        }

        debug!(types = graph.nodes.len(), edges, "type graph built");
        graph
    }

    /// Number of types in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no types.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Arena index of a type.
    pub fn index_of(&self, type_id: &TypeId) -> Option<usize> {
        self.index.get(type_id).copied()
    }

    /// Type at an arena index.
    pub fn type_at(&self, index: usize) -> &TypeId {
        &self.nodes[index].id
    }

    /// Every type in the graph.
    pub fn types(&self) -> impl Iterator<Item = &TypeId> {
        self.nodes.iter().map(|n| &n.id)
    }

    /// Outgoing containment edges of a node.
    pub fn containment_edges(&self, index: usize) -> &[ContainmentEdge] {
        &self.nodes[index].containment
    }

    /// Types reachable from any of `roots` through containment edges.
    ///
    /// A root appears in the result only if some path leads back to it.
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = usize>) -> BTreeSet<TypeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for root in roots {
            for edge in &self.nodes[root].containment {
                queue.push_back(edge.target);
            }
        }
        let mut out = BTreeSet::new();
        while let Some(node) = queue.pop_front() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            out.insert(self.nodes[node].id.clone());
            for edge in &self.nodes[node].containment {
                if !visited[edge.target] {
                    queue.push_back(edge.target);
                }
            }
        }
        out
    }

    /// Concrete types specializing the node, directly or transitively.
    pub fn concrete_subtypes_of(&self, index: usize) -> BTreeSet<TypeId> {
        let mut visited = vec![false; self.nodes.len()];
        visited[index] = true;
        let mut stack: Vec<usize> = self.nodes[index].subtypes.clone();
        let mut out = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            if self.nodes[node].kind == TypeKind::Concrete {
                out.insert(self.nodes[node].id.clone());
            }
            stack.extend(self.nodes[node].subtypes.iter().copied());
        }
        out
    }

    /// Whether `sub` is `sup` or specializes it.
    pub fn is_subtype_of(&self, sub: usize, sup: usize) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![sub];
        while let Some(node) = stack.pop() {
            if node == sup {
                return true;
            }
            if visited[node] {
                continue;
            }
            visited[node] = true;
            stack.extend(self.nodes[node].supertypes.iter().copied());
        }
        false
    }
}
