//! The metadata catalog consumed from the persistence layer.

use auditlog_types::TypeId;
use std::collections::{BTreeMap, BTreeSet};

/// Whether a type can be instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Concrete,
    Abstract,
    Interface,
}

/// One mapped type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub kind: TypeKind,
    /// Direct supertypes, including implemented interfaces.
    pub supertypes: Vec<TypeId>,
}

impl TypeDescriptor {
    /// A concrete type with no supertypes.
    pub fn concrete(id: impl Into<TypeId>) -> Self {
        Self {
            id: id.into(),
            kind: TypeKind::Concrete,
            supertypes: Vec::new(),
        }
    }

    /// An abstract type with no supertypes.
    pub fn abstract_type(id: impl Into<TypeId>) -> Self {
        Self {
            kind: TypeKind::Abstract,
            ..Self::concrete(id)
        }
    }

    /// An interface.
    pub fn interface(id: impl Into<TypeId>) -> Self {
        Self {
            kind: TypeKind::Interface,
            ..Self::concrete(id)
        }
    }

    /// Add a direct supertype.
    pub fn extends(mut self, parent: impl Into<TypeId>) -> Self {
        self.supertypes.push(parent.into());
        self
    }

    /// Whether instances of exactly this type can exist.
    pub fn is_concrete(&self) -> bool {
        self.kind == TypeKind::Concrete
    }
}

/// Mapping of an association property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// One property of a mapped type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Target type of an association or element type of a collection.
    pub target: Option<TypeId>,
    pub association: Option<Association>,
    pub is_collection: bool,
}

impl PropertyDescriptor {
    /// A plain value property.
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            association: None,
            is_collection: false,
        }
    }

    /// A single-valued association.
    pub fn to_one(name: impl Into<String>, target: impl Into<TypeId>, association: Association) -> Self {
        Self {
            name: name.into(),
            target: Some(target.into()),
            association: Some(association),
            is_collection: false,
        }
    }

    /// A collection of entities.
    pub fn collection(
        name: impl Into<String>,
        element: impl Into<TypeId>,
        association: Association,
    ) -> Self {
        Self {
            name: name.into(),
            target: Some(element.into()),
            association: Some(association),
            is_collection: true,
        }
    }

    /// A collection of plain values.
    pub fn value_collection(name: impl Into<String>) -> Self {
        Self {
            is_collection: true,
            ..Self::value(name)
        }
    }

    /// Whether the target of this property is owned by the declaring type.
    ///
    /// One-to-one associations and collections are containment unless the
    /// collection is backed by a many-to-many relationship.
    pub fn is_containment(&self) -> bool {
        if self.target.is_none() {
            return false;
        }
        match self.association {
            Some(Association::OneToOne) => true,
            Some(Association::ManyToMany) => false,
            Some(Association::OneToMany) => true,
            Some(Association::ManyToOne) | None => self.is_collection,
        }
    }
}

/// Source of type and property metadata.
pub trait MetadataCatalog: Send + Sync {
    /// Every mapped type.
    fn all_types(&self) -> Vec<TypeDescriptor>;

    /// All properties of a type, inherited ones included.
    fn properties_of(&self, type_id: &TypeId) -> Vec<PropertyDescriptor>;

    /// Every mapped type that can be instantiated.
    fn all_concrete_types(&self) -> BTreeSet<TypeId> {
        self.all_types()
            .into_iter()
            .filter(TypeDescriptor::is_concrete)
            .map(|t| t.id)
            .collect()
    }

    /// Whether a type is mapped by the persistence layer.
    fn is_persistent_type(&self, type_id: &TypeId) -> bool {
        self.all_types().iter().any(|t| &t.id == type_id)
    }
}

/// A catalog held in memory, built up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    types: BTreeMap<TypeId, TypeDescriptor>,
    properties: BTreeMap<TypeId, Vec<PropertyDescriptor>>,
}

impl InMemoryCatalog {
    /// Start building a catalog.
    pub fn builder() -> InMemoryCatalogBuilder {
        InMemoryCatalogBuilder::default()
    }

    /// Declared properties, walking supertypes.
    fn collect_properties(&self, type_id: &TypeId, seen: &mut BTreeSet<TypeId>, out: &mut Vec<PropertyDescriptor>) {
        if !seen.insert(type_id.clone()) {
            return;
        }
        if let Some(own) = self.properties.get(type_id) {
            for p in own {
                if !out.iter().any(|existing| existing.name == p.name) {
                    out.push(p.clone());
                }
            }
        }
        if let Some(desc) = self.types.get(type_id) {
            for parent in &desc.supertypes {
                self.collect_properties(parent, seen, out);
            }
        }
    }
}

impl MetadataCatalog for InMemoryCatalog {
    fn all_types(&self) -> Vec<TypeDescriptor> {
        self.types.values().cloned().collect()
    }

    fn properties_of(&self, type_id: &TypeId) -> Vec<PropertyDescriptor> {
        let mut out = Vec::new();
        self.collect_properties(type_id, &mut BTreeSet::new(), &mut out);
        out
    }

    fn is_persistent_type(&self, type_id: &TypeId) -> bool {
        self.types.contains_key(type_id)
    }
}

/// Builder for [`InMemoryCatalog`].
#[derive(Debug, Default)]
pub struct InMemoryCatalogBuilder {
    catalog: InMemoryCatalog,
}

impl InMemoryCatalogBuilder {
    /// Register a type.
    pub fn register(mut self, descriptor: TypeDescriptor) -> Self {
        self.catalog.types.insert(descriptor.id.clone(), descriptor);
        self
    }

    /// Register a type with its declared properties.
    pub fn entity(
        self,
        descriptor: TypeDescriptor,
        properties: impl IntoIterator<Item = PropertyDescriptor>,
    ) -> Self {
        let id = descriptor.id.clone();
        let mut builder = self.register(descriptor);
        builder
            .catalog
            .properties
            .entry(id)
            .or_default()
            .extend(properties);
        builder
    }

    /// Declare one more property on an already registered type.
    pub fn property(mut self, type_id: impl Into<TypeId>, property: PropertyDescriptor) -> Self {
        self.catalog
            .properties
            .entry(type_id.into())
            .or_default()
            .push(property);
        self
    }

    /// Finish building.
    pub fn build(self) -> InMemoryCatalog {
        self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment_rules() {
        assert!(PropertyDescriptor::to_one("address", "a.Address", Association::OneToOne).is_containment());
        assert!(!PropertyDescriptor::to_one("creator", "a.User", Association::ManyToOne).is_containment());
        assert!(PropertyDescriptor::collection("names", "a.Name", Association::OneToMany).is_containment());
        assert!(!PropertyDescriptor::collection("sets", "a.Set", Association::ManyToMany).is_containment());
        assert!(!PropertyDescriptor::value_collection("tags").is_containment());
        assert!(!PropertyDescriptor::value("name").is_containment());
    }

    #[test]
    fn test_properties_are_inherited() {
        let catalog = InMemoryCatalog::builder()
            .entity(
                TypeDescriptor::concrete("a.Person"),
                [
                    PropertyDescriptor::value("gender"),
                    PropertyDescriptor::collection("names", "a.PersonName", Association::OneToMany),
                ],
            )
            .entity(
                TypeDescriptor::concrete("a.Patient").extends("a.Person"),
                [PropertyDescriptor::value("identifier")],
            )
            .build();

        let names: Vec<String> = catalog
            .properties_of(&TypeId::new("a.Patient"))
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["identifier", "gender", "names"]);
    }

    #[test]
    fn test_concrete_types() {
        let catalog = InMemoryCatalog::builder()
            .register(TypeDescriptor::abstract_type("a.Base"))
            .register(TypeDescriptor::interface("a.Named"))
            .register(TypeDescriptor::concrete("a.Leaf").extends("a.Base"))
            .build();

        let concrete = catalog.all_concrete_types();
        assert_eq!(concrete.len(), 1);
        assert!(concrete.contains(&TypeId::new("a.Leaf")));
        assert!(catalog.is_persistent_type(&TypeId::new("a.Base")));
        assert!(!catalog.is_persistent_type(&TypeId::new("a.Other")));
    }
}
