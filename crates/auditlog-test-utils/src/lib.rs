//! Test utilities shared by the audit log crates.
//!
//! The fixture catalog models a small clinical domain: concepts with
//! names and descriptions, people and patients with names and addresses,
//! and a self-referencing location hierarchy.

use auditlog_metadata::{
    Association, InMemoryCatalog, PropertyDescriptor, TypeDescriptor, TypeGraphResolver,
};
use auditlog_types::{EntityState, ObjectRef, PropertyValue, TypeId, AUDIT_RECORD_TYPE};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Type names of the fixture catalog.
pub mod types {
    pub const BASE_METADATA: &str = "org.example.BaseMetadata";
    pub const CONCEPT: &str = "org.example.Concept";
    pub const CONCEPT_NUMERIC: &str = "org.example.ConceptNumeric";
    pub const CONCEPT_COMPLEX: &str = "org.example.ConceptComplex";
    pub const CONCEPT_NAME: &str = "org.example.ConceptName";
    pub const CONCEPT_NAME_TAG: &str = "org.example.ConceptNameTag";
    pub const CONCEPT_DESCRIPTION: &str = "org.example.ConceptDescription";
    pub const CONCEPT_ANSWER: &str = "org.example.ConceptAnswer";
    pub const CONCEPT_SET: &str = "org.example.ConceptSet";
    pub const CONCEPT_DATATYPE: &str = "org.example.ConceptDatatype";
    pub const PERSON: &str = "org.example.Person";
    pub const PATIENT: &str = "org.example.Patient";
    pub const PERSON_NAME: &str = "org.example.PersonName";
    pub const PERSON_ADDRESS: &str = "org.example.PersonAddress";
    pub const PATIENT_IDENTIFIER: &str = "org.example.PatientIdentifier";
    pub const LOCATION: &str = "org.example.Location";
    pub const LOCATION_TAG: &str = "org.example.LocationTag";
    pub const ENCOUNTER_TYPE: &str = "org.example.EncounterType";
    pub const USER: &str = "org.example.User";
}

/// Shorthand for a [`TypeId`].
pub fn t(name: &str) -> TypeId {
    TypeId::new(name)
}

/// The fixture catalog.
pub fn fixture_catalog() -> InMemoryCatalog {
    use types::*;
    use Association::*;

    InMemoryCatalog::builder()
        .register(TypeDescriptor::abstract_type(BASE_METADATA))
        .entity(
            TypeDescriptor::concrete(CONCEPT),
            [
                PropertyDescriptor::value("shortName"),
                PropertyDescriptor::value("retired"),
                PropertyDescriptor::value("dateChanged"),
                PropertyDescriptor::to_one("changedBy", USER, ManyToOne),
                PropertyDescriptor::to_one("datatype", CONCEPT_DATATYPE, ManyToOne),
                PropertyDescriptor::collection("names", CONCEPT_NAME, OneToMany),
                PropertyDescriptor::collection("descriptions", CONCEPT_DESCRIPTION, OneToMany),
                PropertyDescriptor::collection("answers", CONCEPT_ANSWER, OneToMany),
                PropertyDescriptor::collection("conceptSets", CONCEPT_SET, ManyToMany),
            ],
        )
        .entity(
            TypeDescriptor::concrete(CONCEPT_NUMERIC).extends(CONCEPT),
            [PropertyDescriptor::value("hiAbsolute")],
        )
        .register(TypeDescriptor::concrete(CONCEPT_COMPLEX).extends(CONCEPT))
        .entity(
            TypeDescriptor::concrete(CONCEPT_NAME),
            [
                PropertyDescriptor::value("name"),
                PropertyDescriptor::value("locale"),
                PropertyDescriptor::to_one("concept", CONCEPT, ManyToOne),
                PropertyDescriptor::collection("tags", CONCEPT_NAME_TAG, ManyToMany),
            ],
        )
        .entity(
            TypeDescriptor::concrete(CONCEPT_DESCRIPTION),
            [
                PropertyDescriptor::value("description"),
                PropertyDescriptor::to_one("concept", CONCEPT, ManyToOne),
            ],
        )
        .entity(
            TypeDescriptor::concrete(CONCEPT_ANSWER),
            [PropertyDescriptor::to_one("answerConcept", CONCEPT, ManyToOne)],
        )
        .entity(
            TypeDescriptor::concrete(CONCEPT_SET),
            [PropertyDescriptor::to_one("concept", CONCEPT, ManyToOne)],
        )
        .register(TypeDescriptor::concrete(CONCEPT_NAME_TAG))
        .register(TypeDescriptor::concrete(CONCEPT_DATATYPE).extends(BASE_METADATA))
        .entity(
            TypeDescriptor::concrete(PERSON),
            [
                PropertyDescriptor::value("gender"),
                PropertyDescriptor::value("birthdate"),
                PropertyDescriptor::value("personDateChanged"),
                PropertyDescriptor::collection("names", PERSON_NAME, OneToMany),
                PropertyDescriptor::collection("addresses", PERSON_ADDRESS, OneToMany),
                PropertyDescriptor::value_collection("attributes"),
            ],
        )
        .entity(
            TypeDescriptor::concrete(PATIENT).extends(PERSON),
            [PropertyDescriptor::collection("identifiers", PATIENT_IDENTIFIER, OneToMany)],
        )
        .entity(
            TypeDescriptor::concrete(PERSON_NAME),
            [
                PropertyDescriptor::value("givenName"),
                PropertyDescriptor::value("familyName"),
            ],
        )
        .entity(
            TypeDescriptor::concrete(PERSON_ADDRESS),
            [PropertyDescriptor::value("cityVillage")],
        )
        .entity(
            TypeDescriptor::concrete(PATIENT_IDENTIFIER),
            [PropertyDescriptor::value("identifier")],
        )
        .entity(
            TypeDescriptor::concrete(LOCATION).extends(BASE_METADATA),
            [
                PropertyDescriptor::value("name"),
                PropertyDescriptor::to_one("parentLocation", LOCATION, ManyToOne),
                PropertyDescriptor::collection("childLocations", LOCATION, OneToMany),
                PropertyDescriptor::collection("tags", LOCATION_TAG, ManyToMany),
            ],
        )
        .register(TypeDescriptor::concrete(LOCATION_TAG).extends(BASE_METADATA))
        .entity(
            TypeDescriptor::concrete(ENCOUNTER_TYPE).extends(BASE_METADATA),
            [PropertyDescriptor::value("name")],
        )
        .register(TypeDescriptor::concrete(USER))
        .register(TypeDescriptor::concrete(AUDIT_RECORD_TYPE))
        .build()
}

/// A type-graph resolver over the fixture catalog.
pub fn fixture_resolver() -> Arc<TypeGraphResolver> {
    Arc::new(TypeGraphResolver::new(Arc::new(fixture_catalog())))
}

/// A fresh object of the given type.
pub fn object(type_name: &str) -> ObjectRef {
    ObjectRef::new(type_name, Uuid::new_v4())
}

/// Snapshot of a concept with the given names, descriptions and short name.
pub fn concept_state(short_name: &str, names: &[Uuid], descriptions: &[Uuid]) -> EntityState {
    EntityState::new()
        .with("shortName", short_name)
        .with("retired", false)
        .with("names", PropertyValue::entities(types::CONCEPT_NAME, names.iter().copied()))
        .with(
            "descriptions",
            PropertyValue::entities(types::CONCEPT_DESCRIPTION, descriptions.iter().copied()),
        )
}

/// Snapshot of a concept name.
pub fn concept_name_state(name: &str, concept: Uuid) -> EntityState {
    EntityState::new()
        .with("name", name)
        .with("locale", "en")
        .with("concept", PropertyValue::entity(types::CONCEPT, concept))
}

/// Snapshot of a concept description.
pub fn concept_description_state(description: &str, concept: Uuid) -> EntityState {
    EntityState::new()
        .with("description", description)
        .with("concept", PropertyValue::entity(types::CONCEPT, concept))
}

/// Snapshot of a location type.
pub fn location_state(name: &str) -> EntityState {
    EntityState::new().with("name", name)
}

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Path of a database file inside a fresh temporary directory.
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join("audit.db");
    (dir, path)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_metadata::MetadataCatalog;

    #[test]
    fn test_fixture_catalog_is_consistent() {
        let catalog = fixture_catalog();
        for descriptor in catalog.all_types() {
            for parent in &descriptor.supertypes {
                assert!(catalog.is_persistent_type(parent), "{} has unknown parent", descriptor.id);
            }
            for property in catalog.properties_of(&descriptor.id) {
                if let Some(target) = &property.target {
                    assert!(catalog.is_persistent_type(target), "{} is unmapped", target);
                }
            }
        }
    }

    #[test]
    fn test_concept_containment() {
        let resolver = fixture_resolver();
        let contained = resolver.contained_types(&t(types::CONCEPT)).unwrap();
        assert!(contained.contains(&t(types::CONCEPT_NAME)));
        assert!(contained.contains(&t(types::CONCEPT_DESCRIPTION)));
        assert!(contained.contains(&t(types::CONCEPT_ANSWER)));
        assert!(!contained.contains(&t(types::CONCEPT_SET)));
        assert!(!contained.contains(&t(types::CONCEPT_NAME_TAG)));
    }

    #[test]
    fn test_assert_macros() {
        let ok: Result<u8, String> = Ok(3);
        assert_eq!(assert_ok!(ok), 3);
        let err: Result<u8, String> = Err("boom".into());
        assert_eq!(assert_err!(err), "boom");
    }
}
