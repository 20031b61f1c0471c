//! Objects and their property snapshots.

use crate::{PropertyValue, TypeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identity of a persistent object touched by a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub type_id: TypeId,
    pub uuid: Uuid,
}

impl ObjectRef {
    /// Create a reference.
    pub fn new(type_id: impl Into<TypeId>, uuid: Uuid) -> Self {
        Self {
            type_id: type_id.into(),
            uuid,
        }
    }
}

/// Property snapshot of one object, keyed by property name.
///
/// A property missing from the snapshot reads as `Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityState {
    properties: BTreeMap<String, PropertyValue>,
}

static NULL: PropertyValue = PropertyValue::Null;

impl EntityState {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Read a property.
    pub fn get(&self, name: &str) -> &PropertyValue {
        self.properties.get(name).unwrap_or(&NULL)
    }

    /// Iterate over the recorded properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Property names present in this snapshot.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Number of recorded properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no properties are recorded.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl FromIterator<(String, PropertyValue)> for EntityState {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}
