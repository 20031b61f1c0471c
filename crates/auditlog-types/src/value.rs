//! Property values as observed by the persistence layer.

use crate::TypeId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to an object of the audited domain, identified by uuid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub type_id: TypeId,
    pub uuid: Uuid,
}

/// Reference to any other persistent object, identified by primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistentRef {
    pub type_id: TypeId,
    pub id: String,
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Bool(bool),
    Date(NaiveDateTime),
    /// Enumerated value. `label` is display text only and never compared
    /// or serialized.
    Enum {
        symbol: String,
        label: Option<String>,
    },
    /// A reference to a type rather than an instance.
    TypeRef(TypeId),
    Entity(EntityRef),
    Persistent(PersistentRef),
    List(Vec<PropertyValue>),
    Map(Vec<(PropertyValue, PropertyValue)>),
}

impl PropertyValue {
    /// Text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Enum value by symbolic name.
    pub fn enumeration(symbol: impl Into<String>) -> Self {
        Self::Enum {
            symbol: symbol.into(),
            label: None,
        }
    }

    /// Reference to an audited-domain object.
    pub fn entity(type_id: impl Into<TypeId>, uuid: Uuid) -> Self {
        Self::Entity(EntityRef {
            type_id: type_id.into(),
            uuid,
        })
    }

    /// Reference to a persistent object by primary key.
    pub fn persistent(type_id: impl Into<TypeId>, id: impl ToString) -> Self {
        Self::Persistent(PersistentRef {
            type_id: type_id.into(),
            id: id.to_string(),
        })
    }

    /// Collection of audited-domain objects.
    pub fn entities(type_id: impl Into<TypeId>, uuids: impl IntoIterator<Item = Uuid>) -> Self {
        let type_id = type_id.into();
        Self::List(
            uuids
                .into_iter()
                .map(|uuid| Self::entity(type_id.clone(), uuid))
                .collect(),
        )
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is a list or map.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Every audited-domain object referenced by this value, including
    /// collection members and map keys/values.
    pub fn entity_refs(&self) -> Vec<&EntityRef> {
        let mut out = Vec::new();
        self.collect_entity_refs(&mut out);
        out
    }

    fn collect_entity_refs<'a>(&'a self, out: &mut Vec<&'a EntityRef>) {
        match self {
            Self::Entity(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|i| i.collect_entity_refs(out)),
            Self::Map(entries) => entries.iter().for_each(|(k, v)| {
                k.collect_entity_refs(out);
                v.collect_entity_refs(out);
            }),
            _ => {}
        }
    }

    /// Equality that ignores enum display labels and collection order.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Enum { symbol: a, .. }, Self::Enum { symbol: b, .. }) => a == b,
            (Self::List(a), Self::List(b)) => unordered_eq(a, b, |x, y| x.same_as(y)),
            (Self::Map(a), Self::Map(b)) => {
                unordered_eq(a, b, |(ka, va), (kb, vb)| ka.same_as(kb) && va.same_as(vb))
            }
            (a, b) => a == b,
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        Self::Null
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for PropertyValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

fn unordered_eq<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        match b
            .iter()
            .enumerate()
            .position(|(i, y)| !used[i] && eq(x, y))
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_label_ignored() {
        let a = PropertyValue::Enum {
            symbol: "HIGH".into(),
            label: Some("High priority".into()),
        };
        assert!(a.same_as(&PropertyValue::enumeration("HIGH")));
        assert!(!a.same_as(&PropertyValue::enumeration("LOW")));
    }

    #[test]
    fn test_list_order_ignored() {
        let a = PropertyValue::List(vec![1i64.into(), 2i64.into(), 2i64.into()]);
        let b = PropertyValue::List(vec![2i64.into(), 1i64.into(), 2i64.into()]);
        let c = PropertyValue::List(vec![2i64.into(), 1i64.into(), 1i64.into()]);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_entity_refs_walks_collections() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let value = PropertyValue::Map(vec![(
            PropertyValue::text("k"),
            PropertyValue::entities("a.Name", [u1, u2]),
        )]);
        let refs: Vec<Uuid> = value.entity_refs().iter().map(|r| r.uuid).collect();
        assert_eq!(refs, vec![u1, u2]);
    }

    #[test]
    fn test_option_into_null() {
        let v: PropertyValue = Option::<String>::None.into();
        assert!(v.is_null());
    }
}
