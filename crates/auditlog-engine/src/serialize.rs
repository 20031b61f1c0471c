//! Text form of property values stored in audit records.

use auditlog_types::{FieldDelta, PropertyValue, SerializedChange};
use std::collections::BTreeMap;

/// Format of serialized dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Prefix of references to audited-domain objects.
pub const UUID_LABEL: &str = "uuid:";
/// Prefix of references to other persistent objects.
pub const ID_LABEL: &str = "id:";

/// Serialize one value. Null and empty collections have no text form.
pub fn serialize_value(value: &PropertyValue) -> Option<String> {
    match value {
        PropertyValue::Null => None,
        PropertyValue::Text(s) => Some(s.clone()),
        PropertyValue::Integer(i) => Some(i.to_string()),
        PropertyValue::Decimal(d) => Some(d.to_string()),
        PropertyValue::Bool(b) => Some(b.to_string()),
        PropertyValue::Date(date) => Some(date.format(DATE_FORMAT).to_string()),
        PropertyValue::Enum { symbol, .. } => Some(symbol.clone()),
        PropertyValue::TypeRef(type_id) => Some(type_id.to_string()),
        PropertyValue::Entity(r) => Some(format!("{UUID_LABEL}{}", r.uuid)),
        PropertyValue::Persistent(r) => Some(format!("{ID_LABEL}{}", r.id)),
        PropertyValue::List(items) => join(items.iter().filter_map(serialize_value)),
        PropertyValue::Map(entries) => join(entries.iter().filter_map(|(k, v)| {
            Some(format!("{}:{}", serialize_value(k)?, serialize_value(v)?))
        })),
    }
}

fn join(items: impl Iterator<Item = String>) -> Option<String> {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

/// Serialize every delta of a candidate.
pub fn serialize_deltas(deltas: &BTreeMap<String, FieldDelta>) -> BTreeMap<String, SerializedChange> {
    deltas
        .iter()
        .map(|(name, delta)| {
            (
                name.clone(),
                SerializedChange::new(serialize_value(&delta.new), serialize_value(&delta.old)),
            )
        })
        .collect()
}
