//! Property-by-property comparison with noise filters.

use auditlog_common_config::CaptureSettings;
use auditlog_types::{EntityState, FieldDelta, PropertyValue};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Compares two snapshots of the same object.
#[derive(Debug, Clone)]
pub struct FieldDiffer {
    ignored: HashSet<String>,
    case_insensitive: bool,
    blank_as_null: bool,
}

impl FieldDiffer {
    /// Create a differ from capture settings.
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            ignored: settings.ignored_properties.iter().cloned().collect(),
            case_insensitive: settings.case_insensitive_strings,
            blank_as_null: settings.blank_strings_as_null,
        }
    }

    /// Whether a property is audit housekeeping and never compared.
    pub fn is_ignored(&self, property: &str) -> bool {
        self.ignored.contains(property)
    }

    /// Every non-ignored property whose value differs, with raw values.
    pub fn diff(&self, before: &EntityState, after: &EntityState) -> BTreeMap<String, FieldDelta> {
        let names: BTreeSet<&str> = before.names().chain(after.names()).collect();
        names
            .into_iter()
            .filter(|name| !self.is_ignored(name))
            .filter_map(|name| {
                let old = before.get(name);
                let new = after.get(name);
                if self.equivalent(old, new) {
                    None
                } else {
                    Some((name.to_string(), FieldDelta::new(new.clone(), old.clone())))
                }
            })
            .collect()
    }

    /// Deltas describing a deleted object's last known state.
    pub fn last_state(&self, before: &EntityState) -> BTreeMap<String, FieldDelta> {
        before
            .iter()
            .filter(|(name, value)| !self.is_ignored(name) && !value.is_null())
            .map(|(name, value)| {
                (
                    name.to_string(),
                    FieldDelta::new(PropertyValue::Null, value.clone()),
                )
            })
            .collect()
    }

    /// Whether two values of one property count as unchanged.
    pub fn equivalent(&self, old: &PropertyValue, new: &PropertyValue) -> bool {
        match (self.as_text(old), self.as_text(new)) {
            (Some(a), Some(b)) => self.text_eq(a, b),
            _ => old.same_as(new),
        }
    }

    /// Text view of a string-typed value. `Some(None)` is null or blank.
    fn as_text<'a>(&self, value: &'a PropertyValue) -> Option<Option<&'a str>> {
        match value {
            PropertyValue::Null => Some(None),
            PropertyValue::Text(s) if self.blank_as_null && s.trim().is_empty() => Some(None),
            PropertyValue::Text(s) => Some(Some(s.as_str())),
            _ => None,
        }
    }

    fn text_eq(&self, a: Option<&str>, b: Option<&str>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) if self.case_insensitive => a.to_lowercase() == b.to_lowercase(),
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for FieldDiffer {
    fn default() -> Self {
        Self::new(&CaptureSettings::default())
    }
}
