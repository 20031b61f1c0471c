//! Entity type identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully-qualified name of the audit record type itself.
pub const AUDIT_RECORD_TYPE: &str = "auditlog.AuditRecord";

/// Stable identifier for an entity type.
///
/// Equality is by name; subtype relationships come from the metadata
/// catalog and are never stored here.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(String);

impl TypeId {
    /// Create a type id from a fully-qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved audit record type.
    pub fn audit_record() -> Self {
        Self(AUDIT_RECORD_TYPE.to_string())
    }

    /// Whether this is the reserved audit record type.
    pub fn is_reserved(&self) -> bool {
        self.0 == AUDIT_RECORD_TYPE
    }

    /// The fully-qualified name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last dotted segment of the name.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl From<&str> for TypeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for TypeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_type() {
        assert!(TypeId::audit_record().is_reserved());
        assert!(!TypeId::new("org.example.Concept").is_reserved());
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(TypeId::new("org.example.Concept").simple_name(), "Concept");
        assert_eq!(TypeId::new("Concept").simple_name(), "Concept");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&TypeId::new("a.B")).unwrap();
        assert_eq!(json, "\"a.B\"");
    }
}
