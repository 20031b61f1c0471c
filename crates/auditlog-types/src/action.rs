//! Audited write actions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The kind of write that produced an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AuditAction {
    /// A new object was inserted.
    Created,
    /// An existing object changed.
    Updated,
    /// An object was removed.
    Deleted,
}

impl AuditAction {
    /// Get all actions.
    pub fn all() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }

    /// Resolve the action of an object touched twice in one unit of work.
    ///
    /// A later delete always wins; an update of an object created in the
    /// same unit of work is still a creation.
    pub fn coalesce(self, later: Self) -> Self {
        match (self, later) {
            (_, Self::Deleted) => Self::Deleted,
            (Self::Created, _) => Self::Created,
            (Self::Deleted, Self::Created) => Self::Updated,
            (_, later) => later,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_display_and_parse() {
        assert_eq!(AuditAction::Created.to_string(), "CREATED");
        assert_eq!(AuditAction::from_str("updated").unwrap(), AuditAction::Updated);
        assert!(AuditAction::from_str("voided").is_err());
    }

    #[test]
    fn test_coalesce() {
        use AuditAction::*;
        assert_eq!(Created.coalesce(Updated), Created);
        assert_eq!(Created.coalesce(Deleted), Deleted);
        assert_eq!(Updated.coalesce(Updated), Updated);
        assert_eq!(Updated.coalesce(Deleted), Deleted);
        assert_eq!(Deleted.coalesce(Created), Updated);
    }

    #[test]
    fn test_all() {
        assert_eq!(AuditAction::all().count(), 3);
    }
}
