//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} identifier: {input:?}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub input: String,
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Accepts `<prefix>_<uuid>` or a bare uuid.
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                let bare = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Uuid::parse_str(bare).map(Self).map_err(|_| IdParseError {
                    kind: $prefix,
                    input: s.to_string(),
                })
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id! {
    /// One host transaction as seen by the capture layer.
    UnitOfWorkId => "uow"
}

uuid_id! {
    /// An application user.
    UserId => "usr"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_of_work_id_roundtrip() {
        let id = UnitOfWorkId::new();
        let parsed = UnitOfWorkId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("uow_"));
    }

    #[test]
    fn test_parse_without_prefix() {
        let id = UserId::new();
        let parsed = UserId::parse(&id.as_uuid().to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_garbage() {
        let err = "usr_not-a-uuid".parse::<UserId>().unwrap_err();
        assert_eq!(err.kind, "usr");
        assert_eq!(err.input, "usr_not-a-uuid");
    }
}
