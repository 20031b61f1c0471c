//! Audit policies.

use crate::TypeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use strum::{Display, EnumString};

/// The active rule family deciding which types are audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "types", rename_all = "snake_case")]
pub enum AuditPolicy {
    /// Every type except the reserved audit record type.
    All,
    /// Nothing is audited.
    None,
    /// Every type except the listed exclusions.
    AllExcept(BTreeSet<TypeId>),
    /// Only the listed inclusions.
    NoneExcept(BTreeSet<TypeId>),
}

/// Policy name as stored in configuration, without its type list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PolicyKind {
    All,
    None,
    AllExcept,
    NoneExcept,
}

/// A configured policy name that matches no known policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown audit policy: {0}")]
pub struct PolicyKindParseError(pub String);

impl PolicyKind {
    /// Parse a configured policy name.
    ///
    /// Blank values mean [`PolicyKind::None`].
    pub fn parse(value: &str) -> Result<Self, PolicyKindParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Self::None);
        }
        Self::from_str(trimmed).map_err(|_| PolicyKindParseError(trimmed.to_string()))
    }

    /// Whether this policy carries a type list.
    pub fn is_exception_based(&self) -> bool {
        matches!(self, Self::AllExcept | Self::NoneExcept)
    }
}

impl AuditPolicy {
    /// Build a policy from its name and a type list.
    ///
    /// The list is dropped for the context-free policies.
    pub fn from_kind(kind: PolicyKind, types: BTreeSet<TypeId>) -> Self {
        match kind {
            PolicyKind::All => Self::All,
            PolicyKind::None => Self::None,
            PolicyKind::AllExcept => Self::AllExcept(types),
            PolicyKind::NoneExcept => Self::NoneExcept(types),
        }
    }

    /// The policy name.
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::All => PolicyKind::All,
            Self::None => PolicyKind::None,
            Self::AllExcept(_) => PolicyKind::AllExcept,
            Self::NoneExcept(_) => PolicyKind::NoneExcept,
        }
    }

    /// The exclusion or inclusion list, if the policy has one.
    pub fn exceptions(&self) -> Option<&BTreeSet<TypeId>> {
        match self {
            Self::AllExcept(types) | Self::NoneExcept(types) => Some(types),
            Self::All | Self::None => None,
        }
    }

    /// Whether the policy explicitly audits `type_id`.
    ///
    /// The reserved audit record type is never audited.
    pub fn audits(&self, type_id: &TypeId) -> bool {
        if type_id.is_reserved() {
            return false;
        }
        match self {
            Self::All => true,
            Self::None => false,
            Self::AllExcept(excluded) => !excluded.contains(type_id),
            Self::NoneExcept(included) => included.contains(type_id),
        }
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::None
    }
}
