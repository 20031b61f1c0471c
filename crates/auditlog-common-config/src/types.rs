//! Configuration file types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root of `.auditlog/config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLogConfig {
    /// Names of the configuration-store keys holding the policy.
    pub keys: PolicyKeys,
    /// Change-detection settings.
    pub capture: CaptureSettings,
    /// Audit record storage.
    pub store: StoreSettings,
}

/// Configuration-store keys read by the strategy resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyKeys {
    /// Key of the policy name.
    pub policy: String,
    /// Key of the comma-separated inclusion list.
    pub inclusions: String,
    /// Key of the comma-separated exclusion list.
    pub exclusions: String,
}

impl Default for PolicyKeys {
    fn default() -> Self {
        Self {
            policy: "auditlog.auditingStrategy".to_string(),
            inclusions: "auditlog.auditedTypes".to_string(),
            exclusions: "auditlog.unauditedTypes".to_string(),
        }
    }
}

impl PolicyKeys {
    /// Whether `key` is one of the policy keys.
    pub fn contains(&self, key: &str) -> bool {
        key == self.policy || key == self.inclusions || key == self.exclusions
    }
}

/// Properties that mirror the audit record's own user and timestamp.
pub const DEFAULT_IGNORED_PROPERTIES: [&str; 12] = [
    "changedBy",
    "dateChanged",
    "creator",
    "dateCreated",
    "voidedBy",
    "dateVoided",
    "retiredBy",
    "dateRetired",
    "personChangedBy",
    "personDateChanged",
    "personCreator",
    "personDateCreated",
];

/// Change-detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Properties never compared.
    pub ignored_properties: Vec<String>,
    /// Compare text values ignoring case.
    pub case_insensitive_strings: bool,
    /// Treat blank text as null.
    pub blank_strings_as_null: bool,
    /// Record every property of a deleted object as its last state.
    pub store_last_state_of_deleted_items: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ignored_properties: DEFAULT_IGNORED_PROPERTIES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            case_insensitive_strings: true,
            blank_strings_as_null: true,
            store_last_state_of_deleted_items: false,
        }
    }
}

/// Audit record store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Audit record storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Database file for the sqlite backend.
    pub sqlite_path: Option<PathBuf>,
    /// Maximum number of failed record trees kept for retry.
    pub outbox_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_path: None,
            outbox_capacity: 1000,
        }
    }
}
