//! Environment overrides for the static configuration.

use crate::types::{AuditLogConfig, StoreBackend};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Environment variable names.
pub mod vars {
    pub const AUDITLOG_CONFIG_DIR: &str = "AUDITLOG_CONFIG_DIR";
    pub const AUDITLOG_ENV: &str = "AUDITLOG_ENV";

    pub const AUDITLOG_STORE_BACKEND: &str = "AUDITLOG_STORE_BACKEND";
    pub const AUDITLOG_SQLITE_PATH: &str = "AUDITLOG_SQLITE_PATH";
    pub const AUDITLOG_OUTBOX_CAPACITY: &str = "AUDITLOG_OUTBOX_CAPACITY";

    pub const AUDITLOG_LOG_LEVEL: &str = "AUDITLOG_LOG_LEVEL";
    pub const AUDITLOG_LOG_FORMAT: &str = "AUDITLOG_LOG_FORMAT";
    pub const AUDITLOG_LOG_FILE: &str = "AUDITLOG_LOG_FILE";
    pub const AUDITLOG_LOG_SOURCE: &str = "AUDITLOG_LOG_SOURCE";
    pub const AUDITLOG_LOG_SPANS: &str = "AUDITLOG_LOG_SPANS";
}

/// Access to process environment variables.
pub struct Environment;

impl Environment {
    /// Load `.env`, `.env.local` and `.env.$AUDITLOG_ENV` from `dir`.
    ///
    /// Variables already set in the process win. Returns the files read.
    pub fn load_dotenv(dir: &Path) -> Vec<PathBuf> {
        let mut names = vec![".env".to_string(), ".env.local".to_string()];
        if let Some(profile) = Self::get(vars::AUDITLOG_ENV) {
            names.push(format!(".env.{profile}"));
        }

        // dotenvy never overrides, so the most specific file goes first
        names
            .iter()
            .rev()
            .map(|name| dir.join(name))
            .filter(|path| dotenvy::from_path(path).is_ok())
            .collect()
    }

    /// A non-blank variable, trimmed.
    pub fn get(var: &str) -> Option<String> {
        env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// A boolean variable: `true`, `1` or `yes` are true.
    pub fn get_bool(var: &str) -> Option<bool> {
        Self::get(var).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// An integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        Self::get(var)
            .map(|v| {
                v.parse().map_err(|_| EnvError::InvalidValue {
                    var: var.to_string(),
                    message: format!("expected an integer, got {v:?}"),
                })
            })
            .transpose()
    }

    /// Apply the `AUDITLOG_STORE_*` and `AUDITLOG_*_PATH` overrides.
    pub fn apply_overrides(config: &mut AuditLogConfig) -> Result<(), EnvError> {
        if let Some(backend) = Self::get(vars::AUDITLOG_STORE_BACKEND) {
            config.store.backend = match backend.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "sqlite" => StoreBackend::Sqlite,
                _ => {
                    return Err(EnvError::InvalidValue {
                        var: vars::AUDITLOG_STORE_BACKEND.to_string(),
                        message: format!("unknown backend {backend:?}"),
                    })
                }
            };
        }
        if let Some(path) = Self::get(vars::AUDITLOG_SQLITE_PATH) {
            config.store.sqlite_path = Some(PathBuf::from(path));
        }
        if let Some(capacity) = Self::get_int(vars::AUDITLOG_OUTBOX_CAPACITY)? {
            config.store.outbox_capacity = capacity;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_blank_is_unset() {
        env::set_var("AUDITLOG_TEST_BLANK", "   ");
        assert_eq!(Environment::get("AUDITLOG_TEST_BLANK"), None);
        env::remove_var("AUDITLOG_TEST_BLANK");
    }

    #[test]
    fn test_bool_parsing() {
        env::set_var("AUDITLOG_TEST_BOOL", "Yes");
        assert_eq!(Environment::get_bool("AUDITLOG_TEST_BOOL"), Some(true));
        env::set_var("AUDITLOG_TEST_BOOL", "no");
        assert_eq!(Environment::get_bool("AUDITLOG_TEST_BOOL"), Some(false));
        env::remove_var("AUDITLOG_TEST_BOOL");
        assert_eq!(Environment::get_bool("AUDITLOG_TEST_BOOL"), None);
    }

    #[test]
    fn test_integer_parsing() {
        env::set_var("AUDITLOG_TEST_INT", "42");
        let val: Result<Option<usize>, _> = Environment::get_int("AUDITLOG_TEST_INT");
        assert_eq!(val.unwrap(), Some(42));

        env::set_var("AUDITLOG_TEST_INT", "many");
        let val: Result<Option<usize>, _> = Environment::get_int("AUDITLOG_TEST_INT");
        assert!(matches!(val, Err(EnvError::InvalidValue { .. })));

        env::remove_var("AUDITLOG_TEST_INT");
    }

    #[test]
    fn test_dotenv_files_are_read() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "AUDITLOG_TEST_DOTENV=base\n").unwrap();
        std::fs::write(dir.path().join(".env.local"), "AUDITLOG_TEST_DOTENV=local\n").unwrap();

        let loaded = Environment::load_dotenv(dir.path());

        assert_eq!(loaded.len(), 2);
        assert_eq!(Environment::get("AUDITLOG_TEST_DOTENV").as_deref(), Some("local"));
        env::remove_var("AUDITLOG_TEST_DOTENV");
    }
}
