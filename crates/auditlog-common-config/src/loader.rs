//! Configuration file loading and parsing.

use crate::env::{vars, EnvError, Environment};
use crate::types::{AuditLogConfig, StoreBackend};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Relative location of the configuration file.
pub const CONFIG_FILE: &str = ".auditlog/config.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Create a loader for `AUDITLOG_CONFIG_DIR`, or the current directory,
    /// after reading the `.env` files found there.
    pub fn from_env() -> Self {
        let loader = match Environment::get(vars::AUDITLOG_CONFIG_DIR) {
            Some(dir) => Self::new(dir),
            None => Self::default(),
        };
        Environment::load_dotenv(&loader.base_path);
        loader
    }

    /// Load configuration from `.auditlog/config.yaml`.
    ///
    /// A missing file yields the defaults. Store settings from the
    /// environment are applied on top before validation.
    pub fn load(&self) -> Result<AuditLogConfig, ConfigError> {
        let config_path = self.base_path.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            self.parse_file(&config_path)?
        } else {
            AuditLogConfig::default()
        };

        Environment::apply_overrides(&mut config)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Load a specific file, failing if it does not exist.
    pub fn load_file(&self, path: &Path) -> Result<AuditLogConfig, ConfigError> {
        let config = self.parse_file(path)?;
        self.validate(&config)?;
        Ok(config)
    }

    fn parse_file(&self, path: &Path) -> Result<AuditLogConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let expanded = self.expand_env_vars(&contents)?;

        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").map_err(|e| {
            ConfigError::ValidationError {
                message: e.to_string(),
            }
        })?;

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    /// Validate configuration values.
    fn validate(&self, config: &AuditLogConfig) -> Result<(), ConfigError> {
        let keys = [
            ("keys.policy", &config.keys.policy),
            ("keys.inclusions", &config.keys.inclusions),
            ("keys.exclusions", &config.keys.exclusions),
        ];
        for (field, value) in keys {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: format!("{} must not be empty", field),
                });
            }
        }

        if config.keys.policy == config.keys.inclusions
            || config.keys.policy == config.keys.exclusions
            || config.keys.inclusions == config.keys.exclusions
        {
            return Err(ConfigError::ValidationError {
                message: "policy keys must be distinct".to_string(),
            });
        }

        if config.store.backend == StoreBackend::Sqlite && config.store.sqlite_path.is_none() {
            return Err(ConfigError::ValidationError {
                message: "store.sqlite_path is required for the sqlite backend".to_string(),
            });
        }

        if config.store.outbox_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "store.outbox_capacity must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config: &AuditLogConfig) -> Result<(), ConfigError> {
        let config_path = self.base_path.join(CONFIG_FILE);
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(config_path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) {
        let config_dir = dir.join(".auditlog");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("config.yaml"), content).unwrap();
    }

    #[test]
    fn test_load_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config, AuditLogConfig::default());
    }

    #[test]
    fn test_load_file_requires_existing_file() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let result = loader.load_file(&dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
keys:
  policy: audit.policy
capture:
  ignored_properties: [lastSeen]
  store_last_state_of_deleted_items: true
store:
  backend: sqlite
  sqlite_path: audit.db
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.keys.policy, "audit.policy");
        assert_eq!(config.keys.inclusions, "auditlog.auditedTypes");
        assert_eq!(config.capture.ignored_properties, vec!["lastSeen".to_string()]);
        assert!(config.capture.store_last_state_of_deleted_items);
        assert_eq!(config.store.sqlite_path, Some(PathBuf::from("audit.db")));
    }

    #[test]
    fn test_env_var_default() {
        let loader = ConfigLoader::new(".");
        let result = loader
            .expand_env_vars("path: ${AUDITLOG_TEST_NONEXISTENT:-audit.db}")
            .unwrap();
        assert_eq!(result, "path: audit.db");
    }

    #[test]
    fn test_env_var_missing_error() {
        let loader = ConfigLoader::new(".");
        let result = loader.expand_env_vars("key: ${AUDITLOG_TEST_MISSING_VAR}");
        match result.unwrap_err() {
            ConfigError::EnvVarNotFound { var } => assert_eq!(var, "AUDITLOG_TEST_MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_var_expansion_in_config() {
        std::env::set_var("AUDITLOG_TEST_DB", "/tmp/expanded.db");
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
store:
  backend: sqlite
  sqlite_path: ${AUDITLOG_TEST_DB}
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.store.sqlite_path, Some(PathBuf::from("/tmp/expanded.db")));
        std::env::remove_var("AUDITLOG_TEST_DB");
    }

    #[test]
    fn test_validation_errors() {
        let loader = ConfigLoader::new(".");

        let mut config = AuditLogConfig::default();
        config.keys.policy = " ".to_string();
        match loader.validate(&config).unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("keys.policy")),
            other => panic!("Expected ValidationError, got {:?}", other),
        }

        let mut config = AuditLogConfig::default();
        config.keys.exclusions = config.keys.inclusions.clone();
        assert!(loader.validate(&config).is_err());

        let mut config = AuditLogConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        match loader.validate(&config).unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("sqlite_path")),
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
capture:
  ignored_properties: [unclosed
"#,
        );
        match ConfigLoader::new(dir.path()).load().unwrap_err() {
            ConfigError::ParseError { line, .. } => assert!(line.is_some()),
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());

        let mut config = AuditLogConfig::default();
        config.capture.case_insensitive_strings = false;
        loader.save(&config).unwrap();

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(loader.load().unwrap(), config);
    }
}
