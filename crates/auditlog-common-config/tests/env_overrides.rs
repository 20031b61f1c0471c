use auditlog_common_config::{vars, ConfigError, ConfigLoader, StoreBackend};
use std::env;
use std::path::PathBuf;
use tempfile::tempdir;

// Environment variables are process-wide, so every override case runs in
// this single test.
#[test]
fn test_store_overrides_from_environment() {
    let dir = tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path());

    env::set_var(vars::AUDITLOG_STORE_BACKEND, "SQLite");
    env::set_var(vars::AUDITLOG_SQLITE_PATH, "/var/lib/auditlog/audit.db");
    env::set_var(vars::AUDITLOG_OUTBOX_CAPACITY, "25");
    let config = loader.load().unwrap();
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(
        config.store.sqlite_path,
        Some(PathBuf::from("/var/lib/auditlog/audit.db"))
    );
    assert_eq!(config.store.outbox_capacity, 25);

    env::remove_var(vars::AUDITLOG_SQLITE_PATH);
    let err = loader.load().unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));

    env::set_var(vars::AUDITLOG_STORE_BACKEND, "postgres");
    let err = loader.load().unwrap_err();
    assert!(matches!(err, ConfigError::Env(_)));

    env::remove_var(vars::AUDITLOG_STORE_BACKEND);
    env::set_var(vars::AUDITLOG_OUTBOX_CAPACITY, "0");
    assert!(loader.load().is_err());

    env::remove_var(vars::AUDITLOG_OUTBOX_CAPACITY);
    assert_eq!(loader.load().unwrap().store.backend, StoreBackend::Memory);
}
