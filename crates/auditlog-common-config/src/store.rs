//! Live key/value configuration store with change notifications.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Configuration store errors.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// The store refused or failed the write.
    #[error("failed to write configuration key {key}: {message}")]
    WriteFailed { key: String, message: String },
}

/// Callback invoked with the changed key after a successful write.
pub type ConfigListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Restores the host session's flush behaviour when dropped.
#[must_use = "flushing resumes as soon as the guard is dropped"]
pub struct FlushModeGuard {
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl FlushModeGuard {
    /// A guard that does nothing, for stores without pending writes.
    pub fn noop() -> Self {
        Self { on_drop: None }
    }

    /// A guard that runs `restore` when dropped.
    pub fn new(restore: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_drop: Some(Box::new(restore)),
        }
    }
}

impl Drop for FlushModeGuard {
    fn drop(&mut self) {
        if let Some(restore) = self.on_drop.take() {
            restore();
        }
    }
}

/// Key/value store holding the audit policy configuration.
pub trait ConfigStore: Send + Sync {
    /// Read a key.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a key and notify subscribers.
    fn set(&self, key: &str, value: &str) -> Result<(), ConfigStoreError>;

    /// Write several keys as one update.
    ///
    /// Subscribers are notified once per key after all keys are written.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), ConfigStoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Register a change listener.
    fn subscribe(&self, listener: ConfigListener);

    /// Suspend automatic flushing of pending host writes while the guard
    /// is held, so reads cannot re-enter change capture.
    fn manual_flush(&self) -> FlushModeGuard {
        FlushModeGuard::noop()
    }
}

/// Split a comma-separated list into trimmed, non-empty items.
pub fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join items into a comma-separated list.
pub fn join_csv<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// In-memory [`ConfigStore`].
#[derive(Default)]
pub struct InMemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
    listeners: Mutex<Vec<ConfigListener>>,
    flush_suppressed: Arc<AtomicUsize>,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial values, without notifying anyone.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        store
            .values
            .write()
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        store
    }

    /// Remove a key and notify subscribers.
    pub fn remove(&self, key: &str) -> Option<String> {
        let removed = self.values.write().remove(key);
        if removed.is_some() {
            self.notify(key);
        }
        removed
    }

    /// Whether some caller currently holds a manual-flush guard.
    pub fn is_flush_suppressed(&self) -> bool {
        self.flush_suppressed.load(Ordering::Acquire) > 0
    }

    fn notify(&self, key: &str) {
        let listeners: Vec<ConfigListener> = self.listeners.lock().clone();
        debug!(key = key, listeners = listeners.len(), "configuration changed");
        for listener in listeners {
            listener(key);
        }
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        self.notify(key);
        Ok(())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), ConfigStoreError> {
        {
            let mut values = self.values.write();
            for (key, value) in entries {
                values.insert(key.to_string(), value.to_string());
            }
        }
        for (key, _) in entries {
            self.notify(key);
        }
        Ok(())
    }

    fn subscribe(&self, listener: ConfigListener) {
        self.listeners.lock().push(listener);
    }

    fn manual_flush(&self) -> FlushModeGuard {
        self.flush_suppressed.fetch_add(1, Ordering::AcqRel);
        let counter = Arc::clone(&self.flush_suppressed);
        FlushModeGuard::new(move || {
            counter.fetch_sub(1, Ordering::AcqRel);
        })
    }
}
