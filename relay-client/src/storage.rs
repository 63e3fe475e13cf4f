//! Key-value persistence for credentials.
//!
//! Only the contract matters to this layer: three string entries (access
//! token, refresh token, serialized user), written on successful auth and
//! cleared as a set on logout. `MemoryStore` backs tests; `JsonFileStore`
//! persists a flat map under the platform data directory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;

use relay_core::config::AppConfig;
use relay_core::error::{RelayError, RelayResult};

/// Contract for the persisted credential store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when absent.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value.
    fn put(&self, key: &str, value: &str) -> RelayResult<()>;
    /// Remove a value. No-op when absent.
    fn remove(&self, key: &str) -> RelayResult<()>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> RelayResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> RelayResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// File-backed store persisting a flat JSON map.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at the default location under the data directory.
    pub fn open_default() -> RelayResult<Self> {
        Ok(Self::open(AppConfig::data_dir()?.join("credentials.json")))
    }

    /// Open a store at a specific path, loading existing entries.
    ///
    /// An unreadable or corrupt file starts the store empty rather than
    /// failing: a missing credential set means "not signed in".
    pub fn open(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("ignoring corrupt credential store: {e}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> RelayResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| RelayError::Storage(e.to_string()))?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> RelayResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> RelayResult<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            return self.persist(&entries);
        }
        Ok(())
    }
}
