//! Best-effort durable key-value persistence.
//!
//! [`Storage`] is the raw backend (JSON text under string keys).
//! [`PersistentStore`] sits on top of it and never fails its caller: reads
//! fall back to a default, writes that fail are logged and dropped. The
//! in-memory state stays authoritative for the running session.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::StorageError;

/// Key holding the last fetched report (`null` when absent).
pub const REPORT_KEY: &str = "weather-report";
/// Key holding the favorites collection.
pub const FAVORITES_KEY: &str = "favorite-cities";

/// Raw durable backend.
pub trait Storage: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per entry inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Process-local backend. Can be made unavailable or given a byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
    unavailable: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with [`StorageError::Unavailable`].
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Writes fail once the total stored bytes would exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.unavailable {
            return Err(StorageError::Unavailable);
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.unavailable {
            return Err(StorageError::Unavailable);
        }

        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed JSON access over a [`Storage`] backend that absorbs every failure.
#[derive(Debug, Clone)]
pub struct PersistentStore {
    backend: Arc<dyn Storage>,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Read `key`, or `default` if the backend fails, the entry is missing or
    /// it does not parse as `T`.
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.read_validated(key, default, |_| true)
    }

    /// Like [`read`](Self::read), but a value that parses yet fails
    /// `validate` is also replaced by `default`.
    pub fn read_validated<T, F>(&self, key: &str, default: T, validate: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce(&T) -> bool,
    {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "no stored value, using default");
                return default;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed, using default");
                return default;
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) if validate(&value) => value,
            Ok(_) => {
                tracing::warn!(key, "stored value failed validation, using default");
                default
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value is malformed, using default");
                default
            }
        }
    }

    /// Serialize and store `value`. Failures are logged and swallowed; the
    /// return value only reports whether the write landed.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize value for storage");
                return false;
            }
        };

        match self.backend.set(key, &raw) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage write failed, keeping in-memory state only");
                false
            }
        }
    }
}
