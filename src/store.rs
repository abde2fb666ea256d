//! Persisted engine state
//!
//! Every engine keeps its small amount of user state (history, saved filters,
//! interaction logs) behind a key-value contract with JSON string values. The
//! store is shared as `Arc<dyn KeyValueStore>` so several engine instances can
//! sit on one backing store; there is no coordination between them and the
//! last write wins.
//!
//! Reads are best-effort: a missing key, a failing backend or corrupt JSON all
//! yield the default value. Writes are logged on failure and never propagated.

use crate::error::{Error, Result};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, error, warn};

/// Search query history, most recent first
pub const SEARCH_HISTORY_KEY: &str = "searchHistory";
/// Named filter presets
pub const SAVED_FILTERS_KEY: &str = "savedFilters";
/// Last used filter criteria
pub const LAST_FILTER_KEY: &str = "lastFilter";
/// Per-item interaction records
pub const VIEW_HISTORY_KEY: &str = "viewHistory";
/// Favorited item ids
pub const FAVORITES_KEY: &str = "favorites";
/// Purchased item ids
pub const PURCHASE_HISTORY_KEY: &str = "purchaseHistory";

/// Minimal key-value contract the engines persist through
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-process store backed by a map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::storage(key, "memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::storage(key, "memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::storage(key, "memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("creating store directory {}", root.display()))?;
        debug!("Opened JSON file store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::invalid_argument(format!(
                "store key '{}' is not a plain identifier",
                key
            )));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage_with_source(key, "read failed", e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Write beside the target and rename so readers never see a torn file
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .with_context(|| format!("creating temp file for {}", key))?;
        tmp.write_all(value.as_bytes())
            .with_context(|| format!("writing {}", key))?;
        tmp.persist(&path)
            .map_err(|e| Error::storage_with_source(key, "rename failed", e.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_with_source(key, "delete failed", e)),
        }
    }
}

/// Read and decode a key, falling back to `T::default()` on any failure
pub fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match try_load(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key, code = e.error_code(), "Discarding persisted state: {}", e);
            T::default()
        }
    }
}

/// Read and decode a key, reporting missing keys as `None`
pub fn try_load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a value; failures are logged and reported as `false`
pub fn persist<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool
where
    T: Serialize + ?Sized,
{
    let result = serde_json::to_string(value)
        .map_err(Error::from)
        .and_then(|raw| store.set(key, &raw));
    match result {
        Ok(()) => true,
        Err(e) => {
            error!(key, code = e.error_code(), "Failed to persist state: {}", e);
            false
        }
    }
}

/// Remove a key; failures are logged and reported as `false`
pub fn forget(store: &dyn KeyValueStore, key: &str) -> bool {
    match store.delete(key) {
        Ok(()) => true,
        Err(e) => {
            error!(key, code = e.error_code(), "Failed to delete state: {}", e);
            false
        }
    }
}
