//! Persisted string key-value storage.
//!
//! Filter state and the session id survive restarts through a
//! [`KeyValueStorage`]. [`FileStorage`] keeps every key in one JSON document;
//! [`MemoryStorage`] is for tests and ephemeral sessions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;

/// A simple string-keyed store.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON file.
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens (or lazily creates) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "opened file storage");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// `<data dir>/watchdeck/storage.json` for the current platform.
    pub fn default_path() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("watchdeck").join("storage.json"))
            .ok_or(StorageError::NoDataDir)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    /// Writes the updated document first; memory only changes once it is on disk.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").expect("get"), None);

        storage.set("k", "v").expect("set");
        assert_eq!(storage.get("k").expect("get"), Some("v".to_string()));

        let shared = storage.clone();
        shared.remove("k").expect("remove");
        assert_eq!(storage.get("k").expect("get"), None);
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("storage.json");

        let storage = FileStorage::open(&path).expect("open");
        storage.set("session", "abc").expect("set");
        storage.set("filters", "{}").expect("set");
        storage.remove("filters").expect("remove");
        drop(storage);

        let reopened = FileStorage::open(&path).expect("reopen");
        assert_eq!(reopened.get("session").expect("get"), Some("abc".to_string()));
        assert_eq!(reopened.get("filters").expect("get"), None);
    }

    #[test]
    fn test_file_storage_rejects_corrupt_document() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").expect("write");

        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_file_storage_treats_empty_file_as_empty() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("storage.json");
        fs::write(&path, "").expect("write");

        let storage = FileStorage::open(&path).expect("open");
        assert_eq!(storage.get("anything").expect("get"), None);
    }

    #[test]
    fn test_file_storage_keeps_memory_unchanged_when_write_fails() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("storage.json");
        let storage = FileStorage::open(&path).expect("open");
        storage.set("kept", "1").expect("set");

        // A directory in place of the temp file makes every write fail.
        fs::create_dir(path.with_extension("json.tmp")).expect("block temp file");

        assert!(storage.set("lost", "2").is_err());
        assert_eq!(storage.get("lost").expect("get"), None);
        assert!(storage.remove("kept").is_err());
        assert_eq!(storage.get("kept").expect("get"), Some("1".to_string()));

        let reopened = FileStorage::open(&path).expect("reopen");
        assert_eq!(reopened.get("kept").expect("get"), Some("1".to_string()));
        assert_eq!(reopened.get("lost").expect("get"), None);
    }
}
