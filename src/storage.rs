//! Key-value persistence for funnel snapshots.
//!
//! The store only needs a single opaque key holding the latest serialized
//! snapshot. Reads happen once at startup, writes after every change, and
//! write failures are never fatal.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key the snapshot is stored under.
pub const STORAGE_KEY: &str = "funnel-builder";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage is unavailable")]
    Unavailable,
}

/// A get/set blob store.
///
/// `set` takes `&self` so a storage can be shared with the host; implementations
/// use interior mutability where they need it.
pub trait SnapshotStorage {
    /// The stored value, or `None` when missing or unreadable.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
    read_only: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with one entry.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        storage
    }

    /// Storage whose writes always fail, like a browser in private mode.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

impl SnapshotStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::Unavailable);
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: SnapshotStorage + ?Sized> SnapshotStorage for std::rc::Rc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Some(raw),
            Err(err) => {
                log::debug!("no snapshot at {}: {}", path.display(), err);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(STORAGE_KEY), None);
        storage.set(STORAGE_KEY, "{}").unwrap();
        assert_eq!(storage.get(STORAGE_KEY).as_deref(), Some("{}"));
    }

    #[test]
    fn test_read_only_storage_fails_writes() {
        let storage = MemoryStorage::read_only();
        assert!(matches!(storage.set(STORAGE_KEY, "{}"), Err(StorageError::Unavailable)));
        assert_eq!(storage.get(STORAGE_KEY), None);
    }

    #[test]
    fn test_shared_storage_through_rc() {
        let shared = std::rc::Rc::new(MemoryStorage::new());
        let handle = shared.clone();
        handle.set("k", "v").unwrap();
        assert_eq!(shared.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let scratch = tempfile::tempdir().unwrap();
        // Not created yet; the first write makes it
        let dir = scratch.path().join("store");
        let storage = FileStorage::new(&dir);

        assert_eq!(storage.get("missing"), None);
        storage.set(STORAGE_KEY, "first").unwrap();
        storage.set(STORAGE_KEY, "second").unwrap();
        assert_eq!(storage.get(STORAGE_KEY).as_deref(), Some("second"));
        assert!(!dir.join(".funnel-builder.json.tmp").exists());
    }
}
