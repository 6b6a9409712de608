use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{KeyValueStore, StoreError};

/// File-backed store: one JSON object per store, rewritten on every change.
///
/// The data set is three small keys, so read-modify-write of the whole file
/// is fine; the lock serializes writers within the process.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create the parent directory for) a store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Open the store at the platform data directory
    /// (e.g. `~/.local/share/pyground/store.json` on Linux).
    pub fn in_default_location() -> Result<Self, StoreError> {
        let dirs = directories::ProjectDirs::from("", "", "pyground")
            .ok_or_else(|| StoreError::Io("No home directory available".to_string()))?;
        Self::open(dirs.data_dir().join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value =
            serde_json::from_str(&text).map_err(|e| StoreError::Malformed(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Malformed(format!(
                "expected a JSON object, found {}",
                other
            ))),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        let text = serde_json::to_string(map).map_err(|e| StoreError::Malformed(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| StoreError::Io(e.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock();
        let map = self.read_map()?;
        Ok(map.get(key).and_then(|v| v.as_str()).map(|s| s.to_string()))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}
