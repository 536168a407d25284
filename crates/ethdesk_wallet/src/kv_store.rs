use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::WalletError;

/// String key-value persistence, the shape of a platform preferences store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError>;
    fn put(&self, key: &str, value: &str) -> Result<(), WalletError>;

    /// Reset `key` to the empty marker. Stores that can be unreadable as a
    /// whole must still succeed here.
    fn clear(&self, key: &str) -> Result<(), WalletError> {
        self.put(key, "")
    }
}

/// Preferences kept as one JSON object on disk.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct PreferencesFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PreferencesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, WalletError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            WalletError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("preferences file {} is not a JSON object: {e}", self.path.display()),
            ))
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), WalletError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, map).map_err(io::Error::from)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| WalletError::Io(e.error))?;

        debug!(path = %self.path.display(), keys = map.len(), "preferences written");
        Ok(())
    }
}

impl KeyValueStore for PreferencesFile {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), WalletError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn clear(&self, key: &str) -> Result<(), WalletError> {
        let _guard = self.lock.lock();
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(WalletError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                let backup = self.path.with_extension("json.corrupt");
                std::fs::rename(&self.path, &backup)?;
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    "unreadable preferences file moved aside"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        map.insert(key.to_string(), String::new());
        self.write_map(&map)
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.entries.lock().insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
