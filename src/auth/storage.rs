//! Key/value persistence for credentials
//!
//! [`KeyValueStore`] is the small string-keyed interface the credential
//! layer writes through. [`MemoryStore`] keeps everything in process;
//! [`FileStore`] persists a single JSON object to disk with user-only
//! permissions, so a session survives a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PasaleError, Result};

/// One pending change: `Some(value)` sets the key, `None` removes it
pub type Change<'a> = (&'a str, Option<String>);

/// String key/value storage
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a key
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Apply a batch of changes as one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written. On error
    /// none of the changes are visible.
    fn apply(&self, changes: &[Change<'_>]) -> Result<()>;

    /// Set a single key
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(&[(key, Some(value.to_string()))])
    }

    /// Remove a single key; removing a missing key is not an error
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    fn remove(&self, key: &str) -> Result<()> {
        self.apply(&[(key, None)])
    }
}

fn apply_to_map(map: &mut BTreeMap<String, String>, changes: &[Change<'_>]) {
    for (key, value) in changes {
        match value {
            Some(v) => {
                map.insert((*key).to_string(), v.clone());
            }
            None => {
                map.remove(*key);
            }
        }
    }
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Snapshot of every entry
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PasaleError::storage("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, changes: &[Change<'_>]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PasaleError::storage("memory store lock poisoned"))?;
        apply_to_map(&mut entries, changes);
        Ok(())
    }
}

/// JSON-file backed store
///
/// The whole file is rewritten on every batch, through a temporary file
/// and a rename, so readers never observe a half-written session.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(map)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn apply(&self, changes: &[Change<'_>]) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PasaleError::storage("file store lock poisoned"))?;
        let mut map = self.read_map()?;
        apply_to_map(&mut map, changes);
        self.write_map(&map)
    }
}
