//! Desktop platform implementations
//!
//! Provides platform-specific implementations for desktop using
//! standard library and native crates.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use directories::ProjectDirs;

use crate::ports::outbound::{storage_keys, StorageError, StorageProvider, TimeProvider};

/// Desktop time provider using std::time
#[derive(Clone, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Desktop storage provider with file-based persistence
///
/// Stores key-value pairs in a JSON file at:
/// - Linux: ~/.config/deltagarportalen/storage.json
/// - macOS: ~/Library/Application Support/se.deltagarportalen.Deltagarportalen/storage.json
/// - Windows: C:\Users\<User>\AppData\Roaming\deltagarportalen\Deltagarportalen\config\storage.json
///
/// Several providers may point at the same file (one per open form). Every
/// operation re-reads the file before applying its change, so a write from
/// one provider never drops keys another provider wrote in the meantime.
#[derive(Clone)]
pub struct DesktopStorageProvider {
    /// Path to the storage file
    storage_path: PathBuf,
    /// Last contents read from or written to the file
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl Default for DesktopStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopStorageProvider {
    /// Create a storage provider in the platform config directory.
    pub fn new() -> Self {
        let storage_path =
            if let Some(dirs) = ProjectDirs::from("se", "deltagarportalen", "Deltagarportalen") {
                dirs.config_dir().join(storage_keys::DESKTOP_STORAGE_FILE)
            } else {
                // Fallback to current directory if project dirs unavailable
                PathBuf::from("deltagarportalen_storage.json")
            };

        Self::with_path(storage_path)
    }

    /// Create a storage provider backed by an explicit file.
    pub fn with_path(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();
        let cache = load_file(&storage_path);

        tracing::debug!(path = ?storage_path, entries = cache.len(), "Desktop storage initialized");

        Self {
            storage_path,
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Replace the mirror with the current file contents.
    fn refresh(&self, mirror: &mut HashMap<String, String>) {
        *mirror = load_file(&self.storage_path);
    }

    /// Write the mirror to disk.
    fn persist(&self, snapshot: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        fs::write(&self.storage_path, data)?;
        Ok(())
    }

    fn lock_poisoned(e: impl std::fmt::Display) -> StorageError {
        StorageError::Unavailable(format!("storage lock poisoned: {e}"))
    }
}

// A corrupted file is treated as empty; the next successful save replaces it.
fn load_file(path: &Path) -> HashMap<String, String> {
    if !path.exists() {
        return HashMap::new();
    }

    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str::<HashMap<String, String>>(&data) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to parse storage file");
                HashMap::new()
            }
        },
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Failed to read storage file");
            HashMap::new()
        }
    }
}

impl StorageProvider for DesktopStorageProvider {
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.cache.write().map_err(Self::lock_poisoned)?;
        self.refresh(&mut guard);
        let previous = guard.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&guard) {
            // Keep the mirror in step with the file.
            match previous {
                Some(old) => guard.insert(key.to_string(), old),
                None => guard.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut guard = self.cache.write().map_err(Self::lock_poisoned)?;
        self.refresh(&mut guard);
        Ok(guard.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.cache.write().map_err(Self::lock_poisoned)?;
        self.refresh(&mut guard);
        if guard.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&guard)
    }
}
