//! Platform abstraction ports for cross-platform compatibility
//!
//! These traits abstract platform-specific operations so that:
//! 1. Application code remains platform-agnostic
//! 2. Platform-specific code is isolated in infrastructure
//! 3. Code becomes easily testable with in-memory implementations

use thiserror::Error;

/// Failure of the local key-value store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The store rejected the write for lack of space.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// No store is reachable (private browsing, missing window, poisoned lock).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backing file could not be read or written.
    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Time operations abstraction
pub trait TimeProvider: Clone + Send + Sync + 'static {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> u64;
}

/// Persistent storage abstraction (localStorage/file-based)
pub trait StorageProvider: Clone + Send + Sync + 'static {
    /// Save a string value with the given key, replacing any previous value
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Load a string value by key, returns None if not found
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove a value by key; removing a missing key succeeds
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage key constants
pub mod storage_keys {
    /// Desktop storage file name inside the platform config directory.
    pub const DESKTOP_STORAGE_FILE: &str = "storage.json";
}
