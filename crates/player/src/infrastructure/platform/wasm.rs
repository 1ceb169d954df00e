//! WASM platform implementations
//!
//! Backed by the browser's `window.localStorage` and `Date.now()`.

use crate::ports::outbound::{StorageError, StorageProvider, TimeProvider};

/// Browser time provider using `Date.now()`
#[derive(Clone, Default)]
pub struct WasmTimeProvider;

impl TimeProvider for WasmTimeProvider {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

/// Browser storage provider using `localStorage`
///
/// Holds no JS handles, so it stays `Send + Sync`; the storage object is
/// looked up on every call.
#[derive(Clone, Default)]
pub struct WasmStorageProvider;

impl WasmStorageProvider {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> Result<web_sys::Storage, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window object".to_string()))?;
        window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".to_string()))
    }
}

impl StorageProvider for WasmStorageProvider {
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Browsers reject setItem with a QuotaExceededError DOMException.
        Self::storage()?
            .set_item(key, value)
            .map_err(|_| StorageError::QuotaExceeded)
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
    }
}
