//! In-memory storage provider.
//!
//! Backs tests and callers that want drafts kept for the session only.
//! Clones share the same map, like handles to one `localStorage`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ports::outbound::{StorageError, StorageProvider};

#[derive(Clone, Default)]
pub struct InMemoryStorageProvider {
    data: Arc<RwLock<HashMap<String, String>>>,
    /// Maximum total bytes of keys plus values, mirroring browser quotas.
    quota_bytes: Option<usize>,
}

impl InMemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes beyond `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            data: Arc::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(e: impl std::fmt::Display) -> StorageError {
    StorageError::Unavailable(format!("storage lock poisoned: {e}"))
}

impl StorageProvider for InMemoryStorageProvider {
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.data.write().map_err(poisoned)?;

        if let Some(quota) = self.quota_bytes {
            let used: usize = guard
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.read().map_err(poisoned)?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().map_err(poisoned)?.remove(key);
        Ok(())
    }
}
