//! Unified error types for the domain layer

use thiserror::Error;

/// Error type for domain value construction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Draft keys identify a form and cannot be blank
    #[error("Draft key cannot be empty")]
    EmptyDraftKey,
}

/// Errors reading or writing a persisted draft snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The stored document is not a snapshot this crate wrote.
    #[error("Corrupted snapshot for '{key}': {reason}")]
    Corrupted { key: String, reason: String },

    /// Payload could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnapshotError {
    pub fn corrupted(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether the stored value should be treated as absent.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}
