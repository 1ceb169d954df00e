//! Draft snapshots of in-progress form state.
//!
//! A snapshot is persisted as the caller's field map with one injected
//! `_timestamp` field holding the save time in epoch milliseconds:
//!
//! ```json
//! { "summary": "Jag är snickare", "_timestamp": 1718000000000 }
//! ```
//!
//! The timestamp is stripped again when the snapshot is read back, so the
//! payload handed to the caller is exactly what it observed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, SnapshotError};

/// Prefix for every storage key written by the autosave controller.
pub const AUTOSAVE_KEY_PREFIX: &str = "autosave-";

/// Field injected into the stored document.
pub const TIMESTAMP_FIELD: &str = "_timestamp";

/// Opaque form state: field name to value. Never interpreted here.
pub type DraftPayload = Map<String, Value>;

/// Identity of the logical form a draft belongs to (e.g. `cv-editor`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DraftKey(String);

impl DraftKey {
    /// Create a validated draft key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyDraftKey` if the key is blank after trimming.
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyDraftKey);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the snapshot lives in local storage.
    pub fn storage_key(&self) -> String {
        format!("{AUTOSAVE_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DraftKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DraftKey> for String {
    fn from(key: DraftKey) -> Self {
        key.0
    }
}

/// A persisted copy of in-progress form data.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSnapshot {
    key: DraftKey,
    payload: DraftPayload,
    saved_at: DateTime<Utc>,
}

impl DraftSnapshot {
    pub fn new(key: DraftKey, payload: DraftPayload, saved_at: DateTime<Utc>) -> Self {
        Self {
            key,
            payload,
            saved_at,
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn payload(&self) -> &DraftPayload {
        &self.payload
    }

    pub fn into_payload(self) -> DraftPayload {
        self.payload
    }

    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    /// Deserialize the payload into a typed form model.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, SnapshotError> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }

    /// Render the stored document: payload plus `_timestamp`.
    ///
    /// A caller field named `_timestamp` is overwritten.
    pub fn to_stored_json(&self) -> Result<String, SnapshotError> {
        let mut document = self.payload.clone();
        document.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::from(self.saved_at.timestamp_millis()),
        );
        Ok(serde_json::to_string(&Value::Object(document))?)
    }

    /// Parse a stored document back into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Corrupted` if the document is not a JSON object
    /// or lacks a numeric `_timestamp` that fits a valid date.
    pub fn from_stored_json(key: DraftKey, raw: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| SnapshotError::corrupted(key.as_str(), e.to_string()))?;

        let Value::Object(mut document) = value else {
            return Err(SnapshotError::corrupted(
                key.as_str(),
                "stored draft is not a JSON object",
            ));
        };

        let millis = document
            .remove(TIMESTAMP_FIELD)
            .as_ref()
            .and_then(timestamp_millis)
            .ok_or_else(|| {
                SnapshotError::corrupted(key.as_str(), "missing or invalid _timestamp")
            })?;

        let saved_at = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            SnapshotError::corrupted(key.as_str(), format!("_timestamp {millis} out of range"))
        })?;

        Ok(Self {
            key,
            payload: document,
            saved_at,
        })
    }
}

// Browsers write `Date.now()`, which is an integer, but tolerate floats.
fn timestamp_millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}
