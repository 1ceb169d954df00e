//! JSON bodies the gateway produces on its own behalf.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalised failure body: `{ "error": "...", "status": 503 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayErrorBody {
    pub error: String,
    pub status: u16,
}

impl GatewayErrorBody {
    pub fn new(error: impl Into<String>, status: u16) -> Self {
        Self {
            error: error.into(),
            status,
        }
    }

    pub fn to_value(&self) -> Value {
        // Strings and integers only, so serialization cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// `total` block of a job search result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchTotal {
    pub value: u64,
}

/// Placeholder result served when the job search upstream is down.
///
/// Shaped like an empty search result so list views render an empty state,
/// and flagged with `mock: true` so callers can tell it apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFallbackBody {
    pub mock: bool,
    pub message: String,
    pub hits: Vec<Value>,
    pub total: SearchTotal,
}

impl SearchFallbackBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            mock: true,
            message: message.into(),
            hits: Vec::new(),
            total: SearchTotal::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
