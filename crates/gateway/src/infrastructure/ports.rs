//! Port traits for infrastructure boundaries.
//!
//! The upstream API is the only external dependency the gateway has; it sits
//! behind `UpstreamPort` so the proxy logic can be tested without a network.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::Method;
use serde_json::Value;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream returned status {0}")]
    Status(u16),
    #[error("Upstream request timed out")]
    Timeout,
    #[error("Upstream unreachable: {0}")]
    Network(String),
    #[error("Upstream sent an invalid body: {0}")]
    InvalidBody(String),
}

impl UpstreamError {
    /// HTTP status reported in the normalized error body.
    pub fn status(&self) -> u16 {
        match self {
            Self::Status(status) => *status,
            Self::Timeout => 504,
            Self::Network(_) | Self::InvalidBody(_) => 502,
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// A request to forward to an upstream API.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Absolute target URL including the query string.
    pub url: String,
    /// Inbound body, only forwarded for methods other than GET and HEAD.
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub bearer_token: Option<String>,
}

// =============================================================================
// Upstream Port
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamPort: Send + Sync {
    /// Forward a request and return the parsed JSON body of a 2xx response.
    async fn forward(&self, request: UpstreamRequest) -> Result<Value, UpstreamError>;
}
