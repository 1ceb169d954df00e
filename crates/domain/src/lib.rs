//! Deltagarportalen domain vocabulary.
//!
//! Types shared by the player (autosave) and the gateway (proxy/cache).
//! Nothing in this crate performs I/O.

pub mod cache_key;
pub mod draft;
pub mod error;
pub mod gateway_body;

pub use cache_key::CacheKey;
pub use draft::{DraftKey, DraftPayload, DraftSnapshot, AUTOSAVE_KEY_PREFIX, TIMESTAMP_FIELD};
pub use error::{DomainError, SnapshotError};
pub use gateway_body::{GatewayErrorBody, SearchFallbackBody, SearchTotal};
