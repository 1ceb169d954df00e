//! Outbound ports - Interfaces for platform services
//!
//! Application services depend on these traits only; adapters live in
//! `infrastructure::platform`.

pub mod platform;

pub use platform::{storage_keys, StorageError, StorageProvider, TimeProvider};
