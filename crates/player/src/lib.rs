//! Deltagarportalen Player crate.
//!
//! Client-side plumbing shared by the portal's long forms (CV editor,
//! interest guide): local draft persistence with debounced autosave and
//! one-shot restore. Platform storage is selected at compile time.

pub mod application;
pub mod infrastructure;
pub mod ports;

pub use application::services::autosave_service::{AutosaveConfig, AutosaveController};
pub use infrastructure::platform::{default_storage, InMemoryStorageProvider};
pub use infrastructure::scheduler::ScheduledTask;
pub use ports::outbound::{StorageError, StorageProvider, TimeProvider};
