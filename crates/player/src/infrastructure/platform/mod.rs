//! Platform-specific implementations
//!
//! Implements the storage and time ports from `ports::outbound::platform`.
//! The correct platform is selected at compile time based on the target architecture.

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(not(target_arch = "wasm32"))]
mod desktop;

mod memory;

pub use memory::InMemoryStorageProvider;

#[cfg(target_arch = "wasm32")]
pub use wasm::{WasmStorageProvider, WasmTimeProvider};

#[cfg(not(target_arch = "wasm32"))]
pub use desktop::{DesktopStorageProvider, SystemTimeProvider};

/// Storage provider for the current target.
#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = WasmStorageProvider;

/// Storage provider for the current target.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = DesktopStorageProvider;

/// Time provider for the current target.
#[cfg(target_arch = "wasm32")]
pub type PlatformTime = WasmTimeProvider;

/// Time provider for the current target.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformTime = SystemTimeProvider;

/// Create the storage provider for the current target.
pub fn default_storage() -> PlatformStorage {
    PlatformStorage::new()
}
