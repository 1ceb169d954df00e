//! Application services.

pub mod autosave_service;
