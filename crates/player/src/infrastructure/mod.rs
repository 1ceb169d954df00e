//! Infrastructure - platform adapters and task scheduling.

pub mod platform;
pub mod scheduler;
