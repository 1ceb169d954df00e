//! Application layer - services built on the outbound ports.

pub mod services;
