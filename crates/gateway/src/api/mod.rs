//! API layer - proxy handler and HTTP entry points.

pub mod http;
pub mod proxy;
