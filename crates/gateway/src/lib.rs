//! Deltagarportalen Gateway library.
//!
//! A same-origin proxy in front of the public job-market APIs (job search,
//! taxonomy, enrichments) and the chat-completion provider.
//!
//! ## Structure
//!
//! - `config` - Environment-driven configuration and route table
//! - `infrastructure/` - Response cache and the upstream HTTP client (ports + adapters)
//! - `api/` - The proxy handler and the HTTP router

pub mod api;
pub mod config;
pub mod infrastructure;

pub use api::proxy::{Gateway, ProxyRequest, ProxyResponse};
pub use config::{ErrorMode, GatewayConfig, ProxyRoute};
