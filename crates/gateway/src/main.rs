//! Deltagarportalen Gateway - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deltagarportalen_gateway::api;
use deltagarportalen_gateway::api::proxy::ResponseCache;
use deltagarportalen_gateway::infrastructure::cache::TtlCache;
use deltagarportalen_gateway::infrastructure::http_upstream::HttpUpstream;
use deltagarportalen_gateway::{Gateway, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the gateway may be started from `crates/gateway`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deltagarportalen_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Deltagarportalen Gateway");

    let config = GatewayConfig::from_env()?;
    for route in &config.routes {
        tracing::info!(
            route = %route.name,
            prefix = %route.prefix,
            upstream = %route.upstream_base,
            timeout_ms = route.timeout.as_millis() as u64,
            cache = route.cache,
            "Proxy route configured"
        );
    }

    // Sweep expired entries at the TTL cadence.
    let cache: Arc<ResponseCache> = Arc::new(TtlCache::new(config.cache_ttl));
    let _sweeper = cache.spawn_sweeper(config.cache_ttl);
    tracing::info!(ttl_secs = config.cache_ttl.as_secs(), "Response cache enabled");

    let gateway = Arc::new(Gateway::from_config(
        &config,
        cache,
        Arc::new(HttpUpstream::new()),
    ));

    let router = api::http::routes()
        .with_state(gateway)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
