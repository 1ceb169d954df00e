//! HTTP routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::routing::get;
use axum::Router;

use crate::api::proxy::{Gateway, ProxyRequest, ProxyResponse};

/// Create all HTTP routes. Anything that is not `/health` is proxied.
pub fn routes() -> Router<Arc<Gateway>> {
    Router::new()
        .route("/health", get(health))
        .fallback(proxy)
}

async fn health() -> &'static str {
    "OK"
}

async fn proxy(
    State(gateway): State<Arc<Gateway>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> ProxyResponse {
    let request = ProxyRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    };
    gateway.handle(request).await
}
