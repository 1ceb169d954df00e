//! The proxy handler.
//!
//! `Gateway::handle` turns any inbound request into exactly one JSON
//! response. The browser never sees a transport error from here: upstream
//! failures become an `{error, status}` body, short autocomplete input is
//! answered locally, and a failing job search degrades to a flagged empty
//! result.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use deltagarportalen_domain::{CacheKey, GatewayErrorBody, SearchFallbackBody};
use serde_json::Value;
use url::form_urlencoded;

use crate::config::{AutocompleteRule, ErrorMode, GatewayConfig, ProxyRoute};
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::ports::{UpstreamError, UpstreamPort, UpstreamRequest};

/// Cache shared between requests; injected so tests can observe it.
pub type ResponseCache = TtlCache<CacheKey, Value>;

const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

const SEARCH_UNAVAILABLE_MESSAGE: &str =
    "Job search is temporarily unavailable; showing no results";

/// Inbound request, already detached from the HTTP framework.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn get(path: &str, query: Option<&str>) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
            query: query.map(str::to_string),
            body: Bytes::new(),
        }
    }
}

/// How a response relates to the cache, reported in `X-Cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    fn header_value(self) -> HeaderValue {
        match self {
            Self::Hit => HeaderValue::from_static("HIT"),
            Self::Miss => HeaderValue::from_static("MISS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    status: StatusCode,
    /// `None` only for preflight answers.
    body: Option<Value>,
    cache: Option<CacheStatus>,
}

impl ProxyResponse {
    fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            cache: None,
        }
    }

    fn ok(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    fn preflight() -> Self {
        Self {
            status: StatusCode::OK,
            body: None,
            cache: None,
        }
    }

    fn error(mode: ErrorMode, message: impl Into<String>, status: u16) -> Self {
        let http_status = match mode {
            ErrorMode::Normalized => StatusCode::OK,
            ErrorMode::Passthrough => {
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        };
        Self::json(http_status, GatewayErrorBody::new(message, status).to_value())
    }

    fn with_cache(mut self, cache: CacheStatus) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn cache_status(&self) -> Option<CacheStatus> {
        self.cache
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, axum::Json(body)).into_response(),
            None => self.status.into_response(),
        };

        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
        );
        if let Some(cache) = self.cache {
            headers.insert(CACHE_STATUS_HEADER, cache.header_value());
        }
        response
    }
}

/// Forwards requests to the configured upstream APIs.
pub struct Gateway {
    /// Sorted by descending prefix length so the most specific route wins.
    routes: Vec<ProxyRoute>,
    error_mode: ErrorMode,
    cache: Arc<ResponseCache>,
    upstream: Arc<dyn UpstreamPort>,
}

impl Gateway {
    pub fn new(
        mut routes: Vec<ProxyRoute>,
        error_mode: ErrorMode,
        cache: Arc<ResponseCache>,
        upstream: Arc<dyn UpstreamPort>,
    ) -> Self {
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self {
            routes,
            error_mode,
            cache,
            upstream,
        }
    }

    pub fn from_config(
        config: &GatewayConfig,
        cache: Arc<ResponseCache>,
        upstream: Arc<dyn UpstreamPort>,
    ) -> Self {
        Self::new(config.routes.clone(), config.error_mode, cache, upstream)
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        if request.method == Method::OPTIONS {
            return ProxyResponse::preflight();
        }

        let Some((route, upstream_path)) = self.match_route(&request.path) else {
            tracing::debug!(path = %request.path, "No route for path");
            return ProxyResponse::error(
                self.error_mode,
                format!("No upstream configured for {}", request.path),
                StatusCode::NOT_FOUND.as_u16(),
            );
        };

        let query = request.query.as_deref();

        if let Some(rule) = &route.autocomplete {
            if is_short_autocomplete(rule, upstream_path, query) {
                return ProxyResponse::ok(Value::Array(Vec::new()));
            }
        }

        let cache_key = (route.cache && request.method == Method::GET)
            .then(|| CacheKey::new(&request.path, query));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache.get(key).await {
                tracing::debug!(route = %route.name, key = %key, "Cache hit");
                return ProxyResponse::ok(cached).with_cache(CacheStatus::Hit);
            }
        }

        let forwards_body = request.method != Method::GET && request.method != Method::HEAD;
        let upstream_request = UpstreamRequest {
            url: route.target_url(upstream_path, query),
            body: forwards_body.then_some(request.body),
            method: request.method,
            timeout: route.timeout,
            bearer_token: route.bearer_token.clone(),
        };
        let url = upstream_request.url.clone();

        match self.upstream.forward(upstream_request).await {
            Ok(body) => match cache_key {
                Some(key) => {
                    self.cache.insert(key, body.clone()).await;
                    ProxyResponse::ok(body).with_cache(CacheStatus::Miss)
                }
                None => ProxyResponse::ok(body),
            },
            Err(e) => self.upstream_failure(route, upstream_path, &url, e),
        }
    }

    fn match_route<'a, 'p>(&'a self, path: &'p str) -> Option<(&'a ProxyRoute, &'p str)> {
        self.routes
            .iter()
            .find_map(|route| route.strip(path).map(|rest| (route, rest)))
    }

    fn upstream_failure(
        &self,
        route: &ProxyRoute,
        upstream_path: &str,
        url: &str,
        error: UpstreamError,
    ) -> ProxyResponse {
        tracing::warn!(route = %route.name, url = %url, error = %error, "Upstream request failed");

        if route.search_fallback_path.as_deref() == Some(upstream_path) {
            return ProxyResponse::ok(SearchFallbackBody::new(SEARCH_UNAVAILABLE_MESSAGE).to_value());
        }

        ProxyResponse::error(self.error_mode, error.to_string(), error.status())
    }
}

fn is_short_autocomplete(rule: &AutocompleteRule, upstream_path: &str, query: Option<&str>) -> bool {
    if upstream_path != rule.path {
        return false;
    }

    let input = query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(name, _)| name == rule.param.as_str())
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default();

    input.trim().chars().count() < rule.min_chars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::DEFAULT_TTL;
    use crate::infrastructure::ports::MockUpstreamPort;
    use serde_json::json;
    use std::time::Duration;

    fn routes() -> Vec<ProxyRoute> {
        vec![
            ProxyRoute::new(
                "jobsearch",
                "/api/af-jobsearch",
                "https://jobsearch.example",
                Duration::from_secs(10),
            )
            .cached()
            .with_autocomplete("/complete", "q", 2)
            .with_search_fallback("/search"),
            ProxyRoute::new(
                "taxonomy",
                "/api/af-taxonomy",
                "https://taxonomy.example/v1/taxonomy",
                Duration::from_secs(3),
            )
            .cached(),
            ProxyRoute::new("ai", "/api/ai", "https://llm.example/v1", Duration::from_secs(30))
                .with_bearer_token(Some("sk-test".to_string())),
        ]
    }

    fn gateway(upstream: MockUpstreamPort) -> Gateway {
        gateway_with_mode(upstream, ErrorMode::Normalized)
    }

    fn gateway_with_mode(upstream: MockUpstreamPort, mode: ErrorMode) -> Gateway {
        Gateway::new(
            routes(),
            mode,
            Arc::new(TtlCache::new(DEFAULT_TTL)),
            Arc::new(upstream),
        )
    }

    #[tokio::test]
    async fn preflight_is_answered_locally() {
        let mut upstream = MockUpstreamPort::new();
        upstream.expect_forward().never();

        let response = gateway(upstream)
            .handle(ProxyRequest {
                method: Method::OPTIONS,
                ..ProxyRequest::get("/api/af-jobsearch/search", None)
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), None);
    }

    #[tokio::test]
    async fn strips_prefix_and_passes_query_through() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .withf(|req| {
                req.url == "https://taxonomy.example/v1/taxonomy/main/concepts?type=occupation-name&q=kock"
                    && req.method == Method::GET
                    && req.body.is_none()
                    && req.timeout == Duration::from_secs(3)
            })
            .times(1)
            .returning(|_| Ok(json!([{ "id": "abc" }])));

        let response = gateway(upstream)
            .handle(ProxyRequest::get(
                "/api/af-taxonomy/main/concepts",
                Some("type=occupation-name&q=kock"),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), Some(&json!([{ "id": "abc" }])));
        assert_eq!(response.cache_status(), Some(CacheStatus::Miss));
    }

    #[tokio::test]
    async fn reordered_query_hits_cache() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .times(1)
            .returning(|_| Ok(json!({ "hits": [{ "id": "1" }] })));
        let gateway = gateway(upstream);

        let first = gateway
            .handle(ProxyRequest::get("/api/af-jobsearch/search", Some("q=kock&limit=10")))
            .await;
        let second = gateway
            .handle(ProxyRequest::get("/api/af-jobsearch/search", Some("limit=10&q=kock")))
            .await;
        let third = gateway
            .handle(ProxyRequest::get("/api/af-jobsearch/search", Some("q=kock&limit=10")))
            .await;

        assert_eq!(first.cache_status(), Some(CacheStatus::Miss));
        assert_eq!(second.cache_status(), Some(CacheStatus::Hit));
        assert_eq!(third.cache_status(), Some(CacheStatus::Hit));
        assert_eq!(first.body(), second.body());
        assert_eq!(gateway.cache().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_fetched_again() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .times(2)
            .returning(|_| Ok(json!({ "concepts": [] })));
        let gateway = gateway(upstream);
        let request = ProxyRequest::get("/api/af-taxonomy/main/concepts", Some("type=region"));

        gateway.handle(request.clone()).await;
        tokio::time::advance(DEFAULT_TTL).await;
        let response = gateway.handle(request).await;

        assert_eq!(response.cache_status(), Some(CacheStatus::Miss));
    }

    #[tokio::test]
    async fn upstream_503_becomes_200_with_error_body() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .returning(|_| Err(UpstreamError::Status(503)));

        let response = gateway(upstream)
            .handle(ProxyRequest::get("/api/af-taxonomy/main/concepts", None))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.body(),
            Some(&json!({ "error": "Upstream returned status 503", "status": 503 }))
        );
    }

    #[tokio::test]
    async fn timeout_becomes_504_error_body() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .returning(|_| Err(UpstreamError::Timeout));

        let response = gateway(upstream)
            .handle(ProxyRequest::get("/api/af-jobsearch/ad/123", None))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().unwrap()["status"], json!(504));
    }

    #[tokio::test]
    async fn passthrough_mode_keeps_status() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .returning(|_| Err(UpstreamError::Status(503)));

        let response = gateway_with_mode(upstream, ErrorMode::Passthrough)
            .handle(ProxyRequest::get("/api/af-taxonomy/main/concepts", None))
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body().unwrap()["status"], json!(503));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let mut upstream = MockUpstreamPort::new();
        let mut seq = mockall::Sequence::new();
        upstream
            .expect_forward()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(UpstreamError::Network("reset".into())));
        upstream
            .expect_forward()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({ "concepts": [] })));
        let gateway = gateway(upstream);
        let request = ProxyRequest::get("/api/af-taxonomy/main/concepts", None);

        let failed = gateway.handle(request.clone()).await;
        let recovered = gateway.handle(request).await;

        assert_eq!(failed.body().unwrap()["status"], json!(502));
        assert_eq!(recovered.body(), Some(&json!({ "concepts": [] })));
    }

    #[tokio::test]
    async fn short_autocomplete_skips_upstream() {
        let mut upstream = MockUpstreamPort::new();
        upstream.expect_forward().never();
        let gateway = gateway(upstream);

        for query in [Some("q=s"), Some("q="), Some("limit=10"), None, Some("q=%20k%20")] {
            let response = gateway
                .handle(ProxyRequest::get("/api/af-jobsearch/complete", query))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.body(), Some(&json!([])), "query {query:?}");
        }
    }

    #[tokio::test]
    async fn two_char_autocomplete_is_forwarded() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .withf(|req| req.url == "https://jobsearch.example/complete?q=%C3%A4l")
            .times(1)
            .returning(|_| Ok(json!({ "typeahead": [{ "value": "älvkarleby" }] })));

        let response = gateway(upstream)
            .handle(ProxyRequest::get("/api/af-jobsearch/complete", Some("q=%C3%A4l")))
            .await;

        assert_eq!(response.body().unwrap()["typeahead"][0]["value"], json!("älvkarleby"));
    }

    #[tokio::test]
    async fn failing_search_falls_back_to_mock() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .returning(|_| Err(UpstreamError::Status(500)));

        let response = gateway_with_mode(upstream, ErrorMode::Passthrough)
            .handle(ProxyRequest::get("/api/af-jobsearch/search", Some("q=kock")))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.body().unwrap();
        assert_eq!(body["mock"], json!(true));
        assert_eq!(body["hits"], json!([]));
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn other_jobsearch_paths_do_not_fall_back() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .returning(|_| Err(UpstreamError::Status(500)));

        let response = gateway(upstream)
            .handle(ProxyRequest::get("/api/af-jobsearch/ad/42", None))
            .await;

        assert_eq!(response.body().unwrap()["error"], json!("Upstream returned status 500"));
    }

    #[tokio::test]
    async fn post_forwards_body_and_token_without_caching() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .withf(|req| {
                req.method == Method::POST
                    && req.url == "https://llm.example/v1/chat/completions"
                    && req.body.as_deref() == Some(br#"{"messages":[]}"#.as_slice())
                    && req.bearer_token.as_deref() == Some("sk-test")
            })
            .times(2)
            .returning(|_| Ok(json!({ "choices": [] })));
        let gateway = gateway(upstream);
        let request = ProxyRequest {
            method: Method::POST,
            body: Bytes::from_static(br#"{"messages":[]}"#),
            ..ProxyRequest::get("/api/ai/chat/completions", None)
        };

        let first = gateway.handle(request.clone()).await;
        gateway.handle(request).await;

        assert_eq!(first.cache_status(), None);
        assert!(gateway.cache().is_empty().await);
    }

    #[tokio::test]
    async fn unknown_route_is_normalized_404() {
        let mut upstream = MockUpstreamPort::new();
        upstream.expect_forward().never();

        let response = gateway(upstream)
            .handle(ProxyRequest::get("/api/unknown/thing", None))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().unwrap()["status"], json!(404));
    }

    #[tokio::test]
    async fn response_headers_allow_any_origin() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_forward()
            .returning(|_| Ok(json!({ "ok": true })));

        let response = gateway(upstream)
            .handle(ProxyRequest::get("/api/af-taxonomy/versions", None))
            .await
            .into_response();

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers["x-cache"], "MISS");
    }

    #[test]
    fn most_specific_prefix_wins() {
        let mut routes = routes();
        routes.push(ProxyRoute::new(
            "jobsearch-v2",
            "/api/af-jobsearch/v2",
            "https://v2.example",
            Duration::from_secs(1),
        ));
        let gateway = Gateway::new(
            routes,
            ErrorMode::Normalized,
            Arc::new(TtlCache::new(DEFAULT_TTL)),
            Arc::new(MockUpstreamPort::new()),
        );

        let (route, rest) = gateway.match_route("/api/af-jobsearch/v2/search").unwrap();
        assert_eq!(route.name, "jobsearch-v2");
        assert_eq!(rest, "/search");
    }
}
