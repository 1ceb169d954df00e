//! Gateway configuration.
//!
//! Read from environment variables (after `.env` loading in `main`). Every
//! variable has a default, so an empty environment yields a working gateway
//! pointed at the public JobTech APIs.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::infrastructure::cache::DEFAULT_TTL;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8888;

pub const DEFAULT_JOBSEARCH_BASE_URL: &str = "https://jobsearch.api.jobtechdev.se";
pub const DEFAULT_TAXONOMY_BASE_URL: &str = "https://taxonomy.api.jobtechdev.se/v1/taxonomy";
pub const DEFAULT_ENRICHMENTS_BASE_URL: &str = "https://jobad-enrichments-api.jobtechdev.se";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// Shortest autocomplete input forwarded upstream.
pub const AUTOCOMPLETE_MIN_CHARS: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("GATEWAY_ERROR_MODE must be 'normalized' or 'passthrough', got '{0}'")]
    InvalidErrorMode(String),

    #[error("Route '{route}' has invalid upstream URL '{url}'")]
    InvalidUpstreamUrl { route: String, url: String },

    #[error("Route '{route}' prefix '{prefix}' must start with '/' and not end with '/'")]
    InvalidPrefix { route: String, prefix: String },
}

/// How upstream failures are reported to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// HTTP 200 with an `{error, status}` body, so callers always get parseable JSON.
    #[default]
    Normalized,
    /// The same body, sent with the upstream-derived HTTP status.
    Passthrough,
}

impl FromStr for ErrorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normalized" | "normalised" => Ok(Self::Normalized),
            "passthrough" => Ok(Self::Passthrough),
            other => Err(ConfigError::InvalidErrorMode(other.to_string())),
        }
    }
}

/// Inputs below `min_chars` on `path` are answered locally with `[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteRule {
    pub path: String,
    pub param: String,
    pub min_chars: usize,
}

/// One forwarded API: requests under `prefix` go to `upstream_base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub name: String,
    pub prefix: String,
    pub upstream_base: String,
    pub timeout: Duration,
    /// Cache successful GET responses.
    pub cache: bool,
    pub autocomplete: Option<AutocompleteRule>,
    /// Upstream path answered with a mock empty result when the upstream fails.
    pub search_fallback_path: Option<String>,
    pub bearer_token: Option<String>,
}

impl ProxyRoute {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        upstream_base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            upstream_base: upstream_base.into(),
            timeout,
            cache: false,
            autocomplete: None,
            search_fallback_path: None,
            bearer_token: None,
        }
    }

    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn with_autocomplete(mut self, path: &str, param: &str, min_chars: usize) -> Self {
        self.autocomplete = Some(AutocompleteRule {
            path: path.to_string(),
            param: param.to_string(),
            min_chars,
        });
        self
    }

    pub fn with_search_fallback(mut self, path: &str) -> Self {
        self.search_fallback_path = Some(path.to_string());
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// The part of `path` after this route's prefix, or `None` if the route
    /// does not serve `path`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    /// Absolute upstream URL for an already-stripped path and raw query.
    pub fn target_url(&self, upstream_path: &str, query: Option<&str>) -> String {
        let base = self.upstream_base.trim_end_matches('/');
        match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{base}{upstream_path}?{query}"),
            None => format!("{base}{upstream_path}"),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.prefix.starts_with('/') || (self.prefix.len() > 1 && self.prefix.ends_with('/')) {
            return Err(ConfigError::InvalidPrefix {
                route: self.name.clone(),
                prefix: self.prefix.clone(),
            });
        }

        let valid_url = Url::parse(&self.upstream_base)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid_url {
            return Err(ConfigError::InvalidUpstreamUrl {
                route: self.name.clone(),
                url: self.upstream_base.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub cache_ttl: Duration,
    pub error_mode: ErrorMode,
    pub routes: Vec<ProxyRoute>,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var("GATEWAY_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var("GATEWAY_PORT").or_else(|| var("PORT")) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
                var: "GATEWAY_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };
        let cache_ttl = match var("GATEWAY_CACHE_TTL_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "GATEWAY_CACHE_TTL_SECS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_TTL,
        };
        let error_mode = match var("GATEWAY_ERROR_MODE") {
            Some(raw) => raw.parse::<ErrorMode>()?,
            None => ErrorMode::default(),
        };

        let routes = default_routes(
            var("JOBSEARCH_BASE_URL").unwrap_or_else(|| DEFAULT_JOBSEARCH_BASE_URL.to_string()),
            var("TAXONOMY_BASE_URL").unwrap_or_else(|| DEFAULT_TAXONOMY_BASE_URL.to_string()),
            var("ENRICHMENTS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ENRICHMENTS_BASE_URL.to_string()),
            var("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            var("LLM_API_KEY"),
        );

        let config = Self {
            host,
            port,
            cache_ttl,
            error_mode,
            routes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.routes.iter().try_for_each(ProxyRoute::validate)
    }
}

fn default_routes(
    jobsearch: String,
    taxonomy: String,
    enrichments: String,
    llm: String,
    llm_api_key: Option<String>,
) -> Vec<ProxyRoute> {
    vec![
        ProxyRoute::new("jobsearch", "/api/af-jobsearch", jobsearch, Duration::from_secs(10))
            .cached()
            .with_autocomplete("/complete", "q", AUTOCOMPLETE_MIN_CHARS)
            .with_search_fallback("/search"),
        ProxyRoute::new("taxonomy", "/api/af-taxonomy", taxonomy, Duration::from_secs(10))
            .cached(),
        ProxyRoute::new(
            "enrichments",
            "/api/af-enrichments",
            enrichments,
            Duration::from_secs(5),
        )
        .cached(),
        ProxyRoute::new("ai", "/api/ai", llm, Duration::from_secs(30))
            .with_bearer_token(llm_api_key),
    ]
}
