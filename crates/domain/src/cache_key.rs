//! Canonical cache keys for proxied GET requests.

use std::fmt;

use url::form_urlencoded;

/// Cache identity of a GET request: path plus canonically ordered query.
///
/// Query parameters are sorted by name, then value, before serialising, so
/// `?q=snickare&limit=10` and `?limit=10&q=snickare` share one entry.
/// Repeated parameters are kept, since upstream APIs treat them as lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    query: String,
}

impl CacheKey {
    pub fn new(path: &str, raw_query: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            query: canonical_query(raw_query.unwrap_or_default()),
        }
    }

    /// The normalised query string (no leading `?`).
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.query.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}?{}", self.path, self.query)
        }
    }
}

/// Decode, sort and re-encode a query string.
pub fn canonical_query(raw: &str) -> String {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();
    pairs.sort();

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reordered_params_share_key() {
        let a = CacheKey::new("/search", Some("q=snickare&limit=10&offset=0"));
        let b = CacheKey::new("/search", Some("offset=0&q=snickare&limit=10"));
        assert_eq!(a, b);
        assert_eq!(a.query(), "limit=10&offset=0&q=snickare");
    }

    #[test]
    fn different_paths_differ() {
        let a = CacheKey::new("/search", Some("q=x"));
        let b = CacheKey::new("/complete", Some("q=x"));
        assert_ne!(a, b);
    }

    #[test]
    fn repeated_params_are_kept_and_ordered() {
        let a = CacheKey::new("/search", Some("region=01&region=14&q=kock"));
        let b = CacheKey::new("/search", Some("region=14&q=kock&region=01"));
        assert_eq!(a, b);
        assert_eq!(a.query(), "q=kock&region=01&region=14");
    }

    #[test]
    fn encoding_differences_normalise() {
        let a = CacheKey::new("/search", Some("q=j%C3%A4rn+arbete"));
        let b = CacheKey::new("/search", Some("q=järn%20arbete"));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_and_empty_query_are_equal() {
        assert_eq!(CacheKey::new("/ad/1", None), CacheKey::new("/ad/1", Some("")));
        assert_eq!(CacheKey::new("/ad/1", None).to_string(), "/ad/1");
    }
}
