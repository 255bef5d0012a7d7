//! Deterministic cache keys for requests

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters kept from the parameter digest
const DIGEST_LEN: usize = 16;

/// Identifier derived from `(method, url, params)`.
///
/// Parameters are sorted by name before hashing, so logically identical
/// requests collide regardless of argument order. The URL stays readable in
/// the key because entity invalidation matches on substrings of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_request<K, V>(method: &str, url: &str, params: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let method = method.to_ascii_uppercase();
        if params.is_empty() {
            return CacheKey(format!("{}:{}", method, url));
        }

        let mut sorted: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect();
        sorted.sort();

        let encoded = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        CacheKey(format!("{}:{}#{}", method, url, short_digest(&encoded)))
    }

    /// Key for an arbitrary operation namespace and its serialized arguments
    pub fn from_parts(namespace: &str, payload: &str) -> Self {
        CacheKey(format!("{}:{}", namespace, short_digest(payload)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn short_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(DIGEST_LEN);
    hex
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_order_does_not_matter() {
        let a = CacheKey::from_request("get", "/tournaments", &[("page", "2"), ("city", "Oslo")]);
        let b = CacheKey::from_request("GET", "/tournaments", &[("city", "Oslo"), ("page", "2")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_params_differ() {
        let a = CacheKey::from_request("GET", "/tournaments", &[("page", "1")]);
        let b = CacheKey::from_request("GET", "/tournaments", &[("page", "2")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_reserved_characters_in_values_stay_distinct() {
        let joined = CacheKey::from_request("GET", "/search", &[("city", "Oslo&q=x")]);
        let split = CacheKey::from_request("GET", "/search", &[("city", "Oslo"), ("q", "x")]);
        assert_ne!(joined, split);

        let eq_in_name = CacheKey::from_request("GET", "/search", &[("a=b", "c")]);
        let eq_in_value = CacheKey::from_request("GET", "/search", &[("a", "b=c")]);
        assert_ne!(eq_in_name, eq_in_value);
    }

    #[test]
    fn test_key_keeps_url_for_substring_invalidation() {
        let key = CacheKey::from_request("GET", "/tournaments/5", &[("expand", "teams")]);
        assert!(key.as_str().starts_with("GET:/tournaments/5#"));
        assert_eq!(key.as_str().len(), "GET:/tournaments/5#".len() + DIGEST_LEN);

        let bare = CacheKey::from_request::<&str, &str>("GET", "/venues", &[]);
        assert_eq!(bare.as_str(), "GET:/venues");
    }
}
