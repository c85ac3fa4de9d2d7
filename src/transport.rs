//! Transport seam between the resolution pipeline and the network.
//!
//! Everything above this module talks to a [`Transport`]: the reqwest-backed
//! [`HttpClient`](crate::http_client::HttpClient), the
//! [`ChallengeInterceptor`](crate::challenge::ChallengeInterceptor) wrapping it,
//! or an in-memory double in tests. A transport follows redirects and applies
//! the shared session cookies; it never retries on its own.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// Transport-level failures.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("challenge not cleared for {0}")]
    Challenge(String),
}

/// A fully read response, after redirects.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    /// URL of the last request in the redirect chain.
    pub final_url: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Ordered request headers with case-insensitive replacement.
///
/// Kept as plain strings so an outcome can hand them to a downstream player
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders(Vec<(String, String)>);

impl RequestHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing any existing value regardless of case.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
        self
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for RequestHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl fmt::Display for RequestHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        Ok(())
    }
}

/// Something that can GET a URL.
///
/// Implementations must be safe to share across concurrently running
/// resolutions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<FetchResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_case_insensitively() {
        let mut headers = RequestHeaders::new();
        headers.set("Referer", "https://a.example/");
        headers.set("referer", "https://b.example/");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("REFERER"), Some("https://b.example/"));
    }

    #[test]
    fn insertion_order_is_kept() {
        let headers = RequestHeaders::new()
            .with("User-Agent", "ua")
            .with("Referer", "r");
        let names: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["User-Agent", "Referer"]);
    }

    #[test]
    fn serializes_as_object() {
        let headers = RequestHeaders::new().with("Referer", "https://x.example/");
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(json, r#"{"Referer":"https://x.example/"}"#);
    }

    #[test]
    fn display_joins_pairs() {
        let headers = RequestHeaders::new().with("A", "1").with("B", "2");
        assert_eq!(headers.to_string(), "A: 1; B: 2");
    }

    #[test]
    fn response_header_lookup() {
        let mut map = HeaderMap::new();
        map.insert("server", "cloudflare".parse().unwrap());
        let response = FetchResponse {
            status: StatusCode::FORBIDDEN,
            final_url: "https://x.example/".into(),
            headers: map,
            body: String::new(),
        };
        assert_eq!(response.header("Server"), Some("cloudflare"));
        assert!(!response.is_success());
    }
}
