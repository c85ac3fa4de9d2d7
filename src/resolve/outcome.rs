//! Resolved streams.

use serde::Serialize;

use crate::transport::RequestHeaders;

/// Why an outcome is not a direct stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackKind {
    /// Host landing page; a player may still cope with it.
    Portal,
    /// Bridge target returned because the host page could not be fetched.
    Fast,
}

impl FallbackKind {
    pub fn label_suffix(self) -> &'static str {
        match self {
            FallbackKind::Portal => " (Portal)",
            FallbackKind::Fast => " (Fast)",
        }
    }
}

/// One playable (or degraded) stream for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionOutcome {
    pub stream_url: String,
    /// `"<resolution> - <host>"`, plus a suffix for fallbacks.
    pub quality_label: String,
    /// Resolution text of the originating candidate, as published.
    pub resolution: String,
    /// Headers a player must send to fetch `stream_url`.
    pub request_headers: RequestHeaders,
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackKind>,
    /// Enumeration index of the candidate this came from.
    pub source: usize,
}

impl ResolutionOutcome {
    pub fn stream(
        source: usize,
        resolution: &str,
        host_name: &str,
        stream_url: String,
        request_headers: RequestHeaders,
    ) -> Self {
        Self {
            stream_url,
            quality_label: quality_label(resolution, host_name, None),
            resolution: resolution.to_string(),
            request_headers,
            is_fallback: false,
            fallback: None,
            source,
        }
    }

    pub fn fallback(
        kind: FallbackKind,
        source: usize,
        resolution: &str,
        host_name: &str,
        stream_url: String,
        request_headers: RequestHeaders,
    ) -> Self {
        Self {
            stream_url,
            quality_label: quality_label(resolution, host_name, Some(kind)),
            resolution: resolution.to_string(),
            request_headers,
            is_fallback: true,
            fallback: Some(kind),
            source,
        }
    }
}

pub fn quality_label(resolution: &str, host_name: &str, fallback: Option<FallbackKind>) -> String {
    let suffix = fallback.map_or("", FallbackKind::label_suffix);
    format!("{resolution} - {host_name}{suffix}")
}
