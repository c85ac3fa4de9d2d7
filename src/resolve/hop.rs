//! Hop resolution for a single candidate.
//!
//! ```text
//! candidate link ──GET──▶ final URL not a bridge? ──▶ stream (0 hops)
//!                              │ bridge
//!                              ▼
//!                  BRIDGE_CHAIN(body) ──miss──▶ no outcome
//!                              │ target
//!                              ▼
//!                 host page ──GET──▶ HostRegistry(body) ──miss──▶ portal fallback
//!                                          │ hit
//!                                          ▼
//!                                       stream
//! ```
//!
//! Every hop fails closed (no outcome) on transport errors and non-success
//! statuses. The only degradation is the host-page pattern miss, which
//! yields a portal fallback pointing at the host page.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use super::candidates::Candidate;
use super::hosts::HostRegistry;
use super::outcome::{FallbackKind, ResolutionOutcome};
use super::patterns::{first_match, BRIDGE_CHAIN};
use crate::transport::{FetchResponse, RequestHeaders, Transport, TransportError};

/// Path fragment that marks a bridge page.
pub const BRIDGE_PATH: &str = "/redirect/";

/// Reasons a candidate yields no outcome.
#[derive(Error, Debug)]
pub enum HopError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },

    #[error("no redirect target on bridge page {0}")]
    NoBridgeTarget(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("concurrency limiter closed")]
    LimiterClosed,
}

enum FirstHop {
    /// Redirects already landed somewhere that is not a bridge.
    Resolved(String),
    Bridge { url: String, body: String },
}

/// Walks one candidate's redirect chain.
pub struct HopResolver {
    transport: Arc<dyn Transport>,
    hosts: Arc<HostRegistry>,
    archive_origin: String,
    user_agent: String,
    fast_stream_fallback: bool,
}

impl HopResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        hosts: Arc<HostRegistry>,
        archive_origin: &str,
        user_agent: &str,
    ) -> Self {
        Self {
            transport,
            hosts,
            archive_origin: archive_origin.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            fast_stream_fallback: false,
        }
    }

    /// Return the bridge target instead of nothing when the host page fetch fails.
    #[must_use]
    pub fn with_fast_stream_fallback(mut self, enabled: bool) -> Self {
        self.fast_stream_fallback = enabled;
        self
    }

    /// Resolve `candidate` to at most one outcome.
    #[instrument(skip(self, candidate), fields(index = candidate.index, host = %candidate.host_name))]
    pub async fn resolve(&self, candidate: &Candidate) -> Result<ResolutionOutcome, HopError> {
        let bridge_headers = self.headers(&format!("{}/", self.archive_origin));

        let host_url = match self.first_hop(&candidate.link, &bridge_headers).await? {
            FirstHop::Resolved(url) => {
                debug!(%url, "Resolved without a bridge");
                return Ok(ResolutionOutcome::stream(
                    candidate.index,
                    &candidate.resolution,
                    &candidate.host_name,
                    url,
                    bridge_headers,
                ));
            }
            FirstHop::Bridge { url, body } => bridge_target(&url, &body)?,
        };

        self.deep_extract(candidate, &host_url).await
    }

    async fn first_hop(&self, link: &str, headers: &RequestHeaders) -> Result<FirstHop, HopError> {
        let response = self.fetch_ok(link, headers).await?;
        if is_bridge_url(&response.final_url) {
            Ok(FirstHop::Bridge {
                url: response.final_url,
                body: response.body,
            })
        } else {
            Ok(FirstHop::Resolved(response.final_url))
        }
    }

    async fn deep_extract(
        &self,
        candidate: &Candidate,
        host_url: &str,
    ) -> Result<ResolutionOutcome, HopError> {
        let host_headers = self.headers(&referer_for(host_url));

        let response = match self.fetch_ok(host_url, &host_headers).await {
            Ok(response) => response,
            Err(e) if self.fast_stream_fallback => {
                debug!(error = %e, host_url, "Host page unavailable, using bridge target");
                return Ok(ResolutionOutcome::fallback(
                    FallbackKind::Fast,
                    candidate.index,
                    &candidate.resolution,
                    &candidate.host_name,
                    host_url.to_string(),
                    host_headers,
                ));
            }
            Err(e) => return Err(e),
        };

        match self
            .hosts
            .extract(&candidate.host_name, &response.final_url, &response.body)
        {
            Some(hit) => {
                debug!(strategy = %hit.strategy, url = %hit.url, "Stream extracted");
                Ok(ResolutionOutcome::stream(
                    candidate.index,
                    &candidate.resolution,
                    &candidate.host_name,
                    hit.url,
                    host_headers,
                ))
            }
            None => {
                debug!(host_url, "No stream pattern matched, returning portal");
                Ok(ResolutionOutcome::fallback(
                    FallbackKind::Portal,
                    candidate.index,
                    &candidate.resolution,
                    &candidate.host_name,
                    host_url.to_string(),
                    host_headers,
                ))
            }
        }
    }

    async fn fetch_ok(&self, url: &str, headers: &RequestHeaders) -> Result<FetchResponse, HopError> {
        let response = self.transport.fetch(url, headers).await?;
        if !response.is_success() {
            return Err(HopError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    fn headers(&self, referer: &str) -> RequestHeaders {
        RequestHeaders::new()
            .with("User-Agent", self.user_agent.as_str())
            .with("Referer", referer)
    }
}

pub fn is_bridge_url(url: &str) -> bool {
    url.contains(BRIDGE_PATH)
}

/// Next-hop target embedded in a bridge page, made absolute against `bridge_url`.
pub fn bridge_target(bridge_url: &str, body: &str) -> Result<String, HopError> {
    let (pattern, target) = first_match(BRIDGE_CHAIN, body)
        .ok_or_else(|| HopError::NoBridgeTarget(bridge_url.to_string()))?;
    debug!(pattern, %target, "Bridge target found");

    if Url::parse(&target).is_ok() {
        return Ok(target);
    }
    Url::parse(bridge_url)
        .and_then(|base| base.join(&target))
        .map(String::from)
        .map_err(|_| HopError::NoBridgeTarget(bridge_url.to_string()))
}

/// Everything up to and including the last `/` of the path.
///
/// `https://host.example/file/abc` gives `https://host.example/file/`; a bare
/// origin gets a trailing slash.
pub fn referer_for(url: &str) -> String {
    let without_query = &url[..url.find(['?', '#']).unwrap_or(url.len())];
    let authority_start = without_query.find("://").map_or(0, |i| i + 3);
    match without_query[authority_start..].rfind('/') {
        Some(i) => without_query[..=authority_start + i].to_string(),
        None => format!("{without_query}/"),
    }
}
