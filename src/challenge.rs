//! Anti-bot challenge handling.
//!
//! A [`ChallengeInterceptor`] wraps any [`Transport`]. When a response looks
//! like an anti-bot challenge it asks a [`ChallengeSolver`] for clearance and,
//! if that succeeds, replays the request exactly once. Otherwise the blocked
//! response is returned as-is and the caller sees an ordinary non-success
//! status.

use async_trait::async_trait;
use reqwest::header::SERVER;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClearanceConfig;
use crate::http_client::Session;
use crate::transport::{FetchResponse, RequestHeaders, Transport, TransportError};

/// Obtains clearance for an origin.
///
/// On `Ok(())` subsequent fetches to the challenged origin are expected to
/// pass; the interceptor does not verify that.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self, url: &str) -> Result<(), TransportError>;
}

/// `true` for a 403/503 served by the challenge front end.
pub fn is_challenge(response: &FetchResponse) -> bool {
    matches!(
        response.status,
        StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE
    ) && response
        .headers
        .get(SERVER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|server| server.trim().eq_ignore_ascii_case("cloudflare"))
}

/// Transport decorator that clears challenges and retries once.
pub struct ChallengeInterceptor<T, S> {
    inner: T,
    solver: S,
}

impl<T: Transport, S: ChallengeSolver> ChallengeInterceptor<T, S> {
    pub fn new(inner: T, solver: S) -> Self {
        Self { inner, solver }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport, S: ChallengeSolver> Transport for ChallengeInterceptor<T, S> {
    async fn fetch(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<FetchResponse, TransportError> {
        let response = self.inner.fetch(url, headers).await?;
        if !is_challenge(&response) {
            return Ok(response);
        }

        debug!(url, status = %response.status, "Challenge detected");
        match self.solver.solve(url).await {
            Ok(()) => self.inner.fetch(url, headers).await,
            Err(e) => {
                warn!(url, error = %e, "Challenge not cleared, returning blocked response");
                Ok(response)
            }
        }
    }
}

/// Solver that installs pre-obtained clearance cookies into the session.
///
/// Cookies are typically copied out of a browser that already passed the
/// challenge for that origin.
pub struct ClearanceCookieSolver {
    session: Session,
    entries: Vec<ClearanceConfig>,
}

impl ClearanceCookieSolver {
    pub fn new(session: Session, entries: Vec<ClearanceConfig>) -> Self {
        Self { session, entries }
    }
}

#[async_trait]
impl ChallengeSolver for ClearanceCookieSolver {
    async fn solve(&self, url: &str) -> Result<(), TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let origin = parsed.origin().ascii_serialization();
        // Cookies without a Path default to the URL's directory; root covers the origin.
        let root = parsed.join("/").map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut installed = 0;
        for entry in self
            .entries
            .iter()
            .filter(|e| e.origin.trim_end_matches('/').eq_ignore_ascii_case(&origin))
        {
            self.session.add_cookie(&entry.cookie, &root);
            installed += 1;
        }

        if installed == 0 {
            return Err(TransportError::Challenge(origin));
        }
        debug!(origin, installed, "Installed clearance cookies");
        Ok(())
    }
}
