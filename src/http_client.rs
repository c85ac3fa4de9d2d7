//! HTTP Client
//!
//! reqwest-backed [`Transport`]:
//! - Shared cookie jar owned by an explicit [`Session`]
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - Connection pooling with keep-alive
//! - Browser fingerprint headers on every request
//! - Redirects followed (up to 10), final URL reported back

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::fingerprint::BrowserProfile;
use crate::transport::{FetchResponse, RequestHeaders, Transport, TransportError};

/// Cookie state shared by every request of one resolver.
///
/// Cloning a session shares the jar, so the challenge solver and the client
/// see the same cookies.
#[derive(Clone, Default)]
pub struct Session {
    jar: Arc<Jar>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a `name=value` cookie (optionally with attributes) for `url`.
    pub fn add_cookie(&self, cookie: &str, url: &Url) {
        debug!(origin = %url.origin().ascii_serialization(), "Adding session cookie");
        self.jar.add_cookie_str(cookie, url);
    }

    /// `Cookie` header value that would be sent to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        use reqwest::cookie::CookieStore;
        self.jar
            .cookies(url)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    pub(crate) fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }
}

/// Timeouts applied by the underlying client.
#[derive(Debug, Clone, Copy)]
pub struct ClientTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(20),
            request: Duration::from_secs(20),
        }
    }
}

/// HTTP client bound to one session
pub struct HttpClient {
    client: Client,
    session: Session,
    profile: BrowserProfile,
}

impl HttpClient {
    /// Create a client with a fresh session and the given profile.
    pub fn new(profile: BrowserProfile) -> Result<Self, TransportError> {
        Self::with_session(profile, Session::new(), ClientTimeouts::default())
    }

    /// Create a client that stores cookies in `session`.
    pub fn with_session(
        profile: BrowserProfile,
        session: Session,
        timeouts: ClientTimeouts,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            // Let the server negotiate HTTP/2; mirrors are often HTTP/1.1 only
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(15)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(profile.to_headers())
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_provider(session.jar())
            .build()?;

        Ok(Self {
            client,
            session,
            profile,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    /// Get the underlying reqwest client
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self, headers), fields(url = %url))]
    async fn fetch(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<FetchResponse, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let response_headers = response.headers().clone();

        debug!(
            status = %status,
            version = ?response.version(),
            final_url = %final_url,
            "Response received"
        );

        let body = response.text().await?;

        Ok(FetchResponse {
            status,
            final_url,
            headers: response_headers,
            body,
        })
    }
}
