//! In-memory [`Transport`] for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;

use crate::transport::{FetchResponse, RequestHeaders, Transport, TransportError};

#[derive(Debug, Clone)]
enum Behavior {
    Respond,
    Fail,
    Hang,
}

/// Canned reply for one request.
#[derive(Debug, Clone)]
pub(crate) struct MockReply {
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
    final_url: Option<String>,
    delay: Option<Duration>,
    behavior: Behavior,
}

impl MockReply {
    pub(crate) fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: Vec::new(),
            final_url: None,
            delay: None,
            behavior: Behavior::Respond,
        }
    }

    /// Connection-level failure.
    pub(crate) fn failure() -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::ok("")
        }
    }

    /// Never completes.
    pub(crate) fn hang() -> Self {
        Self {
            behavior: Behavior::Hang,
            ..Self::ok("")
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Pretend redirects ended at `final_url`.
    pub(crate) fn redirected_to(mut self, final_url: &str) -> Self {
        self.final_url = Some(final_url.to_string());
        self
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn into_response(self, url: &str) -> FetchResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        FetchResponse {
            status: StatusCode::from_u16(self.status).unwrap(),
            final_url: self.final_url.unwrap_or_else(|| url.to_string()),
            headers,
            body: self.body,
        }
    }
}

#[derive(Default)]
struct Routes {
    replies: HashMap<String, Vec<MockReply>>,
    hits: HashMap<String, usize>,
    requests: Vec<(String, RequestHeaders)>,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Routes URLs to canned replies and records what was asked.
///
/// Clones share state, so a test can keep a handle after giving one away.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    routes: Arc<Mutex<Routes>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, url: &str, reply: MockReply) {
        self.route_sequence(url, vec![reply]);
    }

    /// Successive requests get successive replies; the last one repeats.
    pub(crate) fn route_sequence(&self, url: &str, replies: Vec<MockReply>) {
        self.routes
            .lock()
            .unwrap()
            .replies
            .insert(url.to_string(), replies);
    }

    pub(crate) fn hits(&self, url: &str) -> usize {
        self.routes.lock().unwrap().hits.get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_hits(&self) -> usize {
        self.routes.lock().unwrap().requests.len()
    }

    /// Headers sent to `url`, in request order.
    pub(crate) fn requests_to(&self, url: &str) -> Vec<RequestHeaders> {
        self.routes
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
            .collect()
    }

    /// Highest number of requests that were pending at once.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str, headers: &RequestHeaders) -> Result<FetchResponse, TransportError> {
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            routes.requests.push((url.to_string(), headers.clone()));
            let seen = routes.hits.entry(url.to_string()).or_insert(0);
            let n = *seen;
            *seen += 1;
            routes
                .replies
                .get(url)
                .and_then(|replies| replies.get(n.min(replies.len().saturating_sub(1))).cloned())
        };

        let Some(reply) = reply else {
            return Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: "no mock route".into(),
            });
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(Arc::clone(&self.in_flight));

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }

        match reply.behavior {
            Behavior::Respond => Ok(reply.into_response(url)),
            Behavior::Fail => Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: "connection refused".into(),
            }),
            Behavior::Hang => std::future::pending().await,
        }
    }
}
