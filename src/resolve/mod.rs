//! Episode page to ranked playable streams.
//!
//! # Pipeline
//!
//! ```text
//! episode page ─▶ state ─▶ candidates ─▶ dispatch(hop × N) ─▶ rank ─▶ outcomes
//! ```
//!
//! - [`state`]: cut and decode the embedded `window.__PROPS__` payload
//! - [`candidates`]: flatten encode groups into ordered candidates
//! - [`hop`]: per-candidate redirect walk with ordered fallbacks
//! - [`dispatch`]: bounded fan-out with a per-candidate timeout
//! - [`rank`]: stable sort by resolution tier, direct before fallback
//!
//! [`VideoResolver::resolve_videos`] never fails; every problem below it
//! turns into fewer outcomes, at worst none.

pub mod candidates;
pub mod dispatch;
pub mod hop;
pub mod hosts;
pub mod outcome;
pub mod patterns;
pub mod rank;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::challenge::{ChallengeInterceptor, ClearanceCookieSolver};
use crate::config::ResolverConfig;
use crate::fingerprint::{random_profile, BrowserProfile};
use crate::http_client::{ClientTimeouts, HttpClient, Session};
use crate::transport::{RequestHeaders, Transport};

pub use candidates::Candidate;
pub use dispatch::Dispatcher;
pub use hop::{HopError, HopResolver};
pub use hosts::{HostRegistry, HostStrategy};
pub use outcome::{FallbackKind, ResolutionOutcome};
pub use rank::Ranker;
pub use state::{PageState, StateError};

/// Resolves episode pages through one shared transport and concurrency limit.
pub struct VideoResolver {
    transport: Arc<dyn Transport>,
    hop: Arc<HopResolver>,
    dispatcher: Dispatcher,
    ranker: Ranker,
    base_origin: String,
    archive_origin: String,
    user_agent: String,
}

impl VideoResolver {
    /// Build over an existing transport.
    ///
    /// # Errors
    ///
    /// Fails when a configured host pattern is not a valid regex.
    pub fn new(transport: Arc<dyn Transport>, config: &ResolverConfig) -> Result<Self, regex::Error> {
        Self::with_user_agent(transport, config, &config.user_agent)
    }

    /// Build the full network stack: browser profile, session, reqwest
    /// client and challenge interceptor.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built or a host pattern is invalid.
    pub fn from_config(config: &ResolverConfig) -> anyhow::Result<Self> {
        let profile = if config.rotate_user_agent {
            random_profile()
        } else {
            BrowserProfile::fixed(&config.user_agent)
        };
        let user_agent = profile.user_agent.clone();

        let session = Session::new();
        let client = HttpClient::with_session(
            profile,
            session.clone(),
            ClientTimeouts {
                connect: config.connect_timeout(),
                request: config.request_timeout(),
            },
        )?;
        let solver = ClearanceCookieSolver::new(session, config.clearance.clone());
        let transport = ChallengeInterceptor::new(client, solver);

        Ok(Self::with_user_agent(Arc::new(transport), config, &user_agent)?)
    }

    fn with_user_agent(
        transport: Arc<dyn Transport>,
        config: &ResolverConfig,
        user_agent: &str,
    ) -> Result<Self, regex::Error> {
        let hosts = Arc::new(HostRegistry::from_config(&config.hosts)?);
        let hop = HopResolver::new(
            Arc::clone(&transport),
            hosts,
            config.archive_origin(),
            user_agent,
        )
        .with_fast_stream_fallback(config.fast_stream_fallback);

        Ok(Self {
            transport,
            hop: Arc::new(hop),
            dispatcher: Dispatcher::new(config.concurrency(), config.candidate_timeout()),
            ranker: Ranker::new(config.quality_priority.as_slice()),
            base_origin: config.base_origin().to_string(),
            archive_origin: config.archive_origin().to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Absolute URL for an episode reference; paths hang off the archive.
    pub fn episode_url(&self, episode: &str) -> Option<String> {
        if let Ok(url) = Url::parse(episode) {
            return Some(url.into());
        }
        Url::parse(&format!("{}/", self.archive_origin))
            .and_then(|base| base.join(episode))
            .map(String::from)
            .ok()
    }

    /// Resolve every stream on an episode page, best first.
    ///
    /// Returns an empty list when the page cannot be fetched, carries no
    /// state, or no candidate resolves.
    #[instrument(skip(self))]
    pub async fn resolve_videos(&self, episode: &str) -> Vec<ResolutionOutcome> {
        let Some(page_url) = self.episode_url(episode) else {
            warn!("Episode reference is not a usable URL");
            return Vec::new();
        };

        let headers = RequestHeaders::new()
            .with("User-Agent", self.user_agent.as_str())
            .with("Referer", format!("{}/", self.base_origin));

        let body = match self.transport.fetch(&page_url, &headers).await {
            Ok(response) if response.is_success() => response.body,
            Ok(response) => {
                warn!(url = %page_url, status = %response.status, "Episode page unavailable");
                return Vec::new();
            }
            Err(e) => {
                warn!(url = %page_url, error = %e, "Episode page fetch failed");
                return Vec::new();
            }
        };

        let state = match state::extract_page_state(&body) {
            Ok(state) => state,
            Err(StateError::Absent) => {
                debug!(url = %page_url, "Episode page has no embedded state");
                return Vec::new();
            }
            Err(e) => {
                warn!(url = %page_url, error = %e, "Episode page state is invalid");
                return Vec::new();
            }
        };

        let candidates = candidates::enumerate(state, &self.archive_origin);
        let total = candidates.len();
        if total == 0 {
            info!(url = %page_url, "No candidates on episode page");
            return Vec::new();
        }
        debug!(total, limit = self.dispatcher.limit(), "Dispatching candidates");

        let hop = Arc::clone(&self.hop);
        let outcomes = self
            .dispatcher
            .run(candidates, move |candidate: Candidate| {
                let hop = Arc::clone(&hop);
                async move { hop.resolve(&candidate).await }
            })
            .await;

        let ranked = self.ranker.rank(outcomes);
        info!(
            candidates = total,
            outcomes = ranked.len(),
            fallbacks = ranked.iter().filter(|o| o.is_fallback).count(),
            "Resolution finished"
        );
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::resolve::test_support::{MockReply, MockTransport};

    const EPISODE: &str = "https://archive.example/episode/1";

    fn config() -> ResolverConfig {
        ResolverConfig {
            base_url: "https://catalog.example/".into(),
            archive_url: "https://archive.example".into(),
            user_agent: "test-agent".into(),
            ..ResolverConfig::default()
        }
    }

    fn page(props: &str) -> String {
        format!(
            "<html><head><script>window.__PROPS__ = {props};</script></head><body></body></html>"
        )
    }

    fn bridge(dest: &str) -> String {
        format!(r#"<script>var cfg = {{"destination":"{}"}};</script>"#, dest.replace('/', "\\/"))
    }

    /// 720p via bridge, 1080p direct, 1080p via bridge to an opaque host page.
    fn mixed_site() -> MockTransport {
        let transport = MockTransport::new();
        transport.route(
            EPISODE,
            MockReply::ok(page(
                r#"{"data":{"data":{"encodes":[
                    {"resolution":"720p","is_hq":false,"files":[{"host":"A","link":"/redirect/a"}]},
                    {"resolution":"1080p","is_hq":true,"files":[
                        {"host":"B","link":"https://direct.example/b"},
                        {"host":"C","link":"/redirect/c"}
                    ]}
                ]}}}"#,
            )),
        );
        transport.route(
            "https://archive.example/redirect/a",
            MockReply::ok(bridge("https://host-a.example/file/a")),
        );
        transport.route(
            "https://host-a.example/file/a",
            MockReply::ok(r#"<a href="https://dl.example/a?token=1">Download</a>"#),
        );
        transport.route(
            "https://direct.example/b",
            MockReply::ok("").redirected_to("https://cdn.example/b.mp4"),
        );
        transport.route(
            "https://archive.example/redirect/c",
            MockReply::ok(bridge("https://host-c.example/file/c")),
        );
        transport.route(
            "https://host-c.example/file/c",
            MockReply::ok("<html>Click here</html>"),
        );
        transport
    }

    fn resolver(transport: &MockTransport, config: &ResolverConfig) -> VideoResolver {
        VideoResolver::new(Arc::new(transport.clone()), config).unwrap()
    }

    fn summary(outcomes: &[ResolutionOutcome]) -> Vec<(&str, &str, bool)> {
        outcomes
            .iter()
            .map(|o| (o.quality_label.as_str(), o.stream_url.as_str(), o.is_fallback))
            .collect()
    }

    #[tokio::test]
    async fn resolves_and_ranks_mixed_page() {
        let transport = mixed_site();
        let outcomes = resolver(&transport, &config()).resolve_videos(EPISODE).await;

        assert_eq!(
            summary(&outcomes),
            vec![
                ("1080p - B", "https://cdn.example/b.mp4", false),
                ("1080p - C (Portal)", "https://host-c.example/file/c", true),
                ("720p - A", "https://dl.example/a?token=1", false),
            ]
        );
        let mut sources: Vec<_> = outcomes.iter().map(|o| o.source).collect();
        sources.sort_unstable();
        assert_eq!(sources, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn episode_fetch_uses_catalog_referer() {
        let transport = mixed_site();
        resolver(&transport, &config()).resolve_videos(EPISODE).await;

        let sent = transport.requests_to(EPISODE);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].get("Referer"), Some("https://catalog.example/"));
        assert_eq!(sent[0].get("User-Agent"), Some("test-agent"));
    }

    #[tokio::test]
    async fn each_candidate_link_is_fetched_once() {
        let transport = mixed_site();
        resolver(&transport, &config()).resolve_videos(EPISODE).await;

        for link in [
            "https://archive.example/redirect/a",
            "https://direct.example/b",
            "https://archive.example/redirect/c",
        ] {
            assert_eq!(transport.hits(link), 1, "{link}");
        }
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let transport = mixed_site();
        let resolver = resolver(&transport, &config());

        let first = resolver.resolve_videos(EPISODE).await;
        let second = resolver.resolve_videos(EPISODE).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn relative_episode_reference_joins_archive() {
        let transport = mixed_site();
        let outcomes = resolver(&transport, &config())
            .resolve_videos("/episode/1")
            .await;
        assert_eq!(outcomes.len(), 3);
    }

    #[tokio::test]
    async fn failing_candidates_are_dropped() {
        let transport = MockTransport::new();
        transport.route(
            EPISODE,
            MockReply::ok(page(
                r#"{"data":{"data":{"encodes":[{"resolution":"1080p","files":[
                    {"host":"Gone","link":"https://gone.example/x"},
                    {"host":"Err","link":"https://err.example/x"},
                    {"host":"Ok","link":"https://ok.example/x"}
                ]}]}}}"#,
            )),
        );
        transport.route("https://err.example/x", MockReply::status(500, ""));
        transport.route("https://ok.example/x", MockReply::ok(""));

        let outcomes = resolver(&transport, &config()).resolve_videos(EPISODE).await;
        assert_eq!(summary(&outcomes), vec![("1080p - Ok", "https://ok.example/x", false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_cap_is_respected() {
        let transport = MockTransport::new();
        let files: Vec<String> = (0..8)
            .map(|i| format!(r#"{{"host":"H{i}","link":"https://m{i}.example/v"}}"#))
            .collect();
        transport.route(
            EPISODE,
            MockReply::ok(page(&format!(
                r#"{{"data":{{"data":{{"encodes":[{{"resolution":"720p","files":[{}]}}]}}}}}}"#,
                files.join(",")
            ))),
        );
        for i in 0..8 {
            transport.route(
                &format!("https://m{i}.example/v"),
                MockReply::ok("").delayed(Duration::from_millis(200)),
            );
        }

        let config = ResolverConfig {
            max_concurrency: 3,
            ..config()
        };
        let outcomes = resolver(&transport, &config).resolve_videos(EPISODE).await;

        assert_eq!(outcomes.len(), 8);
        assert_eq!(transport.max_in_flight(), 3);
        let sources: Vec<_> = outcomes.iter().map(|o| o.source).collect();
        assert_eq!(sources, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_candidate_yields_nothing() {
        let transport = MockTransport::new();
        transport.route(
            EPISODE,
            MockReply::ok(page(
                r#"{"data":{"data":{"encodes":[{"resolution":"1080p","files":[
                    {"host":"Hang","link":"https://hang.example/x"},
                    {"host":"Fast","link":"https://fast.example/x"}
                ]}]}}}"#,
            )),
        );
        transport.route("https://hang.example/x", MockReply::hang());
        transport.route(
            "https://fast.example/x",
            MockReply::ok("").delayed(Duration::from_millis(50)),
        );

        let config = ResolverConfig {
            candidate_timeout_secs: 5,
            ..config()
        };
        let start = tokio::time::Instant::now();
        let outcomes = resolver(&transport, &config).resolve_videos(EPISODE).await;

        assert_eq!(summary(&outcomes), vec![("1080p - Fast", "https://fast.example/x", false)]);
        assert!(start.elapsed() <= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn missing_state_yields_nothing() {
        let transport = MockTransport::new();
        transport.route(EPISODE, MockReply::ok("<html><p>No props</p></html>"));
        assert!(resolver(&transport, &config()).resolve_videos(EPISODE).await.is_empty());
    }

    #[tokio::test]
    async fn invalid_state_yields_nothing() {
        let transport = MockTransport::new();
        transport.route(
            EPISODE,
            MockReply::ok(page(r#"{"data":{"unexpected":true}}"#)),
        );
        assert!(resolver(&transport, &config()).resolve_videos(EPISODE).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_episode_yields_nothing() {
        let transport = MockTransport::new();
        transport.route(EPISODE, MockReply::failure());
        assert!(resolver(&transport, &config()).resolve_videos(EPISODE).await.is_empty());

        let missing = MockTransport::new();
        missing.route(EPISODE, MockReply::status(404, "not found"));
        assert!(resolver(&missing, &config()).resolve_videos(EPISODE).await.is_empty());
    }

    #[test]
    fn invalid_host_pattern_is_a_build_error() {
        let config = ResolverConfig {
            hosts: vec![crate::config::HostStrategyConfig {
                name: "Bad".into(),
                domain: None,
                patterns: vec!["(".into()],
            }],
            ..config()
        };
        assert!(VideoResolver::new(Arc::new(MockTransport::new()), &config).is_err());
    }
}
