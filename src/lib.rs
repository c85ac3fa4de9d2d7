//! `toonhop` - episode page to playable stream resolver
//!
//! # Features
//!
//! - **Embedded state**: decodes the `window.__PROPS__` payload of episode pages
//! - **Hop resolution**: follows bridge pages and host landing pages to a stream
//! - **Bounded fan-out**: one shared concurrency limit, per-candidate timeouts
//! - **Deterministic ranking**: resolution tier first, direct before fallback
//! - **Browser profiles**: realistic headers, shared cookie session, challenge clearance
//!
//! # Example
//!
//! ```rust,no_run
//! use toonhop::{ResolverConfig, VideoResolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResolverConfig::load(None)?;
//!     let resolver = VideoResolver::from_config(&config)?;
//!     for outcome in resolver.resolve_videos("/episode/some-show-1x01").await {
//!         println!("{} {}", outcome.quality_label, outcome.stream_url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod challenge;
pub mod config;
pub mod fingerprint;
pub mod http_client;
pub mod resolve;
pub mod transport;

pub use catalog::{AnimeDetails, AnimeEntry, AnimePage, Catalog, CatalogError, EpisodeRef};
pub use challenge::{ChallengeInterceptor, ChallengeSolver, ClearanceCookieSolver};
pub use config::ResolverConfig;
pub use fingerprint::{chrome_profile, firefox_profile, random_profile, safari_profile, BrowserProfile};
pub use http_client::{HttpClient, Session};
pub use resolve::{FallbackKind, ResolutionOutcome, VideoResolver};
pub use transport::{FetchResponse, RequestHeaders, Transport, TransportError};

/// Version of toonhop
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
