//! Resolver configuration loaded from `~/.config/toonhop/config.toml`.
//!
//! Every field is optional in the file; anything left out keeps its
//! default. A missing file means "all defaults".

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fingerprint::DEFAULT_USER_AGENT;
use crate::resolve::rank::DEFAULT_QUALITY_PRIORITY;

/// Extraction patterns for one host, keyed by host name and/or domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostStrategyConfig {
    /// Host name as it appears in the episode page (e.g. `"GDFlix"`).
    pub name: String,
    /// Landing-page domain the strategy also applies to.
    #[serde(default)]
    pub domain: Option<String>,
    /// Regexes tried in order; capture group 1 is the stream URL.
    pub patterns: Vec<String>,
}

/// Clearance cookie to install when `origin` serves a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClearanceConfig {
    /// Scheme and host, e.g. `https://archive.example`.
    pub origin: String,
    /// Cookie in `name=value` form.
    pub cookie: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Catalog site; used as referer for episode pages.
    pub base_url: String,
    /// Archive origin that relative candidate links hang off.
    pub archive_url: String,
    /// Global ceiling on in-flight candidate resolutions.
    pub max_concurrency: usize,
    /// Wall-clock budget per candidate, in seconds.
    pub candidate_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Present a randomized browser profile instead of `user_agent`.
    pub rotate_user_agent: bool,
    /// Return the bridge target when the host page cannot be fetched.
    pub fast_stream_fallback: bool,
    /// Resolution markers, best first.
    pub quality_priority: Vec<String>,
    pub hosts: Vec<HostStrategyConfig>,
    pub clearance: Vec<ClearanceConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://toonworld4all.me".to_string(),
            archive_url: "https://archive.toonworld4all.me".to_string(),
            max_concurrency: 3,
            candidate_timeout_secs: 25,
            request_timeout_secs: 20,
            connect_timeout_secs: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rotate_user_agent: false,
            fast_stream_fallback: false,
            quality_priority: DEFAULT_QUALITY_PRIORITY
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            hosts: Vec::new(),
            clearance: Vec::new(),
        }
    }
}

impl ResolverConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(config_path, Path::to_path_buf);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        Self::from_toml(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Concurrency ceiling, never below one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// At least one second; zero would time out every candidate.
    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Archive origin without a trailing slash.
    pub fn archive_origin(&self) -> &str {
        self.archive_url.trim_end_matches('/')
    }

    /// Catalog origin without a trailing slash.
    pub fn base_origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toonhop")
        .join("config.toml")
}
