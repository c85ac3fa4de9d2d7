//! Host-specific deep extraction.
//!
//! # Architecture
//!
//! - [`HostStrategy`]: `attempt(body) -> Option<url>` for one kind of host page
//! - [`GenericStrategy`]: the ordered [`HOST_CHAIN`](super::patterns::HOST_CHAIN)
//! - [`PatternStrategy`]: regexes supplied through configuration
//! - [`HostRegistry`]: picks a strategy by host name or landing-page domain
//!
//! A registered strategy that misses falls through to the generic one, so
//! registering a host can only add matches, never lose them.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use url::Url;

use super::patterns::{first_match, HOST_CHAIN};
use crate::config::HostStrategyConfig;

/// Extraction strategy for a host landing page.
pub trait HostStrategy: Send + Sync {
    /// Strategy name, used in logs.
    fn name(&self) -> &str;

    /// Stream URL found in `body`, if any.
    fn attempt(&self, body: &str) -> Option<String>;
}

/// Ordered generic patterns shared by every host.
pub struct GenericStrategy;

impl HostStrategy for GenericStrategy {
    fn name(&self) -> &str {
        "generic"
    }

    fn attempt(&self, body: &str) -> Option<String> {
        first_match(HOST_CHAIN, body).map(|(pattern, url)| {
            tracing::debug!(pattern, "Generic host pattern matched");
            url
        })
    }
}

/// Regexes tried in order; capture group 1 (or the whole match) is the URL.
pub struct PatternStrategy {
    name: String,
    patterns: Vec<Regex>,
}

impl PatternStrategy {
    pub fn new(name: &str, patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            patterns,
        })
    }
}

impl HostStrategy for PatternStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self, body: &str) -> Option<String> {
        self.patterns.iter().find_map(|regex| {
            let caps = regex.captures(body)?;
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().replace("\\/", "/"))
                .filter(|url| !url.is_empty())
        })
    }
}

/// A hit from [`HostRegistry::extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub strategy: String,
    pub url: String,
}

/// Strategy lookup by host identifier.
pub struct HostRegistry {
    by_name: HashMap<String, Arc<dyn HostStrategy>>,
    by_domain: Vec<(String, Arc<dyn HostStrategy>)>,
    generic: GenericStrategy,
}

impl HostRegistry {
    /// Registry with only the generic strategy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_domain: Vec::new(),
            generic: GenericStrategy,
        }
    }

    /// Build from `[[hosts]]` configuration tables.
    pub fn from_config(hosts: &[HostStrategyConfig]) -> Result<Self, regex::Error> {
        let mut registry = Self::new();
        for host in hosts {
            let strategy: Arc<dyn HostStrategy> =
                Arc::new(PatternStrategy::new(&host.name, &host.patterns)?);
            registry.register_name(&host.name, Arc::clone(&strategy));
            if let Some(domain) = &host.domain {
                registry.register_domain(domain, strategy);
            }
        }
        Ok(registry)
    }

    /// Register under a host name as it appears in page state.
    pub fn register_name(&mut self, name: &str, strategy: Arc<dyn HostStrategy>) {
        self.by_name.insert(name.trim().to_lowercase(), strategy);
    }

    /// Register for a landing-page domain and its subdomains.
    pub fn register_domain(&mut self, domain: &str, strategy: Arc<dyn HostStrategy>) {
        let domain = domain
            .trim()
            .trim_start_matches("www.")
            .trim_end_matches('.')
            .to_lowercase();
        self.by_domain.push((domain, strategy));
    }

    pub fn len(&self) -> usize {
        self.by_name.len() + self.by_domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Specialized strategy for this host, if one is registered.
    ///
    /// Host name wins over domain.
    pub fn lookup(&self, host_name: &str, page_url: &str) -> Option<&dyn HostStrategy> {
        if let Some(strategy) = self.by_name.get(&host_name.trim().to_lowercase()) {
            return Some(strategy.as_ref());
        }

        let host = Url::parse(page_url)
            .ok()?
            .host_str()?
            .trim_start_matches("www.")
            .to_lowercase();
        self.by_domain
            .iter()
            .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
            .map(|(_, strategy)| strategy.as_ref())
    }

    /// Run the specialized strategy (if any), then the generic one.
    pub fn extract(&self, host_name: &str, page_url: &str, body: &str) -> Option<Extracted> {
        if let Some(strategy) = self.lookup(host_name, page_url) {
            if let Some(url) = strategy.attempt(body) {
                return Some(Extracted {
                    strategy: strategy.name().to_string(),
                    url,
                });
            }
            tracing::debug!(
                strategy = strategy.name(),
                host_name,
                "Host strategy missed, trying generic patterns"
            );
        }

        self.generic.attempt(body).map(|url| Extracted {
            strategy: self.generic.name().to_string(),
            url,
        })
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}
