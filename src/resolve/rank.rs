//! Deterministic ordering of resolved streams.

use super::outcome::ResolutionOutcome;

/// Resolution markers, highest first.
pub const DEFAULT_QUALITY_PRIORITY: &[&str] = &["2160", "1440", "1080", "720", "480", "360", "240"];

#[derive(Debug, Clone)]
pub struct Ranker {
    priority: Vec<String>,
}

impl Ranker {
    pub fn new<S: AsRef<str>>(priority: &[S]) -> Self {
        Self {
            priority: priority.iter().map(|m| m.as_ref().to_string()).collect(),
        }
    }

    /// Position of the first marker found in `resolution`; unknown
    /// resolutions get `priority.len()`.
    pub fn tier(&self, resolution: &str) -> usize {
        self.priority
            .iter()
            .position(|marker| resolution.contains(marker.as_str()))
            .unwrap_or(self.priority.len())
    }

    /// Stable sort by (tier, fallback); ties keep input order.
    ///
    /// The tier comes from the outcome's resolution, never its host name.
    pub fn rank(&self, mut outcomes: Vec<ResolutionOutcome>) -> Vec<ResolutionOutcome> {
        outcomes.sort_by_key(|o| (self.tier(&o.resolution), o.is_fallback));
        outcomes
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_PRIORITY)
    }
}
