//! Flattening decoded page state into resolution candidates.

use super::state::PageState;

/// One (quality tier, host, link) triple awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Position in enumeration order; the ranking tie-breaker.
    pub index: usize,
    pub resolution: String,
    pub is_high_quality: bool,
    pub host_name: String,
    /// Absolute link for the first hop.
    pub link: String,
}

/// Flatten `state` group by group, file by file.
///
/// Consumes the state; it is not needed once candidates exist.
pub fn enumerate(state: PageState, archive_origin: &str) -> Vec<Candidate> {
    state
        .encode_groups
        .into_iter()
        .flat_map(|group| {
            let resolution = group.resolution;
            let is_high_quality = group.is_high_quality;
            group.files.into_iter().map(move |file| {
                (
                    resolution.clone(),
                    is_high_quality,
                    file.host_name,
                    file.raw_link,
                )
            })
        })
        .enumerate()
        .map(|(index, (resolution, is_high_quality, host_name, raw_link))| Candidate {
            index,
            resolution,
            is_high_quality,
            host_name,
            link: normalize_link(&raw_link, archive_origin),
        })
        .collect()
}

/// Root-relative links hang off the archive origin; anything else is kept.
///
/// Scheme-relative links (`//host/path`) get `https:`.
pub fn normalize_link(raw: &str, archive_origin: &str) -> String {
    if raw.starts_with("//") {
        format!("https:{raw}")
    } else if raw.starts_with('/') {
        format!("{}{raw}", archive_origin.trim_end_matches('/'))
    } else {
        raw.to_string()
    }
}
