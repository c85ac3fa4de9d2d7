//! Embedded page state.
//!
//! Episode and bridge pages carry their data as an inline script assignment
//! (`window.__PROPS__ = {...};`). This module finds that assignment, cuts the
//! value out at its top-level terminator and decodes it. Nothing here fails
//! past its boundary: callers get a [`StateError`] and treat it as "no
//! candidates".

use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Marker that prefixes the inline state assignment.
pub const PROPS_MARKER: &str = "window.__PROPS__ = ";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("state marker not found")]
    Absent,

    #[error("state payload is empty")]
    Empty,

    #[error("state payload does not decode: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Decoded episode page state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub encode_groups: Vec<EncodeGroup>,
}

impl PageState {
    /// Total number of file candidates across all groups.
    pub fn candidate_count(&self) -> usize {
        self.encode_groups.iter().map(|g| g.files.len()).sum()
    }
}

/// One quality tier and its mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeGroup {
    pub resolution: String,
    pub is_high_quality: bool,
    pub files: Vec<FileCandidate>,
}

/// One mirror entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub host_name: String,
    pub raw_link: String,
}

/// Target embedded in a bridge page: `domain` + `hidden_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectLinkState {
    pub domain: String,
    pub hidden_path: String,
}

impl RedirectLinkState {
    pub fn link(&self) -> String {
        format!("{}{}", self.domain, self.hidden_path)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct EpisodeProps {
    data: EpisodeDataWrapper,
}

#[derive(Debug, Deserialize)]
struct EpisodeDataWrapper {
    data: EpisodeData,
}

#[derive(Debug, Deserialize)]
struct EpisodeData {
    encodes: Vec<RawEncode>,
}

#[derive(Debug, Deserialize)]
struct RawEncode {
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    is_hq: bool,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RedirectProps {
    link: RawRedirectLink,
}

#[derive(Debug, Deserialize)]
struct RawRedirectLink {
    domain: String,
    hidden: String,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<EpisodeProps> for PageState {
    fn from(props: EpisodeProps) -> Self {
        let encode_groups = props
            .data
            .data
            .encodes
            .into_iter()
            .filter_map(|encode| {
                let Some(resolution) = required(encode.resolution) else {
                    tracing::debug!("Dropping encode group without resolution");
                    return None;
                };
                let files = encode
                    .files
                    .into_iter()
                    .filter_map(|file| match (required(file.host), required(file.link)) {
                        (Some(host_name), Some(raw_link)) => Some(FileCandidate {
                            host_name,
                            raw_link,
                        }),
                        _ => {
                            tracing::debug!(%resolution, "Dropping file entry missing host or link");
                            None
                        }
                    })
                    .collect();
                Some(EncodeGroup {
                    resolution,
                    is_high_quality: encode.is_hq,
                    files,
                })
            })
            .collect();

        Self { encode_groups }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Decode the episode state embedded in `html`.
pub fn extract_page_state(html: &str) -> Result<PageState, StateError> {
    let props: EpisodeProps = extract_json(html, PROPS_MARKER)?;
    Ok(props.into())
}

/// Decode the redirect target embedded in a bridge page.
pub fn extract_redirect_state(html: &str) -> Result<RedirectLinkState, StateError> {
    let props: RedirectProps = extract_json(html, PROPS_MARKER)?;
    let state = RedirectLinkState {
        domain: props.link.domain.trim().to_string(),
        hidden_path: props.link.hidden.trim().to_string(),
    };
    if state.link().is_empty() {
        return Err(StateError::Empty);
    }
    Ok(state)
}

/// Find the assignment after `marker` and decode its value as `T`.
pub fn extract_json<T: DeserializeOwned>(html: &str, marker: &str) -> Result<T, StateError> {
    let payload = find_assignment(html, marker).ok_or(StateError::Absent)?;
    if payload.is_empty() {
        return Err(StateError::Empty);
    }
    Ok(serde_json::from_str(&payload)?)
}

/// Raw text of the value assigned after `marker`.
///
/// Prefers the `<script>` element that contains the marker; falls back to
/// scanning the whole document when the markup is too broken to parse
/// scripts out of it.
pub fn find_assignment(html: &str, marker: &str) -> Option<String> {
    if let Some(script) = script_containing(html, marker) {
        if let Some(value) = assignment_value(&script, marker) {
            return Some(value.to_string());
        }
    }
    assignment_value(html, marker).map(str::to_string)
}

fn script_containing(html: &str, marker: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;
    document
        .select(&selector)
        .map(|script| script.text().collect::<String>())
        .find(|text| text.contains(marker))
}

/// Slice between `marker` and the next top-level statement terminator.
///
/// The terminator is a `;` outside of string literals at bracket depth zero,
/// or the end of the line once a bracketed value has closed.
pub fn assignment_value<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];

    let mut depth: i32 = 0;
    let mut closed_value = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut end = rest.len();

    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => {
                depth -= 1;
                if depth < 0 {
                    end = i;
                    break;
                }
                if depth == 0 {
                    closed_value = true;
                }
            }
            ';' if depth == 0 => {
                end = i;
                break;
            }
            '\n' | '\r' if depth == 0 && closed_value => {
                end = i;
                break;
            }
            '<' if depth == 0 && rest[i..].starts_with("</script") => {
                end = i;
                break;
            }
            _ => {}
        }
    }

    Some(rest[..end].trim())
}
