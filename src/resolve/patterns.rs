//! Ordered extraction chains.
//!
//! Each hop's fallback policy is a slice of named pure functions
//! `body -> Option<url>`, tried in order; the first hit wins.
//!
//! ## Bridge page
//!
//! - `redirect_state` - embedded `window.__PROPS__` with `link.domain` + `link.hidden`
//! - `destination` - `"destination":"https:\/\/..."` with escaped slashes
//!
//! ## Host page
//!
//! - `token_href` - `href="https://...?tok=..."` download anchors
//! - `download_path` - quoted `https://.../download/...` URLs
//! - `player_file` - player setup `file: "https://..."`

use std::sync::LazyLock;

use regex::Regex;

use super::state;

/// A single extraction rule.
pub type Extractor = fn(&str) -> Option<String>;

/// Named rule, for logging which one matched.
#[derive(Clone, Copy)]
pub struct Pattern {
    pub name: &'static str,
    pub extract: Extractor,
}

pub const BRIDGE_CHAIN: &[Pattern] = &[
    Pattern {
        name: "redirect_state",
        extract: redirect_state,
    },
    Pattern {
        name: "destination",
        extract: destination,
    },
];

pub const HOST_CHAIN: &[Pattern] = &[
    Pattern {
        name: "token_href",
        extract: token_href,
    },
    Pattern {
        name: "download_path",
        extract: download_path,
    },
    Pattern {
        name: "player_file",
        extract: player_file,
    },
];

/// First rule in `chain` that yields a value, with its name.
pub fn first_match(chain: &[Pattern], body: &str) -> Option<(&'static str, String)> {
    chain
        .iter()
        .find_map(|p| (p.extract)(body).map(|url| (p.name, url)))
}

const STATIC_PATTERN: &str = "static pattern compiles";

static DESTINATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""destination"\s*:\s*"([^"]+)""#).expect(STATIC_PATTERN));

static TOKEN_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href\s*=\s*["'](https?://[^"' ]+[?&;](?:tok|token)=[^"' ]+)["']"#)
        .expect(STATIC_PATTERN)
});

static DOWNLOAD_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](https?://[^"' ]+/download/[^"' ]+)["']"#).expect(STATIC_PATTERN)
});

static PLAYER_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bfile\s*:\s*["'](https?://[^"']+)["']"#).expect(STATIC_PATTERN)
});

pub fn redirect_state(body: &str) -> Option<String> {
    state::extract_redirect_state(body).ok().map(|s| s.link())
}

pub fn destination(body: &str) -> Option<String> {
    capture(&DESTINATION, body).map(|url| url.replace("\\/", "/"))
}

pub fn token_href(body: &str) -> Option<String> {
    capture(&TOKEN_HREF, body).map(|url| url.replace("&amp;", "&"))
}

pub fn download_path(body: &str) -> Option<String> {
    capture(&DOWNLOAD_PATH, body).map(|url| url.replace("\\/", "/"))
}

pub fn player_file(body: &str) -> Option<String> {
    capture(&PLAYER_FILE, body).map(|url| url.replace("\\/", "/"))
}

fn capture(regex: &Regex, body: &str) -> Option<String> {
    regex
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}
