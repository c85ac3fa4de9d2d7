//! Browser Fingerprint
//!
//! Mirror and host pages serve different markup (or a challenge) to clients
//! that do not look like a desktop browser. A [`BrowserProfile`] carries the
//! header set a real browser sends; the resolver pins one profile per session
//! so every hop presents the same identity.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT,
};

/// Desktop Chrome user agent presented by default.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const CHROME_VERSIONS: &[(&str, &str)] = &[
    ("120", "120.0.6099.109"),
    ("121", "121.0.6167.85"),
    ("122", "122.0.6261.94"),
    ("123", "123.0.6312.86"),
];

const FIREFOX_VERSIONS: &[&str] = &["121.0", "122.0", "123.0"];

const SAFARI_VERSIONS: &[(&str, &str)] = &[("17.2", "605.1.15"), ("17.3", "605.1.15")];

/// Browser profile with realistic fingerprint
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub sec_ch_ua: String,
    pub sec_ch_ua_mobile: String,
    pub sec_ch_ua_platform: String,
}

/// Platform configurations
#[derive(Debug, Clone, Copy)]
pub enum Platform {
    MacOS,
    Windows,
    Linux,
}

impl Platform {
    fn random() -> Self {
        let mut rng = rand::thread_rng();
        // Windows 65%, macOS 20%, Linux 15%
        let roll: f32 = rng.gen();
        if roll < 0.65 {
            Platform::Windows
        } else if roll < 0.85 {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            Platform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            Platform::Windows => "Windows NT 10.0; Win64; x64",
            Platform::Linux => "X11; Linux x86_64",
        }
    }

    fn sec_ch_platform(self) -> &'static str {
        match self {
            Platform::MacOS => "\"macOS\"",
            Platform::Windows => "\"Windows\"",
            Platform::Linux => "\"Linux\"",
        }
    }
}

impl BrowserProfile {
    /// Chrome-shaped profile presenting a fixed user agent.
    #[must_use]
    pub fn fixed(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            accept: CHROME_ACCEPT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            accept_encoding: "gzip, deflate, br, zstd".to_string(),
            sec_ch_ua: String::new(),
            sec_ch_ua_mobile: String::new(),
            sec_ch_ua_platform: String::new(),
        }
    }

    /// Convert profile to reqwest `HeaderMap`.
    ///
    /// Values that are not valid header text are left out rather than
    /// failing client construction.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        insert(&mut headers, USER_AGENT, &self.user_agent);
        insert(&mut headers, ACCEPT, &self.accept);
        insert(&mut headers, ACCEPT_LANGUAGE, &self.accept_language);
        insert(&mut headers, ACCEPT_ENCODING, &self.accept_encoding);

        if !self.sec_ch_ua.is_empty() {
            insert(&mut headers, HeaderName::from_static("sec-ch-ua"), &self.sec_ch_ua);
            insert(
                &mut headers,
                HeaderName::from_static("sec-ch-ua-mobile"),
                &self.sec_ch_ua_mobile,
            );
            insert(
                &mut headers,
                HeaderName::from_static("sec-ch-ua-platform"),
                &self.sec_ch_ua_platform,
            );
        }

        headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));

        headers
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!(header = %name, "Skipping invalid header value in profile"),
    }
}

const CHROME_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// Generate a realistic Chrome browser profile
#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = Platform::random();
    let (major, full) = CHROME_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(("120", "120.0.0.0"));

    let user_agent = format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{full} Safari/537.36",
        platform.os_string(),
    );

    let brands = [
        format!("\"Google Chrome\";v=\"{major}\""),
        format!("\"Chromium\";v=\"{major}\""),
        "\"Not_A Brand\";v=\"24\"".to_string(),
    ];

    BrowserProfile {
        user_agent,
        accept: CHROME_ACCEPT.to_string(),
        accept_language: random_accept_language(),
        accept_encoding: "gzip, deflate, br, zstd".to_string(),
        sec_ch_ua: brands.join(", "),
        sec_ch_ua_mobile: "?0".to_string(),
        sec_ch_ua_platform: platform.sec_ch_platform().to_string(),
    }
}

/// Generate a realistic Firefox browser profile
#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = Platform::random();
    let version = FIREFOX_VERSIONS.choose(&mut rng).copied().unwrap_or("121.0");

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}; rv:{version}) Gecko/20100101 Firefox/{version}",
            platform.os_string(),
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
            .to_string(),
        accept_language: random_accept_language(),
        accept_encoding: "gzip, deflate, br, zstd".to_string(),
        // Firefox doesn't send Sec-CH-UA headers
        sec_ch_ua: String::new(),
        sec_ch_ua_mobile: String::new(),
        sec_ch_ua_platform: String::new(),
    }
}

/// Generate a realistic Safari browser profile
#[must_use]
pub fn safari_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let (version, webkit) = SAFARI_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(("17.2", "605.1.15"));

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/{webkit} (KHTML, like Gecko) Version/{version} Safari/{webkit}"
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        accept_language: random_accept_language(),
        accept_encoding: "gzip, deflate, br".to_string(),
        sec_ch_ua: String::new(),
        sec_ch_ua_mobile: String::new(),
        sec_ch_ua_platform: String::new(),
    }
}

/// Generate a random browser profile (weighted by market share)
#[must_use]
pub fn random_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let roll: f32 = rng.gen();
    if roll < 0.65 {
        chrome_profile()
    } else if roll < 0.85 {
        safari_profile()
    } else {
        firefox_profile()
    }
}

fn random_accept_language() -> String {
    let mut rng = rand::thread_rng();
    let languages = [
        "en-US,en;q=0.9",
        "en-GB,en;q=0.9",
        "en-US,en;q=0.9,hi;q=0.8",
        "en-US,en;q=0.9,es;q=0.8",
    ];
    languages
        .choose(&mut rng)
        .copied()
        .unwrap_or("en-US,en;q=0.9")
        .to_string()
}
