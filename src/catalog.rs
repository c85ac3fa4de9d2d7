//! Catalog pages: listings, search, details and episode lists.
//!
//! Parsing is pure and synchronous over HTML strings; [`Catalog`] only adds
//! the fetch. Episode references produced here feed
//! [`VideoResolver::resolve_videos`](crate::resolve::VideoResolver::resolve_videos).

use std::sync::{Arc, LazyLock};

use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ResolverConfig;
use crate::transport::{RequestHeaders, Transport, TransportError};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimeEntry {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// One page of a listing or search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnimePage {
    pub entries: Vec<AnimeEntry>,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnimeDetails {
    pub title: String,
    pub description: String,
    pub genres: Vec<String>,
}

/// Link to an episode page on the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRef {
    pub url: String,
    pub name: String,
}

// ============================================================================
// Selectors
// ============================================================================

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

static ENTRY: LazyLock<Selector> =
    LazyLock::new(|| selector("article.herald-lay-b, article.herald-fa-item"));
static ENTRY_LINK: LazyLock<Selector> = LazyLock::new(|| selector("h2.entry-title a"));
static ENTRY_THUMB: LazyLock<Selector> = LazyLock::new(|| selector("img.wp-post-image"));
static NEXT_LINK: LazyLock<Selector> = LazyLock::new(|| selector("nav.herald-pagination a.next"));
static PAGE_NUMBER: LazyLock<Selector> =
    LazyLock::new(|| selector("nav.herald-pagination a.page-numbers"));
static CURRENT_PAGE: LazyLock<Selector> =
    LazyLock::new(|| selector("nav.herald-pagination span.current"));
static DETAIL_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h1.entry-title"));
static DETAIL_TEXT: LazyLock<Selector> = LazyLock::new(|| selector("div.herald-entry-content p"));
static DETAIL_GENRE: LazyLock<Selector> = LazyLock::new(|| selector("span.meta-category a"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static ACCORDION_HEADING: LazyLock<Selector> =
    LazyLock::new(|| selector(".mks_accordion_heading"));

// ============================================================================
// URL builders
// ============================================================================

pub fn popular_url(base: &str, page: u32) -> String {
    format!("{}/page/{page}", base.trim_end_matches('/'))
}

pub fn search_url(base: &str, page: u32, query: &str) -> String {
    format!(
        "{}/page/{page}/?s={}",
        base.trim_end_matches('/'),
        urlencoding::encode(query)
    )
}

// ============================================================================
// Parsing
// ============================================================================

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

pub fn parse_listing(html: &str) -> AnimePage {
    let document = Html::parse_document(html);

    let entries = document
        .select(&ENTRY)
        .filter_map(|article| {
            let link = article.select(&ENTRY_LINK).next()?;
            let url = link.value().attr("href")?.trim().to_string();
            let title = text_of(link);
            if url.is_empty() || title.is_empty() {
                return None;
            }
            let thumbnail = article
                .select(&ENTRY_THUMB)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string);
            Some(AnimeEntry {
                title,
                url,
                thumbnail,
            })
        })
        .collect();

    AnimePage {
        entries,
        has_next_page: has_next_page(&document),
    }
}

fn has_next_page(document: &Html) -> bool {
    if document.select(&NEXT_LINK).next().is_some() {
        return true;
    }
    let current = document
        .select(&CURRENT_PAGE)
        .next()
        .and_then(|span| text_of(span).parse::<u32>().ok())
        .unwrap_or(1);
    document
        .select(&PAGE_NUMBER)
        .filter_map(|a| text_of(a).parse::<u32>().ok())
        .any(|n| n > current)
}

pub fn parse_details(html: &str) -> AnimeDetails {
    let document = Html::parse_document(html);

    let title = document
        .select(&DETAIL_TITLE)
        .next()
        .map(text_of)
        .unwrap_or_default();
    let description = document
        .select(&DETAIL_TEXT)
        .map(text_of)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    let genres = document.select(&DETAIL_GENRE).map(text_of).collect();

    AnimeDetails {
        title,
        description,
        genres,
    }
}

/// Episode links pointing at `archive_host`, newest first.
pub fn parse_episodes(html: &str, archive_host: &str) -> Vec<EpisodeRef> {
    let document = Html::parse_document(html);

    let mut episodes: Vec<EpisodeRef> = document
        .select(&ANCHOR)
        .filter_map(|anchor| {
            let url = anchor.value().attr("href")?;
            if !url.contains(archive_host) {
                return None;
            }
            let name = accordion_heading(anchor)
                .or_else(|| preceding_label(anchor))
                .or_else(|| non_empty(text_of(anchor)))
                .unwrap_or_else(|| url.to_string());
            Some(EpisodeRef {
                url: url.to_string(),
                name,
            })
        })
        .collect();

    episodes.reverse();
    episodes
}

fn accordion_heading(anchor: ElementRef<'_>) -> Option<String> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().classes().any(|c| c == "mks_accordion_item"))?
        .select(&ACCORDION_HEADING)
        .next()
        .map(text_of)
        .and_then(non_empty)
}

fn preceding_label(anchor: ElementRef<'_>) -> Option<String> {
    let parent = anchor.parent().and_then(ElementRef::wrap)?;
    parent
        .prev_siblings()
        .find_map(ElementRef::wrap)
        .map(text_of)
        .and_then(non_empty)
}

// ============================================================================
// Fetching
// ============================================================================

/// Catalog client over the shared transport.
pub struct Catalog {
    transport: Arc<dyn Transport>,
    base_origin: String,
    archive_host: String,
}

impl Catalog {
    pub fn new(transport: Arc<dyn Transport>, config: &ResolverConfig) -> Self {
        let archive_host = Url::parse(&config.archive_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| config.archive_origin().to_string());
        Self {
            transport,
            base_origin: config.base_origin().to_string(),
            archive_host,
        }
    }

    pub async fn popular(&self, page: u32) -> Result<AnimePage, CatalogError> {
        let html = self.get(&popular_url(&self.base_origin, page)).await?;
        Ok(parse_listing(&html))
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<AnimePage, CatalogError> {
        let html = self.get(&search_url(&self.base_origin, page, query)).await?;
        Ok(parse_listing(&html))
    }

    pub async fn details(&self, url: &str) -> Result<AnimeDetails, CatalogError> {
        let html = self.get(url).await?;
        Ok(parse_details(&html))
    }

    pub async fn episodes(&self, url: &str) -> Result<Vec<EpisodeRef>, CatalogError> {
        let html = self.get(url).await?;
        let episodes = parse_episodes(&html, &self.archive_host);
        debug!(count = episodes.len(), "Parsed episode list");
        Ok(episodes)
    }

    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<String, CatalogError> {
        let headers = RequestHeaders::new().with("Referer", format!("{}/", self.base_origin));
        let response = self.transport.fetch(url, &headers).await?;
        if !response.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::test_support::{MockReply, MockTransport};

    const LISTING: &str = r#"
        <html><body>
        <article class="herald-lay-b">
            <img class="wp-post-image" src="https://img.example/a.jpg">
            <h2 class="entry-title"><a href="https://catalog.example/show-a/">Show  A</a></h2>
        </article>
        <article class="herald-fa-item">
            <h2 class="entry-title"><a href="https://catalog.example/show-b/">Show B</a></h2>
        </article>
        <article class="herald-lay-b"><h2 class="entry-title">No link</h2></article>
        <nav class="herald-pagination">
            <span class="page-numbers current">1</span>
            <a class="page-numbers" href="/page/2">2</a>
        </nav>
        </body></html>
    "#;

    #[test]
    fn url_builders() {
        assert_eq!(popular_url("https://c.example/", 2), "https://c.example/page/2");
        assert_eq!(
            search_url("https://c.example", 1, "one piece & co"),
            "https://c.example/page/1/?s=one%20piece%20%26%20co"
        );
    }

    #[test]
    fn listing_entries() {
        let page = parse_listing(LISTING);
        assert_eq!(
            page.entries,
            vec![
                AnimeEntry {
                    title: "Show A".into(),
                    url: "https://catalog.example/show-a/".into(),
                    thumbnail: Some("https://img.example/a.jpg".into()),
                },
                AnimeEntry {
                    title: "Show B".into(),
                    url: "https://catalog.example/show-b/".into(),
                    thumbnail: None,
                },
            ]
        );
        assert!(page.has_next_page);
    }

    #[test]
    fn last_page_has_no_next() {
        let html = r#"<nav class="herald-pagination">
            <a class="page-numbers" href="/page/1">1</a>
            <span class="page-numbers current">2</span></nav>"#;
        assert!(!parse_listing(html).has_next_page);
    }

    #[test]
    fn pagination_outside_nav_is_ignored() {
        let html = r#"
            <div class="widget"><span class="current">1</span>
                <a class="page-numbers" href="/other/5">5</a></div>
            <nav class="herald-pagination">
                <a class="page-numbers" href="/page/2">2</a>
                <span class="page-numbers current">3</span></nav>"#;
        assert!(!parse_listing(html).has_next_page);
    }

    #[test]
    fn next_link_means_next_page() {
        let html = r#"<nav class="herald-pagination"><a class="next page-numbers" href="/page/9">Next</a></nav>"#;
        assert!(parse_listing(html).has_next_page);
    }

    #[test]
    fn details() {
        let html = r#"
            <h1 class="entry-title"> Show A </h1>
            <span class="meta-category"><a href="/g/action">Action</a>, <a href="/g/comedy">Comedy</a></span>
            <div class="herald-entry-content"><p>First line.</p><p></p><p>Second line.</p></div>
        "#;
        let details = parse_details(html);
        assert_eq!(details.title, "Show A");
        assert_eq!(details.description, "First line.\n\nSecond line.");
        assert_eq!(details.genres, vec!["Action", "Comedy"]);
    }

    #[test]
    fn episodes_use_accordion_headings_and_reverse() {
        let html = r#"
            <div class="mks_accordion_item">
                <div class="mks_accordion_heading">Episode 1</div>
                <div class="mks_accordion_content"><a href="https://archive.example/episode/1">Watch</a></div>
            </div>
            <div class="mks_accordion_item">
                <div class="mks_accordion_heading">Episode 2</div>
                <div class="mks_accordion_content"><a href="https://archive.example/episode/2">Watch</a></div>
            </div>
            <a href="https://elsewhere.example/episode/3">Other</a>
        "#;
        let episodes = parse_episodes(html, "archive.example");
        assert_eq!(
            episodes,
            vec![
                EpisodeRef {
                    url: "https://archive.example/episode/2".into(),
                    name: "Episode 2".into(),
                },
                EpisodeRef {
                    url: "https://archive.example/episode/1".into(),
                    name: "Episode 1".into(),
                },
            ]
        );
    }

    #[test]
    fn episode_name_falls_back_to_preceding_label_then_anchor() {
        let html = r#"
            <div>
                <h3>Movie</h3>
                <p><a href="https://archive.example/movie/1">Download</a></p>
            </div>
            <div><span><a href="https://archive.example/special/1">Special 1</a></span></div>
        "#;
        let names: Vec<_> = parse_episodes(html, "archive.example")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Special 1", "Movie"]);
    }

    #[tokio::test]
    async fn fetches_listing_with_catalog_referer() {
        let transport = MockTransport::new();
        transport.route("https://catalog.example/page/1", MockReply::ok(LISTING));
        let config = ResolverConfig {
            base_url: "https://catalog.example".into(),
            ..ResolverConfig::default()
        };
        let catalog = Catalog::new(Arc::new(transport.clone()), &config);

        let page = catalog.popular(1).await.unwrap();

        assert_eq!(page.entries.len(), 2);
        let sent = transport.requests_to("https://catalog.example/page/1");
        assert_eq!(sent[0].get("Referer"), Some("https://catalog.example/"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let transport = MockTransport::new();
        transport.route("https://catalog.example/show/", MockReply::status(404, ""));
        let config = ResolverConfig {
            base_url: "https://catalog.example".into(),
            ..ResolverConfig::default()
        };
        let catalog = Catalog::new(Arc::new(transport), &config);

        let err = catalog.episodes("https://catalog.example/show/").await.unwrap_err();
        assert!(matches!(err, CatalogError::Status { .. }));
    }
}
