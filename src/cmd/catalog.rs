use anyhow::{Context, Result};

use toonhop::{Catalog, ResolverConfig, VideoResolver};

use super::output::{print_json, print_page};

fn catalog(config: &ResolverConfig) -> Result<Catalog> {
    let resolver = VideoResolver::from_config(config)?;
    Ok(Catalog::new(resolver.transport(), config))
}

pub async fn cmd_popular(config: &ResolverConfig, page: u32, json: bool) -> Result<()> {
    let listing = catalog(config)?
        .popular(page)
        .await
        .with_context(|| format!("failed to load popular page {page}"))?;
    if json {
        return print_json(&listing);
    }
    print_page(&listing, page);
    Ok(())
}

pub async fn cmd_search(config: &ResolverConfig, query: &str, page: u32, json: bool) -> Result<()> {
    let listing = catalog(config)?
        .search(query, page)
        .await
        .with_context(|| format!("search for '{query}' failed"))?;
    if json {
        return print_json(&listing);
    }
    print_page(&listing, page);
    Ok(())
}

pub async fn cmd_details(config: &ResolverConfig, url: &str, json: bool) -> Result<()> {
    let details = catalog(config)?
        .details(url)
        .await
        .with_context(|| format!("failed to load {url}"))?;
    if json {
        return print_json(&details);
    }
    println!("{}", details.title);
    if !details.genres.is_empty() {
        println!("Genres: {}", details.genres.join(", "));
    }
    if !details.description.is_empty() {
        println!("\n{}", details.description);
    }
    Ok(())
}

pub async fn cmd_episodes(config: &ResolverConfig, url: &str, json: bool) -> Result<()> {
    let episodes = catalog(config)?
        .episodes(url)
        .await
        .with_context(|| format!("failed to load episodes from {url}"))?;
    if json {
        return print_json(&episodes);
    }
    if episodes.is_empty() {
        println!("No episodes found");
        return Ok(());
    }
    for episode in &episodes {
        println!("{}", episode.name);
        println!("   {}", episode.url);
    }
    Ok(())
}
