use std::time::Instant;

use anyhow::Result;
use tracing::info;

use toonhop::{ResolverConfig, VideoResolver};

use super::output::{print_json, print_outcomes};

pub async fn cmd_resolve(config: &ResolverConfig, episode: &str, json: bool) -> Result<()> {
    let resolver = VideoResolver::from_config(config)?;

    let start = Instant::now();
    let outcomes = resolver.resolve_videos(episode).await;
    info!(
        elapsed_ms = start.elapsed().as_millis(),
        concurrency = config.concurrency(),
        "Resolved {episode}"
    );

    if json {
        return print_json(&outcomes);
    }
    print_outcomes(&outcomes);
    Ok(())
}
