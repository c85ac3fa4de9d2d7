//! `toonhop` CLI - browse the catalog and resolve episode streams

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toonhop::ResolverConfig;

#[derive(Parser)]
#[command(name = "toonhop")]
#[command(about = "Resolve playable video streams for catalog episodes")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/toonhop/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List popular shows
    Popular {
        /// Listing page
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Search the catalog
    Search {
        /// Search terms
        query: String,

        /// Result page
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show title, description and genres of a show
    Details {
        /// Show page URL
        url: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List episode links of a show, newest first
    Episodes {
        /// Show page URL
        url: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve playable streams for an episode
    Resolve {
        /// Episode URL, or a path on the archive
        episode: String,

        /// Print JSON
        #[arg(long)]
        json: bool,

        /// Maximum candidates resolved at once
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Per-candidate timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = ResolverConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Popular { page, json } => {
            cmd::catalog::cmd_popular(&config, page, json).await?;
        }
        Commands::Search { query, page, json } => {
            cmd::catalog::cmd_search(&config, &query, page, json).await?;
        }
        Commands::Details { url, json } => {
            cmd::catalog::cmd_details(&config, &url, json).await?;
        }
        Commands::Episodes { url, json } => {
            cmd::catalog::cmd_episodes(&config, &url, json).await?;
        }
        Commands::Resolve {
            episode,
            json,
            concurrency,
            timeout,
        } => {
            if let Some(limit) = concurrency {
                config.max_concurrency = limit;
            }
            if let Some(secs) = timeout {
                config.candidate_timeout_secs = secs;
            }
            cmd::resolve::cmd_resolve(&config, &episode, json).await?;
        }
    }

    Ok(())
}
