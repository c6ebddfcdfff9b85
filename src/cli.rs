// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Subcommands:
// - crawl:  start or resume a crawl from a seed repository
// - status: summarise a saved crawl snapshot without touching the network
//
// Rust concepts:
// - Derive macros: clap generates the parser from these structs
// - Option<T>: optional flags (no default value) are Option fields
// - PathBuf: owned filesystem paths
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_SEED: &str = "https://github.com/sindresorhus/awesome";
pub const SNAPSHOT_FILE_NAME: &str = "linkFile.json";

#[derive(Parser, Debug)]
#[command(
    name = "readme-crawler",
    version,
    about = "Crawl GitHub READMEs by following their bullet-list links",
    long_about = "readme-crawler starts at a seed repository, fetches its README, and follows every \
                  '- [name](https://github.com/owner/repo)' line to further repositories. Each README \
                  is fetched once and saved to disk; the link map is saved at the end so the next run \
                  picks up where this one stopped."
)]
pub struct Cli {
    /// Log debug output (per-link decisions, HTTP requests)
    ///
    /// RUST_LOG overrides this when set.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start or resume a crawl
    ///
    /// Example: readme-crawler crawl https://github.com/sindresorhus/awesome --max-visits 500
    Crawl(CrawlArgs),

    /// Show what a saved crawl snapshot contains
    ///
    /// Example: readme-crawler status --frontier
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Repository whose README starts the crawl
    #[arg(default_value = DEFAULT_SEED)]
    pub seed: String,

    /// Directory that receives the fetched README files
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,

    /// Snapshot file (default: <out-dir>/linkFile.json)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// GitHub personal access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Read the GitHub token from this file (takes precedence over --token)
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Base URL of the GitHub REST API
    #[arg(long, default_value = crate::github::DEFAULT_API_URL)]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Stop after this many README fetches in this run
    #[arg(long)]
    pub max_visits: Option<usize>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl CrawlArgs {
    pub fn state_path(&self) -> PathBuf {
        self.state
            .clone()
            .unwrap_or_else(|| self.out_dir.join(SNAPSHOT_FILE_NAME))
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Snapshot file to inspect
    #[arg(long, default_value = "out/linkFile.json")]
    pub state: PathBuf,

    /// Also list every unvisited repository
    #[arg(long)]
    pub frontier: bool,

    /// Also list every anchor text seen so far
    #[arg(long)]
    pub anchors: bool,

    /// Output in JSON format instead of text
    #[arg(long)]
    pub json: bool,
}
