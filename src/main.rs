// src/main.rs
// =============================================================================
// This is the entry point of the crawler.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing, written to stderr)
// 3. Dispatch to the crawl or status handler
// 4. Exit with proper code (0 = clean stop, 1 = crawl stopped on an error
//    or could not be saved, 2 = could not start)
//
// The crawl handler is also where the process is bootstrapped: output
// directory, GitHub token, HTTP client and snapshot file are all set up here
// before the crawl loop gets them.
// =============================================================================

mod cli;
mod crawl;
mod error;
mod extract;
mod github;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, CrawlArgs, StatusArgs};
use crawl::{CrawlConfig, CrawlOutcome, CrawlReport, CrawlState, Crawler, FsSink, JsonFileSnapshot, SnapshotStore};
use github::{GithubFetcher, RepoIdentity};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Crawl(args) => handle_crawl(args).await,
        Commands::Status(args) => handle_status(args).await,
    }
}

// RUST_LOG wins over --verbose when it is set
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "readme_crawler=debug"
    } else {
        "readme_crawler=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// Handles the 'crawl' subcommand
async fn handle_crawl(args: CrawlArgs) -> Result<i32> {
    // A bad seed is a usage error, reported before anything is touched
    let seed = RepoIdentity::resolve(&args.seed).with_context(|| format!("invalid seed repository '{}'", args.seed))?;

    println!("🔍 Crawling from seed: {}", seed);
    if let Some(max) = args.max_visits {
        println!("📊 Visit limit for this run: {}", max);
    }

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;

    let token = resolve_token(args.token.as_deref(), args.token_file.as_deref()).await?;
    if token.is_none() {
        warn!("No GitHub token given, unauthenticated requests are limited to 60 per hour");
    }

    let fetcher = GithubFetcher::new(&args.api_url, token, Duration::from_secs(args.timeout))
        .context("setting up the GitHub client")?;
    let sink = FsSink::new(&args.out_dir);
    let snapshot = JsonFileSnapshot::new(args.state_path());

    let mut state = CrawlState::load(&snapshot).await;
    plant_seed(&mut state, seed);

    let config = CrawlConfig {
        max_visits: args.max_visits,
    };
    let report = Crawler::new(&fetcher, &sink, &snapshot, config).run(&mut state).await;

    print_report(&report, args.json)?;

    Ok(if report.is_clean() { 0 } else { 1 })
}

// The seed is recorded like any discovered link. On a resumed crawl it is
// usually already known (and visited), in which case nothing changes.
fn plant_seed(state: &mut CrawlState, seed: RepoIdentity) {
    let key = seed.key();

    if !state.contains(&key) {
        info!("Seeding the frontier with {}", seed);
        state.record_link(key, seed);
    } else if state.get(&key).is_some_and(|r| r.visited) {
        info!(
            "Seed {} already visited, resuming with {} unvisited link(s)",
            seed,
            state.frontier_len()
        );
    } else {
        info!("Seed {} is still waiting in the frontier", seed);
    }
}

// The token file wins over --token / GITHUB_TOKEN. Blank values count as
// "no token".
async fn resolve_token(token: Option<&str>, token_file: Option<&Path>) -> Result<Option<String>> {
    let raw = match token_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading token file {}", path.display()))?,
        None => token.unwrap_or_default().to_string(),
    };

    let token = raw.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!();
    println!("📊 Summary:");
    match &report.outcome {
        CrawlOutcome::Exhausted => println!("   🏁 Finished: no unvisited links left"),
        CrawlOutcome::LimitReached => println!("   🛑 Stopped: visit limit reached"),
        CrawlOutcome::Fatal(reason) => println!("   ⛔ Stopped: {}", reason),
    }
    println!("   📦 Batches: {}", report.batches);
    println!("   ✅ Fetched: {} of {} attempt(s)", report.fetched, report.attempts());
    println!("   ❌ Skipped: {}", report.failed);
    println!("   🔗 New links: {}", report.discovered);
    println!("   📋 Known: {} ({} unvisited)", report.known, report.frontier);
    if let Some(e) = &report.save_error {
        println!("   💾 Snapshot NOT saved: {}", e);
    }
    Ok(())
}

// What 'status --json' prints
#[derive(Debug, Serialize)]
struct StatusReport {
    snapshot: String,
    known: usize,
    visited: usize,
    frontier: usize,
    anchor_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    unvisited: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anchors: Option<Vec<String>>,
}

impl StatusReport {
    fn new(path: &Path, state: &CrawlState, with_frontier: bool, with_anchors: bool) -> Self {
        let unvisited = with_frontier.then(|| {
            state
                .records()
                .filter(|(_, record)| !record.visited)
                .map(|(_, record)| record.identity.to_string())
                .collect()
        });
        let anchors = with_anchors.then(|| state.anchors().map(str::to_string).collect());

        StatusReport {
            snapshot: path.display().to_string(),
            known: state.len(),
            visited: state.visited_count(),
            frontier: state.frontier_len(),
            anchor_count: state.anchor_count(),
            unvisited,
            anchors,
        }
    }
}

// Handles the 'status' subcommand
async fn handle_status(args: StatusArgs) -> Result<i32> {
    let snapshot = JsonFileSnapshot::new(&args.state);

    // Unlike a crawl, status should complain about a broken snapshot
    let state = match snapshot.load().await? {
        Some(state) => state,
        None => {
            println!("⚠️  No snapshot at {}", args.state.display());
            return Ok(0);
        }
    };

    let report = StatusReport::new(&args.state, &state, args.frontier, args.anchors);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    println!("📋 Snapshot: {}", report.snapshot);
    if state.is_empty() {
        println!("   (no links recorded yet)");
    }
    println!("   🔗 Known: {}", report.known);
    println!("   ✅ Visited: {}", report.visited);
    println!("   ⏳ Unvisited: {}", report.frontier);
    println!("   🏷️  Anchor texts: {}", report.anchor_count);

    if let Some(unvisited) = &report.unvisited {
        println!();
        for repo in unvisited {
            println!("   {}", repo);
        }
    }
    if let Some(anchors) = &report.anchors {
        println!();
        for anchor in anchors {
            println!("   {}", anchor);
        }
    }

    Ok(0)
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does handle_crawl build the fetcher, sink and snapshot itself?
//    - Crawler only borrows them (&dyn Trait), so they must live somewhere
//      for the whole crawl; local variables in this function do
//    - Tests build fake versions of the same three things instead
//
// 2. What is bool::then?
//    - cond.then(|| value) is Some(value) when cond is true, else None
//    - Used above for the optional lists in StatusReport
//
// 3. Why eprintln! in main but tracing everywhere else?
//    - If run() fails early, the subscriber may not be set up yet
// -----------------------------------------------------------------------------
