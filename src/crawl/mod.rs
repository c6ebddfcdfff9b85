// src/crawl/mod.rs
// =============================================================================
// This module handles the repository crawl.
//
// Submodules:
// - state: the link map (visited / unvisited) and its on-disk snapshot
// - engine: the breadth-first loop that fetches READMEs and folds new links
//   back into the state
// - sink: where fetched README documents are written
//
// Rust concepts:
// - Collections: BTreeMap keyed by "owner/name" for the link map
// - Trait objects: the engine works with &dyn ReadmeFetcher, &dyn
//   DocumentSink and &dyn SnapshotStore
// =============================================================================

mod engine;
mod sink;
mod state;

pub use engine::{CrawlConfig, CrawlOutcome, CrawlReport, Crawler};
pub use sink::FsSink;
pub use state::{CrawlState, JsonFileSnapshot, SnapshotStore};
