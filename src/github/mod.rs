// src/github/mod.rs
// =============================================================================
// This module handles everything specific to GitHub.
//
// Currently implements:
// - Parsing repository URLs into owner/name identities
// - Fetching README contents through the REST API
// - Classifying API failures as fatal (stop the crawl) or transient
//
// Rust concepts:
// - Traits: ReadmeFetcher is the seam the crawl loop talks to, so tests can
//   swap in a fake without touching the network
// =============================================================================

mod fetch;
mod identity;

pub use fetch::{GithubFetcher, ReadmeFetcher, DEFAULT_API_URL};
pub use identity::RepoIdentity;
