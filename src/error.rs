// src/error.rs
// =============================================================================
// Error types for the crawl core.
//
// Each stage has its own small error enum so callers can decide, by type,
// whether a failure is local to one line, one link, one repository, or the
// whole run:
//
//   ExtractError  -> skip that part of the line
//   IdentityError -> skip that link
//   FetchError    -> skip the repository (Transient) or stop the crawl (Fatal)
//   EmptyFrontier -> the crawl is finished
//   StateError    -> Load starts empty, Save is reported to the operator
//   SinkError     -> logged, the crawl continues
//
// The application layer (main.rs) wraps all of these in anyhow::Error.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Failures while pulling the anchor text or the target out of a bullet line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no [anchor] in line: {0}")]
    MalformedAnchor(String),

    #[error("no (link) in line: {0}")]
    MalformedLink(String),
}

/// Failures while turning a URL into an owner/name pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("link too short to name a repository: {0}")]
    LinkTooShort(String),

    #[error("link has an empty owner or repository name: {0}")]
    InvalidIdentity(String),
}

/// How the traversal should react to a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Quota or authorization exhausted, or the API is unreachable.
    Fatal,
    /// Only this repository is affected (missing README, bad encoding, ...).
    Transient,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GitHub API rejected the request for {repo} (HTTP {status}): quota or credentials exhausted")]
    QuotaExhausted { repo: String, status: u16 },

    #[error("no README found for {0}")]
    NotFound(String),

    #[error("GitHub API returned HTTP {status} for {repo}")]
    Status { repo: String, status: u16 },

    #[error("could not reach the GitHub API: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("request for {repo} failed: {source}")]
    Request {
        repo: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode README of {repo}: {reason}")]
    Decode { repo: String, reason: String },

    #[error("invalid API endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("API endpoint {0} cannot have a path")]
    EndpointNotABase(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::QuotaExhausted { .. } | FetchError::Unreachable(_) => FetchErrorKind::Fatal,
            // Only raised while building the fetcher, before any request
            FetchError::Endpoint(_) | FetchError::EndpointNotABase(_) => FetchErrorKind::Fatal,
            FetchError::NotFound(_)
            | FetchError::Status { .. }
            | FetchError::Request { .. }
            | FetchError::Decode { .. } => FetchErrorKind::Transient,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == FetchErrorKind::Fatal
    }
}

/// Every known record has been visited. This is the normal end of a crawl.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no unvisited links left")]
pub struct EmptyFrontier;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("could not load crawl snapshot from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("could not save crawl snapshot to {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
#[error("could not store README of {repo} at {path}: {source}")]
pub struct SinkError {
    pub repo: String,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
