// src/github/fetch.rs
// =============================================================================
// This module fetches README files through the GitHub REST API.
//
// Endpoint:
//   GET {api}/repos/{owner}/{name}/readme
//
// The API answers with JSON whose "content" field is the README encoded as
// base64 (wrapped at 60 columns, so it contains newlines). We decode it and
// check that the result is UTF-8.
//
// Error classification matters here: the crawl loop stops on a Fatal error
// and skips the repository on a Transient one.
//   401 / 403 / 429, connection failures -> Fatal
//   404, other statuses, timeouts, decode -> Transient
// =============================================================================

use crate::error::FetchError;
use crate::github::RepoIdentity;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Anything that can hand back the README text of a repository.
///
/// The traversal awaits each call before starting the next one, so an
/// implementation never sees two requests at once.
#[async_trait]
pub trait ReadmeFetcher: Send + Sync {
    async fn fetch(&self, repo: &RepoIdentity) -> Result<String, FetchError>;
}

// Shape of the README endpoint response (only the fields we read)
#[derive(Debug, Deserialize)]
struct ReadmeResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}

/// `ReadmeFetcher` backed by api.github.com (or a compatible server).
pub struct GithubFetcher {
    client: Client,
    api_url: Url,
    token: Option<String>,
}

impl GithubFetcher {
    /// Builds a fetcher.
    ///
    /// Parameters:
    ///   api_url: base URL of the API, normally DEFAULT_API_URL
    ///   token: personal access token; unauthenticated requests get a much
    ///          smaller hourly quota
    ///   timeout: per-request timeout
    pub fn new(api_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let api_url = Url::parse(api_url)?;
        if api_url.cannot_be_a_base() {
            return Err(FetchError::EndpointNotABase(api_url.to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("readme-crawler/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(FetchError::Unreachable)?;

        Ok(Self {
            client,
            api_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    // Builds {api}/repos/{owner}/{name}/readme
    //
    // Owner and name come straight from README text, so each is pushed as its
    // own path segment. '?', '#', '/' and backslashes inside them are
    // percent-encoded and stay part of that segment.
    //
    // Returns: None for "." or "..", which cannot be a path segment
    fn readme_url(&self, repo: &RepoIdentity) -> Option<Url> {
        if is_dot_segment(&repo.owner) || is_dot_segment(&repo.name) {
            return None;
        }

        let mut url = self.api_url.clone();
        // new() only accepts base URLs, and those always have path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", repo.owner.as_str(), repo.name.as_str(), "readme"]);
        }
        Some(url)
    }
}

#[async_trait]
impl ReadmeFetcher for GithubFetcher {
    async fn fetch(&self, repo: &RepoIdentity) -> Result<String, FetchError> {
        // No GitHub repository is called "." or ".."
        let url = self
            .readme_url(repo)
            .ok_or_else(|| FetchError::NotFound(repo.to_string()))?;
        debug!("GET {}", url);

        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| classify_send_error(repo, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(repo, status));
        }

        let body: ReadmeResponse = response.json().await.map_err(|e| FetchError::Decode {
            repo: repo.to_string(),
            reason: e.to_string(),
        })?;

        decode_content(repo, &body)
    }
}

fn is_dot_segment(part: &str) -> bool {
    part == "." || part == ".."
}

// Sorts a failed send into Fatal (API unreachable) or Transient
//
// Parameters:
//   repo: repository the request was for (goes into the error message)
//   err: the error returned by send()
fn classify_send_error(repo: &RepoIdentity, err: reqwest::Error) -> FetchError {
    if err.is_connect() {
        FetchError::Unreachable(err)
    } else {
        FetchError::Request {
            repo: repo.to_string(),
            source: err,
        }
    }
}

fn classify_status(repo: &RepoIdentity, status: StatusCode) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            FetchError::QuotaExhausted {
                repo: repo.to_string(),
                status: status.as_u16(),
            }
        }
        StatusCode::NOT_FOUND => FetchError::NotFound(repo.to_string()),
        _ => FetchError::Status {
            repo: repo.to_string(),
            status: status.as_u16(),
        },
    }
}

// Turns the "content" field of the API response into README text
//
// Returns: the README, or a transient Decode error when the encoding is not
// base64, the payload does not decode, or the bytes are not UTF-8
fn decode_content(repo: &RepoIdentity, body: &ReadmeResponse) -> Result<String, FetchError> {
    let decode_error = |reason: String| FetchError::Decode {
        repo: repo.to_string(),
        reason,
    };

    if body.encoding != "base64" {
        return Err(decode_error(format!("unsupported encoding '{}'", body.encoding)));
    }

    let packed: String = body.content.split_whitespace().collect();
    let bytes = STANDARD.decode(packed).map_err(|e| decode_error(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| decode_error(e.to_string()))
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why path_segments_mut() instead of format!("repos/{}/{}/readme")?
//    - A name like "cool?tab=x" would start a query string
//    - Segments pushed one at a time are percent-encoded ("cool%3Ftab=x")
//
// 2. What does #[async_trait] do?
//    - It rewrites async fns in a trait to return a boxed future, so the
//      trait can be used as &dyn ReadmeFetcher
//
// 3. What is ok_or_else?
//    - It turns Option<T> into Result<T, E>; the closure builds the error
//      only when the value is None
// -----------------------------------------------------------------------------
