// src/crawl/sink.rs
// =============================================================================
// Where fetched README documents end up.
//
// The crawl loop hands every successfully fetched README to a DocumentSink.
// FsSink, the one used by the CLI, writes it to:
//
//   <out-dir>/<owner>/<name>.md
// =============================================================================

use crate::error::SinkError;
use crate::github::RepoIdentity;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn store(&self, repo: &RepoIdentity, content: &str) -> Result<(), SinkError>;
}

pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, repo: &RepoIdentity) -> PathBuf {
        self.root.join(&repo.owner).join(format!("{}.md", repo.name))
    }
}

#[async_trait]
impl DocumentSink for FsSink {
    async fn store(&self, repo: &RepoIdentity, content: &str) -> Result<(), SinkError> {
        let path = self.path_for(repo);
        let wrap = |source: std::io::Error| SinkError {
            repo: repo.to_string(),
            path: path.clone(),
            source,
        };

        if !is_plain_component(&repo.owner) || !is_plain_component(&repo.name) {
            return Err(wrap(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "owner and name must be plain path components",
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
        }
        tokio::fs::write(&path, content).await.map_err(wrap)?;

        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}

// Rejects names that would escape the output directory
fn is_plain_component(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
}
