// src/crawl/state.rs
// =============================================================================
// This module owns the crawl state: every repository link discovered so far,
// whether it has been visited, and every anchor text seen on the way.
//
// Lifecycle of a record:
//   discovered in a README  -> record_link()  -> visited = false (frontier)
//   fetched (or skipped)    -> mark_visited() -> visited = true
// Records are never removed.
//
// The state is loaded from a snapshot when the program starts and written
// back once when the crawl stops, which is what makes the crawl resumable.
//
// Rust concepts:
// - BTreeMap/BTreeSet: sorted collections, so the snapshot file is stable
//   from one save to the next
// - Traits + async_trait: SnapshotStore hides where the snapshot lives
// =============================================================================

use crate::error::{EmptyFrontier, IdentityError, StateError};
use crate::github::RepoIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SNAPSHOT_VERSION: u32 = 1;

/// A known repository and whether it has been visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(flatten)]
    pub identity: RepoIdentity,
    pub visited: bool,
}

/// One unvisited record, copied out of the state for a traversal batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub key: String,
    pub identity: RepoIdentity,
}

/// All links and anchor texts of one crawl.
///
/// The map is private: the only ways to change it are `record_link` and
/// `mark_visited`, so a record can never go back to unvisited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    #[serde(default)]
    records: BTreeMap<String, LinkRecord>,
    #[serde(default)]
    anchors: BTreeSet<String>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the state from `store`, falling back to an empty state.
    ///
    /// A missing snapshot is normal on the first run. An unreadable one is
    /// logged and ignored: the crawl starts over instead of refusing to run.
    pub async fn load(store: &dyn SnapshotStore) -> Self {
        match store.load().await {
            Ok(Some(state)) => {
                info!(
                    "Loaded {} link(s), {} unvisited, from {}",
                    state.len(),
                    state.frontier_len(),
                    store.location().display()
                );
                state
            }
            Ok(None) => {
                info!("No snapshot at {}, starting empty", store.location().display());
                Self::new()
            }
            Err(e) => {
                warn!("{}; starting with an empty link map", e);
                Self::new()
            }
        }
    }

    /// Adds an unvisited record under `key` unless the key is already known.
    ///
    /// Returns true when a record was inserted. An existing record is never
    /// overwritten, whatever identity is passed in.
    pub fn record_link(&mut self, key: String, identity: RepoIdentity) -> bool {
        if self.records.contains_key(&key) {
            return false;
        }
        self.records.insert(
            key,
            LinkRecord {
                identity,
                visited: false,
            },
        );
        true
    }

    /// Resolves `url` and records it under its canonical key.
    ///
    /// Parameters:
    ///   url: a link taken from a bullet line
    ///
    /// Returns: Ok(true) for a new record, Ok(false) for a known one, or the
    /// IdentityError when the link does not name a repository
    pub fn record_url(&mut self, url: &str) -> Result<bool, IdentityError> {
        let identity = RepoIdentity::resolve(url)?;
        Ok(self.record_link(identity.key(), identity))
    }

    /// Returns true when the anchor text had not been seen before.
    pub fn record_anchor(&mut self, anchor: &str) -> bool {
        if self.anchors.contains(anchor) {
            return false;
        }
        self.anchors.insert(anchor.to_string())
    }

    /// Copies out every unvisited record.
    ///
    /// Returns: the batch, or EmptyFrontier when every record is visited.
    /// Callers must not rely on the order of the returned entries.
    pub fn unvisited_batch(&self) -> Result<Vec<FrontierEntry>, EmptyFrontier> {
        let batch: Vec<FrontierEntry> = self
            .records
            .iter()
            .filter(|(_, record)| !record.visited)
            .map(|(key, record)| FrontierEntry {
                key: key.clone(),
                identity: record.identity.clone(),
            })
            .collect();

        if batch.is_empty() {
            Err(EmptyFrontier)
        } else {
            Ok(batch)
        }
    }

    /// Marks the record under `key` as visited.
    ///
    /// Returns true only on the unvisited -> visited transition; visited or
    /// unknown keys are left alone.
    pub fn mark_visited(&mut self, key: &str) -> bool {
        match self.records.get_mut(key) {
            Some(record) if !record.visited => {
                record.visited = true;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&LinkRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.records.values().filter(|r| r.visited).count()
    }

    pub fn frontier_len(&self) -> usize {
        self.len() - self.visited_count()
    }

    /// Read-only view of all records, sorted by key.
    pub fn records(&self) -> impl Iterator<Item = (&str, &LinkRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn anchors(&self) -> impl Iterator<Item = &str> {
        self.anchors.iter().map(String::as_str)
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

/// Durable storage for a `CrawlState`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when no snapshot has been written yet.
    async fn load(&self) -> Result<Option<CrawlState>, StateError>;

    async fn save(&self, state: &CrawlState) -> Result<(), StateError>;

    /// Where the snapshot lives, for log messages.
    fn location(&self) -> &Path;
}

// On-disk layout of the snapshot
#[derive(Serialize, Deserialize)]
struct SnapshotFile<S> {
    version: u32,
    #[serde(flatten)]
    state: S,
}

/// Snapshot stored as a single JSON file.
///
/// Saving writes a sibling `.tmp` file and renames it over the old snapshot,
/// so a crash mid-save leaves the previous snapshot intact.
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn load_error(&self, reason: impl ToString) -> StateError {
        StateError::Load {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn save_error(&self, reason: impl ToString) -> StateError {
        StateError::Save {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshot {
    async fn load(&self) -> Result<Option<CrawlState>, StateError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.load_error(e)),
        };

        let file: SnapshotFile<CrawlState> =
            serde_json::from_slice(&bytes).map_err(|e| self.load_error(e))?;
        if file.version != SNAPSHOT_VERSION {
            return Err(self.load_error(format!("unsupported snapshot version {}", file.version)));
        }

        Ok(Some(file.state))
    }

    async fn save(&self, state: &CrawlState) -> Result<(), StateError> {
        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            state,
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|e| self.save_error(e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.save_error(e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json)
            .await
            .map_err(|e| self.save_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.save_error(e))?;

        info!("Saved {} link(s) ({} bytes) to {}", state.len(), json.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is CrawlState::load not returning a Result?
//    - A crawl can always start from nothing, so a bad snapshot is logged
//      and replaced by an empty state
//    - SnapshotStore::load does return the error, for callers like 'status'
//
// 2. Why write to a .tmp file and rename it?
//    - rename() replaces the old file in one step, so a crash halfway
//      through a save leaves the previous snapshot intact
//
// 3. What does #[serde(flatten)] do?
//    - It inlines the fields of the inner struct, so a record is saved as
//      {"owner": .., "name": .., "visited": ..} instead of nesting identity
// -----------------------------------------------------------------------------
