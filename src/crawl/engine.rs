// src/crawl/engine.rs
// =============================================================================
// This module drives the crawl, one breadth-first layer at a time.
//
// How it works:
// 1. Take every unvisited record from the state (one "batch")
// 2. For each record, in turn:
//    - fetch its README
//    - store the document through the sink
//    - add every new repository link found on its bullet lines
//    - mark the record visited
// 3. When the batch is done, go back to 1
// 4. Stop when no unvisited records are left, a fatal fetch error happens,
//    or the configured visit limit is reached
// 5. Save the state exactly once, whichever way the loop ended
//
// Links found while a batch is being drained only show up in the next
// batch, and a batch never holds the same key twice, so no repository is
// fetched twice in one run.
//
// A record whose fetch failed fatally stays unvisited, so the next run
// retries it.
//
// Only one request is in flight at any time; there is no parallelism here.
// =============================================================================

use crate::crawl::sink::DocumentSink;
use crate::crawl::state::{CrawlState, FrontierEntry, SnapshotStore};
use crate::extract::bullet_lines;
use crate::github::ReadmeFetcher;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Knobs for one crawl run.
#[derive(Debug, Clone, Default)]
pub struct CrawlConfig {
    /// Stop after this many fetch attempts in this run. None = no limit.
    pub max_visits: Option<usize>,
}

/// Why the crawl stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// No unvisited records left.
    Exhausted,
    /// `max_visits` fetch attempts were made.
    LimitReached,
    /// A fetch failed in a way that makes continuing pointless.
    Fatal(String),
}

/// What happened during one run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    #[serde(flatten)]
    pub outcome: CrawlOutcome,
    pub batches: usize,
    pub fetched: usize,
    pub failed: usize,
    pub discovered: usize,
    pub known: usize,
    pub frontier: usize,
    /// Set when the final snapshot could not be written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
}

impl CrawlReport {
    /// True when the run ended cleanly and its state was saved.
    pub fn is_clean(&self) -> bool {
        !matches!(self.outcome, CrawlOutcome::Fatal(_)) && self.save_error.is_none()
    }

    pub fn attempts(&self) -> usize {
        self.fetched + self.failed
    }
}

// Counters collected while the loop runs
#[derive(Debug, Default)]
struct Progress {
    batches: usize,
    fetched: usize,
    failed: usize,
    discovered: usize,
}

impl Progress {
    fn attempts(&self) -> usize {
        self.fetched + self.failed
    }
}

/// Ties the crawl state to its collaborators.
pub struct Crawler<'a> {
    fetcher: &'a dyn ReadmeFetcher,
    sink: &'a dyn DocumentSink,
    snapshot: &'a dyn SnapshotStore,
    config: CrawlConfig,
}

impl<'a> Crawler<'a> {
    pub fn new(
        fetcher: &'a dyn ReadmeFetcher,
        sink: &'a dyn DocumentSink,
        snapshot: &'a dyn SnapshotStore,
        config: CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            sink,
            snapshot,
            config,
        }
    }

    /// Crawls until the frontier is empty, a fatal error occurs, or the visit
    /// limit is hit, then saves `state` once.
    ///
    /// A failed save does not lose anything: `state` still holds every
    /// discovery, and the error is reported in `CrawlReport::save_error`.
    pub async fn run(&self, state: &mut CrawlState) -> CrawlReport {
        let mut progress = Progress::default();
        let outcome = self.traverse(state, &mut progress).await;

        match &outcome {
            CrawlOutcome::Exhausted => info!("🏁 No unvisited links left"),
            CrawlOutcome::LimitReached => info!("🛑 Visit limit reached, {} link(s) left", state.frontier_len()),
            CrawlOutcome::Fatal(reason) => error!("Stopping crawl: {}", reason),
        }

        let save_error = match self.snapshot.save(state).await {
            Ok(()) => None,
            Err(e) => {
                error!("{}", e);
                Some(e.to_string())
            }
        };

        CrawlReport {
            outcome,
            batches: progress.batches,
            fetched: progress.fetched,
            failed: progress.failed,
            discovered: progress.discovered,
            known: state.len(),
            frontier: state.frontier_len(),
            save_error,
        }
    }

    async fn traverse(&self, state: &mut CrawlState, progress: &mut Progress) -> CrawlOutcome {
        loop {
            let batch = match state.unvisited_batch() {
                Ok(batch) => batch,
                Err(_) => return CrawlOutcome::Exhausted,
            };

            progress.batches += 1;
            info!("📦 Batch {}: {} unvisited link(s)", progress.batches, batch.len());

            for entry in batch {
                if self.limit_reached(progress) {
                    return CrawlOutcome::LimitReached;
                }
                if let Some(reason) = self.visit(state, &entry, progress).await {
                    return CrawlOutcome::Fatal(reason);
                }
            }
        }
    }

    fn limit_reached(&self, progress: &Progress) -> bool {
        self.config
            .max_visits
            .is_some_and(|max| progress.attempts() >= max)
    }

    // Processes one record. Returns Some(reason) on a fatal fetch error.
    async fn visit(&self, state: &mut CrawlState, entry: &FrontierEntry, progress: &mut Progress) -> Option<String> {
        let repo = &entry.identity;

        match self.fetcher.fetch(repo).await {
            Ok(content) => {
                progress.fetched += 1;

                if let Err(e) = self.sink.store(repo, &content).await {
                    warn!("{}", e);
                }

                let added = fold_links(state, &content);
                progress.discovered += added;
                state.mark_visited(&entry.key);
                info!("  Fetched {} (+{} new link(s))", repo, added);
                None
            }
            Err(e) if e.is_fatal() => Some(e.to_string()),
            Err(e) => {
                progress.failed += 1;
                state.mark_visited(&entry.key);
                warn!("  Skipping {}: {}", repo, e);
                None
            }
        }
    }
}

/// Records the anchors and repository links of every bullet line of
/// `document`. Returns how many new records were added.
pub fn fold_links(state: &mut CrawlState, document: &str) -> usize {
    let mut added = 0;

    for bullet in bullet_lines(document) {
        match bullet.anchor {
            Ok(anchor) => {
                state.record_anchor(anchor);
            }
            Err(e) => debug!("{}", e),
        }

        let link = match bullet.link {
            Ok(Some(link)) => link,
            Ok(None) => continue,
            Err(e) => {
                debug!("{}", e);
                continue;
            }
        };

        match state.record_url(link) {
            Ok(true) => {
                added += 1;
                debug!("    new link {}", link);
            }
            Ok(false) => {}
            Err(e) => warn!("    {}", e),
        }
    }

    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, SinkError, StateError};
    use crate::github::RepoIdentity;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    // ---------------------------------------------------------------------
    // Fakes
    // ---------------------------------------------------------------------

    enum Reply {
        Readme(String),
        Missing,
        Quota,
    }

    #[derive(Default)]
    struct FakeFetcher {
        replies: HashMap<String, Reply>,
        calls: Mutex<Vec<String>>,
        // 1-based call number that fails with a quota error
        fatal_on_call: Option<usize>,
    }

    impl FakeFetcher {
        fn with(mut self, repo: &str, readme: &str) -> Self {
            self.replies.insert(repo.to_string(), Reply::Readme(readme.to_string()));
            self
        }

        fn reply(mut self, repo: &str, reply: Reply) -> Self {
            self.replies.insert(repo.to_string(), reply);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReadmeFetcher for FakeFetcher {
        async fn fetch(&self, repo: &RepoIdentity) -> Result<String, FetchError> {
            let name = repo.to_string();
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(name.clone());
                calls.len()
            };

            if self.fatal_on_call == Some(call) {
                return Err(FetchError::QuotaExhausted { repo: name, status: 403 });
            }

            match self.replies.get(&name) {
                Some(Reply::Readme(text)) => Ok(text.clone()),
                Some(Reply::Quota) => Err(FetchError::QuotaExhausted { repo: name, status: 403 }),
                Some(Reply::Missing) | None => Err(FetchError::NotFound(name)),
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        docs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentSink for MemorySink {
        async fn store(&self, repo: &RepoIdentity, _content: &str) -> Result<(), SinkError> {
            self.docs.lock().unwrap().push(repo.to_string());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl DocumentSink for FailingSink {
        async fn store(&self, repo: &RepoIdentity, _content: &str) -> Result<(), SinkError> {
            Err(SinkError {
                repo: repo.to_string(),
                path: PathBuf::from("/dev/null/x"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }
    }

    #[derive(Default)]
    struct MemorySnapshot {
        saved: Mutex<Vec<CrawlState>>,
        fail: bool,
    }

    impl MemorySnapshot {
        fn save_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SnapshotStore for MemorySnapshot {
        async fn load(&self) -> Result<Option<CrawlState>, StateError> {
            Ok(self.saved.lock().unwrap().last().cloned())
        }

        async fn save(&self, state: &CrawlState) -> Result<(), StateError> {
            if self.fail {
                return Err(StateError::Save {
                    path: PathBuf::from("memory"),
                    reason: "read-only".to_string(),
                });
            }
            self.saved.lock().unwrap().push(state.clone());
            Ok(())
        }

        fn location(&self) -> &Path {
            Path::new("memory")
        }
    }

    fn seeded(urls: &[&str]) -> CrawlState {
        let mut state = CrawlState::new();
        for url in urls {
            state.record_url(url).unwrap();
        }
        state
    }

    fn bullets(repos: &[&str]) -> String {
        repos
            .iter()
            .map(|r| format!("- [{}](https://github.com/{})\n", r, r))
            .collect()
    }

    // ---------------------------------------------------------------------
    // fold_links
    // ---------------------------------------------------------------------

    #[test]
    fn test_fold_links_records_new_in_scope_links() {
        let mut state = CrawlState::new();
        let readme = "\
# List
- [Cool Project](https://github.com/acme/cool#readme)
- [Meta List](https://github.com/foo/awesome-stuff)
- [Website](https://example.com/acme)
- [Short](https://github.com/acme)
- [Checkbox] done
Prose [Hidden](https://github.com/acme/hidden)
";
        assert_eq!(fold_links(&mut state, readme), 1);

        let record = state.get("acme/cool").unwrap();
        assert_eq!(record.identity.owner, "acme");
        assert_eq!(record.identity.name, "cool");
        assert!(!record.visited);
        assert!(!state.contains("foo/awesome-stuff"));
        assert!(!state.contains("acme/hidden"));

        let anchors: Vec<_> = state.anchors().collect();
        assert_eq!(anchors, vec!["Checkbox", "Cool Project", "Meta List", "Short", "Website"]);
    }

    #[test]
    fn test_fold_links_does_not_double_count() {
        let mut state = CrawlState::new();
        let readme = bullets(&["acme/cool", "acme/cool", "Acme/Cool"]);
        assert_eq!(fold_links(&mut state, &readme), 1);
        assert_eq!(fold_links(&mut state, &readme), 0);
        assert_eq!(state.len(), 1);
    }

    // ---------------------------------------------------------------------
    // Crawler
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_crawl_visits_each_repo_once_through_cycles() {
        let fetcher = FakeFetcher::default()
            .with("seed/root", &bullets(&["a/one", "a/two"]))
            .with("a/one", &bullets(&["seed/root", "a/two", "a/three"]))
            .with("a/two", &bullets(&["a/one", "seed/root"]))
            .with("a/three", &bullets(&["a/one", "a/two", "seed/root"]));
        let sink = MemorySink::default();
        let snapshot = MemorySnapshot::default();
        let mut state = seeded(&["https://github.com/seed/root"]);

        let report = Crawler::new(&fetcher, &sink, &snapshot, CrawlConfig::default())
            .run(&mut state)
            .await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert!(report.is_clean());
        assert_eq!(report.fetched, 4);
        assert_eq!(report.discovered, 3);
        assert_eq!(report.batches, 3);

        let mut calls = fetcher.calls();
        calls.sort();
        assert_eq!(calls, vec!["a/one", "a/three", "a/two", "seed/root"]);
        assert_eq!(sink.docs.lock().unwrap().len(), 4);

        assert_eq!(state.frontier_len(), 0);
        assert_eq!(snapshot.save_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_skipped() {
        let fetcher = FakeFetcher::default()
            .with("seed/root", &bullets(&["a/gone", "a/ok"]))
            .reply("a/gone", Reply::Missing)
            .with("a/ok", "no links here\n");
        let sink = MemorySink::default();
        let snapshot = MemorySnapshot::default();
        let mut state = seeded(&["https://github.com/seed/root"]);

        let report = Crawler::new(&fetcher, &sink, &snapshot, CrawlConfig::default())
            .run(&mut state)
            .await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.failed, 1);
        assert!(state.get("a/gone").unwrap().visited);
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_mid_batch_keeps_earlier_discoveries() {
        let fetcher = FakeFetcher {
            fatal_on_call: Some(3),
            ..Default::default()
        }
        .with("b/one", &bullets(&["new/from-one"]))
        .with("b/two", &bullets(&["new/from-two"]))
        .with("b/three", &bullets(&["new/from-three"]))
        .with("b/four", &bullets(&["new/from-four"]))
        .with("b/five", &bullets(&["new/from-five"]));
        let sink = MemorySink::default();
        let snapshot = MemorySnapshot::default();
        let mut state = seeded(&[
            "https://github.com/b/one",
            "https://github.com/b/two",
            "https://github.com/b/three",
            "https://github.com/b/four",
            "https://github.com/b/five",
        ]);

        let report = Crawler::new(&fetcher, &sink, &snapshot, CrawlConfig::default())
            .run(&mut state)
            .await;

        assert!(matches!(report.outcome, CrawlOutcome::Fatal(_)));
        assert!(!report.is_clean());
        assert_eq!(report.fetched, 2);
        assert_eq!(report.discovered, 2);

        let calls = fetcher.calls();
        assert_eq!(calls.len(), 3);

        // the two records fetched before the failure are committed
        for repo in &calls[..2] {
            assert!(state.get(repo).unwrap().visited);
            let from = repo.split('/').nth(1).unwrap();
            assert!(state.contains(&format!("new/from-{}", from)));
        }
        // the failing record and the two never attempted stay in the frontier
        assert!(!state.get(&calls[2]).unwrap().visited);
        assert_eq!(state.frontier_len(), 3 + 2);

        assert_eq!(snapshot.save_count(), 1);
        assert_eq!(snapshot.saved.lock().unwrap()[0], state);
    }

    #[tokio::test]
    async fn test_resumed_crawl_does_not_refetch() {
        // Fetching the seed again would hit the quota and stop the crawl
        let fetcher = FakeFetcher::default()
            .reply("seed/root", Reply::Quota)
            .with("a/one", &bullets(&["a/two"]))
            .with("a/two", "");
        let sink = MemorySink::default();
        let snapshot = MemorySnapshot::default();

        // State left behind by an earlier run that already read the seed
        let mut first = seeded(&["https://github.com/seed/root", "https://github.com/a/one"]);
        first.mark_visited("seed/root");
        let report = Crawler::new(&fetcher, &sink, &snapshot, CrawlConfig::default())
            .run(&mut first)
            .await;
        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert!(!fetcher.calls().iter().any(|c| c == "seed/root"));

        let mut resumed = CrawlState::load(&snapshot).await;
        assert_eq!(resumed, first);
        let report = Crawler::new(&fetcher, &sink, &snapshot, CrawlConfig::default())
            .run(&mut resumed)
            .await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(report.fetched, 0);
        assert_eq!(report.batches, 0);
        // The visited seed was never fetched in either run
        assert_eq!(fetcher.calls(), vec!["a/one", "a/two"]);
    }

    #[tokio::test]
    async fn test_visit_limit_stops_the_crawl() {
        let fetcher = FakeFetcher::default()
            .with("seed/root", &bullets(&["a/one", "a/two", "a/three"]))
            .with("a/one", "")
            .with("a/two", "")
            .with("a/three", "");
        let sink = MemorySink::default();
        let snapshot = MemorySnapshot::default();
        let mut state = seeded(&["https://github.com/seed/root"]);
        let config = CrawlConfig { max_visits: Some(2) };

        let report = Crawler::new(&fetcher, &sink, &snapshot, config).run(&mut state).await;

        assert_eq!(report.outcome, CrawlOutcome::LimitReached);
        assert!(report.is_clean());
        assert_eq!(report.attempts(), 2);
        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(state.frontier_len(), 2);
        assert_eq!(snapshot.save_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_frontier_still_saves_once() {
        let fetcher = FakeFetcher::default();
        let sink = MemorySink::default();
        let snapshot = MemorySnapshot::default();
        let mut state = CrawlState::new();

        let report = Crawler::new(&fetcher, &sink, &snapshot, CrawlConfig::default())
            .run(&mut state)
            .await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert!(fetcher.calls().is_empty());
        assert_eq!(snapshot.save_count(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_is_reported_not_lost() {
        let fetcher = FakeFetcher::default().with("seed/root", &bullets(&["a/one"]));
        let sink = MemorySink::default();
        let snapshot = MemorySnapshot {
            fail: true,
            ..Default::default()
        };
        let mut state = seeded(&["https://github.com/seed/root"]);

        let report = Crawler::new(&fetcher, &sink, &snapshot, CrawlConfig::default())
            .run(&mut state)
            .await;

        assert!(report.save_error.is_some());
        assert!(!report.is_clean());
        assert!(state.contains("a/one"));
        assert!(state.get("seed/root").unwrap().visited);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_link_discovery() {
        let fetcher = FakeFetcher::default()
            .with("seed/root", &bullets(&["a/one"]))
            .with("a/one", "");
        let snapshot = MemorySnapshot::default();
        let mut state = seeded(&["https://github.com/seed/root"]);

        let report = Crawler::new(&fetcher, &FailingSink, &snapshot, CrawlConfig::default())
            .run(&mut state)
            .await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(report.fetched, 2);
        assert_eq!(state.visited_count(), 2);
    }
}
