//! Depth-bounded URL frontier
//!
//! URLs are grouped by depth and handed out one whole level at a time, so a
//! crawl is strictly breadth-first. A URL enters `visited` when it is
//! enqueued, which makes it fetchable at most once per run regardless of how
//! many pages link to it.

use std::collections::{BTreeMap, HashSet};
use url::Url;

/// A URL waiting to be fetched, with the depth it was discovered at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    pub depth: u32,
}

/// Level-ordered frontier owned by the coordinator
#[derive(Debug, Default)]
pub struct Frontier {
    max_depth: Option<u32>,
    visited: HashSet<String>,
    pending: BTreeMap<u32, Vec<CrawlTask>>,
    enqueued: usize,
}

impl Frontier {
    /// Creates an empty frontier; `None` means unbounded depth
    pub fn new(max_depth: Option<u32>) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Adds `url` at `depth`
    ///
    /// Returns false without changing anything if the depth exceeds the
    /// maximum or the URL was already enqueued at any depth.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> bool {
        if self.max_depth.is_some_and(|max| depth > max) {
            return false;
        }
        if !self.visited.insert(url.as_str().to_string()) {
            return false;
        }

        self.pending
            .entry(depth)
            .or_default()
            .push(CrawlTask { url, depth });
        self.enqueued += 1;
        true
    }

    /// Removes and returns every task pending at `depth`
    pub fn next_batch(&mut self, depth: u32) -> Vec<CrawlTask> {
        self.pending.remove(&depth).unwrap_or_default()
    }

    /// The shallowest depth that still has pending tasks
    pub fn next_depth(&self) -> Option<u32> {
        self.pending.keys().next().copied()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.values().any(|tasks| !tasks.is_empty())
    }

    /// Number of tasks waiting across all depths
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Total URLs ever accepted by [`enqueue`](Self::enqueue)
    pub fn enqueued_count(&self) -> usize {
        self.enqueued
    }

    /// Drops every pending task; visited URLs stay visited
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending_len();
        self.pending.clear();
        dropped
    }
}
