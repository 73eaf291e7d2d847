//! Recency cache of evaluated pull requests
//!
//! Remembers, per repository and pull request, the update marker that was
//! last acted upon, so unchanged pull requests are not re-evaluated on every
//! pass. A second map, the conflict ledger, remembers the marker observed
//! right after a conflict comment was posted.

use crate::types::{PullRequest, RepoKey, UpdateMarker};
use std::collections::HashMap;

/// Per-repository map from pull-request number to marker
type MarkerMap = HashMap<u64, UpdateMarker>;

/// Last-seen markers keyed by (repository, pull request)
#[derive(Debug, Clone, Default)]
pub struct RecencyCache {
    seen: HashMap<RepoKey, MarkerMap>,
    conflicts: HashMap<RepoKey, MarkerMap>,
}

impl RecencyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pull request's current marker as handled
    pub fn mark_seen(&mut self, repo: &RepoKey, pr: &PullRequest) {
        self.seen
            .entry(repo.clone())
            .or_default()
            .insert(pr.number, pr.updated.clone());
    }

    /// Marker stored for this pull request, if any
    pub fn last_seen(&self, repo: &RepoKey, pr_number: u64) -> Option<&UpdateMarker> {
        self.seen.get(repo).and_then(|m| m.get(&pr_number))
    }

    /// Whether the pull request's marker equals the stored one
    pub fn is_unchanged(&self, repo: &RepoKey, pr: &PullRequest) -> bool {
        self.last_seen(repo, pr.number) == Some(&pr.updated)
    }

    /// Remember the marker observed after posting a conflict comment
    pub fn mark_conflicted(&mut self, repo: &RepoKey, pr: &PullRequest) {
        self.conflicts
            .entry(repo.clone())
            .or_default()
            .insert(pr.number, pr.updated.clone());
    }

    /// Whether a conflict was already reported for exactly this revision
    pub fn is_known_conflict(&self, repo: &RepoKey, pr: &PullRequest) -> bool {
        self.conflicts
            .get(repo)
            .and_then(|m| m.get(&pr.number))
            .is_some_and(|marker| *marker == pr.updated)
    }

    /// Drop every entry of one repository
    ///
    /// Called after a merge: the destination moved, so every other open pull
    /// request in that repository must be re-evaluated.
    pub fn clear_repository(&mut self, repo: &RepoKey) {
        self.seen.remove(repo);
        self.conflicts.remove(repo);
    }

    /// Number of seen entries held for a repository
    pub fn len_for(&self, repo: &RepoKey) -> usize {
        self.seen.get(repo).map_or(0, HashMap::len)
    }

    /// Whether no repository has any seen entry
    pub fn is_empty(&self) -> bool {
        self.seen.values().all(HashMap::is_empty)
    }
}
