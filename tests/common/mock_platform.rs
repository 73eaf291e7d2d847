//! Mock platform service and rebaser for testing
//!
//! These are test utilities - not all may be used in current tests but are
//! available for future test development.

#![allow(dead_code)]

use async_trait::async_trait;
use rebazer::error::{Error, Result};
use rebazer::platform::PlatformService;
use rebazer::rebase::{RebaseOutcome, Rebaser};
use rebazer::types::{PullRequest, RepoKey, RepositoryConfig, UpdateMarker};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Call record for `comment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCall {
    pub pr_number: u64,
    pub body: String,
}

#[derive(Default)]
struct State {
    open_prs: Vec<PullRequest>,
    green: HashMap<u64, bool>,
    diverged: HashMap<u64, bool>,
    approved: HashMap<u64, bool>,
    refreshed: HashMap<u64, UpdateMarker>,
    // Call tracking
    calls: Vec<String>,
    merge_calls: Vec<u64>,
    comment_calls: Vec<CommentCall>,
    // Error injection
    error_on_list: Option<String>,
    error_on_green: Option<String>,
    error_on_merge: Option<String>,
    error_on_comment: Option<String>,
}

/// Simple mock platform service for testing
///
/// Clones share state, so a test can hand one clone to the engine and keep
/// another to configure responses and inspect calls.
///
/// Features:
/// - Configurable open pull requests and per-PR build/divergence/approval answers
/// - Configurable refreshed markers
/// - Call tracking for verification
/// - Error injection for failure path testing
///
/// Unconfigured answers: green build, not diverged, not approved.
#[derive(Clone)]
pub struct MockPlatformService {
    config: RepositoryConfig,
    state: Arc<Mutex<State>>,
}

impl MockPlatformService {
    /// Create a new mock bound to the given repository
    pub fn with_config(config: RepositoryConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Cache key of the configured repository
    pub fn key(&self) -> RepoKey {
        self.config.key()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    // === Response configuration ===

    /// Set the pull requests `list_open_pull_requests` returns
    pub fn set_open_prs(&self, prs: Vec<PullRequest>) {
        self.state.lock().unwrap().open_prs = prs;
    }

    pub fn set_green(&self, pr_number: u64, green: bool) {
        self.state.lock().unwrap().green.insert(pr_number, green);
    }

    pub fn set_diverged(&self, pr_number: u64, diverged: bool) {
        self.state.lock().unwrap().diverged.insert(pr_number, diverged);
    }

    pub fn set_approved(&self, pr_number: u64, approved: bool) {
        self.state.lock().unwrap().approved.insert(pr_number, approved);
    }

    /// Marker `refresh_pull_request` reports for a PR
    pub fn set_refreshed_marker(&self, pr_number: u64, marker: &str) {
        self.state
            .lock()
            .unwrap()
            .refreshed
            .insert(pr_number, UpdateMarker::new(marker));
    }

    /// Green, not diverged and approved: ready to merge
    pub fn setup_mergeable_pr(&self, pr_number: u64) {
        self.set_green(pr_number, true);
        self.set_diverged(pr_number, false);
        self.set_approved(pr_number, true);
    }

    // === Error injection methods ===

    pub fn fail_list(&self, msg: &str) {
        self.state.lock().unwrap().error_on_list = Some(msg.to_string());
    }

    pub fn fail_green(&self, msg: &str) {
        self.state.lock().unwrap().error_on_green = Some(msg.to_string());
    }

    pub fn fail_merge(&self, msg: &str) {
        self.state.lock().unwrap().error_on_merge = Some(msg.to_string());
    }

    pub fn fail_comment(&self, msg: &str) {
        self.state.lock().unwrap().error_on_comment = Some(msg.to_string());
    }

    // === Call inspection ===

    /// Every call in order, e.g. `"list"`, `"green #42"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls concerning one pull request
    pub fn calls_for(&self, pr_number: u64) -> Vec<String> {
        let suffix = format!(" #{pr_number}");
        self.calls()
            .into_iter()
            .filter(|c| c.ends_with(&suffix))
            .collect()
    }

    pub fn merge_calls(&self) -> Vec<u64> {
        self.state.lock().unwrap().merge_calls.clone()
    }

    pub fn comment_calls(&self) -> Vec<CommentCall> {
        self.state.lock().unwrap().comment_calls.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.clear();
        state.merge_calls.clear();
        state.comment_calls.clear();
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>> {
        self.record("list".to_string());
        let state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_list {
            return Err(Error::BitbucketApi(msg.clone()));
        }
        Ok(state.open_prs.clone())
    }

    async fn refresh_pull_request(&self, pr: &PullRequest) -> Result<PullRequest> {
        self.record(format!("refresh #{}", pr.number));
        let state = self.state.lock().unwrap();
        Ok(state
            .refreshed
            .get(&pr.number)
            .map_or_else(|| pr.clone(), |marker| pr.with_marker(marker.clone())))
    }

    async fn is_approved(&self, pr: &PullRequest) -> Result<bool> {
        self.record(format!("approved #{}", pr.number));
        let state = self.state.lock().unwrap();
        Ok(state.approved.get(&pr.number).copied().unwrap_or(false))
    }

    async fn has_diverged_from_destination(&self, pr: &PullRequest) -> Result<bool> {
        self.record(format!("diverged #{}", pr.number));
        let state = self.state.lock().unwrap();
        Ok(state.diverged.get(&pr.number).copied().unwrap_or(false))
    }

    async fn has_green_build(&self, pr: &PullRequest) -> Result<bool> {
        self.record(format!("green #{}", pr.number));
        let state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_green {
            return Err(Error::BitbucketApi(msg.clone()));
        }
        Ok(state.green.get(&pr.number).copied().unwrap_or(true))
    }

    async fn merge(&self, pr: &PullRequest) -> Result<()> {
        self.record(format!("merge #{}", pr.number));
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_merge {
            return Err(Error::BitbucketApi(msg.clone()));
        }
        state.merge_calls.push(pr.number);
        Ok(())
    }

    async fn comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        self.record(format!("comment #{}", pr.number));
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_comment {
            return Err(Error::BitbucketApi(msg.clone()));
        }
        state.comment_calls.push(CommentCall {
            pr_number: pr.number,
            body: body.to_string(),
        });
        Ok(())
    }

    fn config(&self) -> &RepositoryConfig {
        &self.config
    }
}

/// Mock rebaser with canned outcomes per pull request
///
/// Unconfigured pull requests rebase successfully with a push.
#[derive(Clone, Default)]
pub struct MockRebaser {
    outcomes: Arc<Mutex<HashMap<u64, RebaseOutcome>>>,
    calls: Arc<Mutex<Vec<(String, u64)>>>,
    error: Arc<Mutex<Option<String>>>,
}

impl MockRebaser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, pr_number: u64, outcome: RebaseOutcome) {
        self.outcomes.lock().unwrap().insert(pr_number, outcome);
    }

    /// Make every rebase fail with a git error
    pub fn fail(&self, msg: &str) {
        *self.error.lock().unwrap() = Some(msg.to_string());
    }

    /// `(repository name, pr number)` of every attempt
    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Rebaser for MockRebaser {
    async fn rebase(&self, repo: &RepositoryConfig, pr: &PullRequest) -> Result<RebaseOutcome> {
        self.calls.lock().unwrap().push((repo.name.clone(), pr.number));
        if let Some(msg) = self.error.lock().unwrap().as_ref() {
            return Err(Error::Git {
                command: "git fetch".to_string(),
                stderr: msg.clone(),
            });
        }
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .get(&pr.number)
            .cloned()
            .unwrap_or(RebaseOutcome::Succeeded { pushed: true }))
    }
}
