//! Pull-request decision engine
//!
//! Every pass lists the open pull requests of each repository and walks each
//! one through a fixed sequence of checks (blacklist, change detection, build,
//! divergence, approval) that ends in at most one action: nothing, a rebase,
//! or a merge.

mod decide;
mod poll;

pub use decide::handle_pull_request;
pub use poll::Engine;

use crate::config::Config;
use crate::error::Result;
use crate::types::RepoKey;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// What the engine did with one pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// Source branch is blacklisted
    Ignored,
    /// Change detection found the same marker as last pass
    Unchanged,
    /// No green build yet
    WaitingForBuild,
    /// Rebased onto the destination
    Rebased,
    /// Rebase stopped on a conflict; a comment was posted
    RebaseConflict,
    /// Conflict already reported for this revision; nothing done
    AwaitingManualFix,
    /// Green and up to date but not approved
    WaitingForApproval,
    /// Merged on the hosting side
    Merged,
}

impl Action {
    /// Stable name used in logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Unchanged => "unchanged",
            Self::WaitingForBuild => "waiting_for_build",
            Self::Rebased => "rebased",
            Self::RebaseConflict => "rebase_conflict",
            Self::AwaitingManualFix => "awaiting_manual_fix",
            Self::WaitingForApproval => "waiting_for_approval",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options the decision sequence depends on
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Source branches matching this are never touched
    pub branch_blacklist: Regex,
    /// Skip pull requests whose marker did not change since last pass
    pub change_detection: bool,
}

impl EngineSettings {
    /// Settings taken from the configuration file
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            branch_blacklist: config.branch_blacklist_regex()?,
            change_detection: config.change_detection,
        })
    }
}

/// Tally of one repository within a pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSummary {
    /// Actions taken, by kind
    pub actions: BTreeMap<Action, usize>,
    /// Pull requests whose evaluation failed
    pub failures: usize,
    /// Listing the open pull requests failed; nothing else was attempted
    pub listing_failed: bool,
}

impl RepoSummary {
    fn record(&mut self, action: Action) {
        *self.actions.entry(action).or_default() += 1;
    }
}

/// Outcome of one pass over all repositories, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Per-repository tallies
    pub repositories: Vec<(RepoKey, RepoSummary)>,
}

impl PassSummary {
    /// Tally for a repository, if it was visited
    pub fn repository(&self, key: &RepoKey) -> Option<&RepoSummary> {
        self.repositories
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, summary)| summary)
    }

    /// How often an action was taken across all repositories
    pub fn count(&self, action: Action) -> usize {
        self.repositories
            .iter()
            .filter_map(|(_, s)| s.actions.get(&action))
            .sum()
    }

    /// Failed evaluations plus failed listings across all repositories
    pub fn failures(&self) -> usize {
        self.repositories
            .iter()
            .map(|(_, s)| s.failures + usize::from(s.listing_failed))
            .sum()
    }
}
