//! Rebasing one pull request in a local workspace
//!
//! An attempt walks a fixed sequence: fetch, branch from `origin/<source>`,
//! rebase onto `origin/<destination>`, then push or abort depending on the
//! outcome. Cleanup always runs afterwards, whichever step failed.
//!
//! The steps sit behind [`RebaseSteps`] so the sequence can run against a
//! real clone ([`GitRebaser`]) or a recording fake in tests.

mod git;

pub use git::GitRebaser;

use crate::error::{Error, Result};
use crate::types::{PullRequest, RepositoryConfig};
use crate::workspace::RebaseExit;
use async_trait::async_trait;
use tracing::{info, warn};

/// What git reported for the rebase itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseStatus {
    /// The destination was already contained in the source; nothing replayed
    UpToDate,
    /// The source was behind the destination and moved forward
    FastForward,
    /// Commits were replayed onto the destination
    Ok,
    /// Git stopped on a conflict
    Stopped,
    /// Anything else git did
    Unrecognized(String),
}

/// Result of a whole attempt, as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The source branch now sits on top of its destination
    Succeeded {
        /// Whether a push happened
        pushed: bool,
    },
    /// The rebase stopped on a conflict and was aborted
    Conflict,
    /// Git ended in a state the daemon does not know how to handle
    Escalated {
        /// What git reported
        reason: String,
    },
}

/// Classify a rebase run once it is known whether it was a fast-forward
pub fn classify(fast_forward: bool, exit: RebaseExit) -> RebaseStatus {
    match exit {
        RebaseExit::Completed if fast_forward => RebaseStatus::FastForward,
        RebaseExit::Completed => RebaseStatus::Ok,
        RebaseExit::Stopped => RebaseStatus::Stopped,
        RebaseExit::Failed { stderr } => RebaseStatus::Unrecognized(stderr),
    }
}

/// The individual operations of an attempt
pub trait RebaseSteps {
    /// Fetch all remote refs, pruning deleted ones
    fn fetch(&mut self) -> Result<()>;

    /// Create or reset the local source branch from its remote counterpart
    fn checkout_source(&mut self, branch: &str) -> Result<()>;

    /// Rebase the checked-out branch onto `origin/<destination>`
    fn rebase_onto(&mut self, destination: &str) -> Result<RebaseStatus>;

    /// Force-push the local branch to the remote branch of the same name
    fn push_force(&mut self, branch: &str) -> Result<()>;

    /// Abort a stopped rebase
    fn abort_rebase(&mut self) -> Result<()>;

    /// Return the workspace to its resting state
    fn clean_up(&mut self) -> Result<()>;
}

/// Run one attempt followed by cleanup
///
/// Cleanup runs exactly once, on every path. When it fails the workspace can
/// no longer be trusted, so that failure wins over the attempt's own result
/// and is reported as [`Error::Workspace`].
pub fn run<S: RebaseSteps>(steps: &mut S, pr: &PullRequest) -> Result<RebaseOutcome> {
    let attempt = attempt(steps, pr);

    match (attempt, steps.clean_up()) {
        (result, Ok(())) => result,
        (result, Err(cleanup_err)) => {
            if let Err(e) = &result {
                warn!(pr_number = pr.number, error = %e, "rebase attempt failed before cleanup");
            }
            Err(Error::Workspace(format!(
                "cleanup after rebasing {pr} failed: {cleanup_err}"
            )))
        }
    }
}

fn attempt<S: RebaseSteps>(steps: &mut S, pr: &PullRequest) -> Result<RebaseOutcome> {
    steps.fetch()?;
    steps.checkout_source(&pr.source)?;

    match steps.rebase_onto(&pr.destination)? {
        RebaseStatus::UpToDate => {
            warn!(
                pr_number = pr.number,
                branch = %pr.source,
                "{pr} is already up to date although the host reported divergence"
            );
            Ok(RebaseOutcome::Succeeded { pushed: false })
        }
        status @ (RebaseStatus::FastForward | RebaseStatus::Ok) => {
            if status == RebaseStatus::FastForward {
                warn!(pr_number = pr.number, branch = %pr.source, "{pr} was fast-forwarded");
            }
            steps.push_force(&pr.source)?;
            info!(pr_number = pr.number, branch = %pr.source, "rebased and pushed {pr}");
            Ok(RebaseOutcome::Succeeded { pushed: true })
        }
        RebaseStatus::Stopped => {
            steps.abort_rebase()?;
            info!(pr_number = pr.number, branch = %pr.source, "{pr} has conflicts");
            Ok(RebaseOutcome::Conflict)
        }
        RebaseStatus::Unrecognized(reason) => {
            if let Err(e) = steps.abort_rebase() {
                warn!(pr_number = pr.number, error = %e, "abort after unrecognized rebase failed");
            }
            Ok(RebaseOutcome::Escalated { reason })
        }
    }
}

/// Performs rebase attempts for the decision engine
#[async_trait]
pub trait Rebaser: Send + Sync {
    /// Rebase the pull request's source branch onto its destination
    async fn rebase(&self, repo: &RepositoryConfig, pr: &PullRequest) -> Result<RebaseOutcome>;
}
