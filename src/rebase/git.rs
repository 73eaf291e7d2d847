//! Rebasing in real clones

use super::{RebaseOutcome, RebaseStatus, RebaseSteps, Rebaser, classify, run};
use crate::error::{Error, Result};
use crate::types::{PullRequest, RepositoryConfig};
use crate::workspace::{GcCountdown, LocalWorkspace, WorkspaceManager};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Rebase steps against one locked workspace
struct WorkspaceSteps<'a> {
    workspace: &'a LocalWorkspace,
    gc: &'a GcCountdown,
}

impl RebaseSteps for WorkspaceSteps<'_> {
    fn fetch(&mut self) -> Result<()> {
        self.workspace.fetch()
    }

    fn checkout_source(&mut self, branch: &str) -> Result<()> {
        self.workspace.checkout_branch(branch)
    }

    fn rebase_onto(&mut self, destination: &str) -> Result<RebaseStatus> {
        let upstream = format!("origin/{destination}");

        if self.workspace.is_ancestor(&upstream, "HEAD")? {
            return Ok(RebaseStatus::UpToDate);
        }
        let fast_forward = self.workspace.is_ancestor("HEAD", &upstream)?;
        let exit = self.workspace.rebase(&upstream)?;
        debug!(upstream = %upstream, fast_forward, ?exit, "rebase finished");
        Ok(classify(fast_forward, exit))
    }

    fn push_force(&mut self, branch: &str) -> Result<()> {
        self.workspace.push_force(branch)
    }

    fn abort_rebase(&mut self) -> Result<()> {
        self.workspace.abort_rebase()
    }

    fn clean_up(&mut self) -> Result<()> {
        self.workspace.clean_up(self.gc)
    }
}

/// [`Rebaser`] running attempts in the manager's workspaces
///
/// Git runs on tokio's blocking pool; the engine awaits the result.
pub struct GitRebaser {
    manager: Arc<WorkspaceManager>,
}

impl GitRebaser {
    /// Create a rebaser over the given workspaces
    pub const fn new(manager: Arc<WorkspaceManager>) -> Self {
        Self { manager }
    }

    fn rebase_blocking(
        manager: &WorkspaceManager,
        repo: &RepositoryConfig,
        pr: &PullRequest,
    ) -> Result<RebaseOutcome> {
        let result = manager.with_workspace(repo, |workspace, gc| {
            run(&mut WorkspaceSteps { workspace, gc }, pr)
        });

        // A workspace that could not be cleaned is re-prepared before next use
        if let Err(Error::Workspace(_)) = &result {
            manager.evict(repo);
        }
        result
    }
}

#[async_trait]
impl Rebaser for GitRebaser {
    async fn rebase(&self, repo: &RepositoryConfig, pr: &PullRequest) -> Result<RebaseOutcome> {
        let manager = Arc::clone(&self.manager);
        let repo = repo.clone();
        let pr = pr.clone();

        tokio::task::spawn_blocking(move || Self::rebase_blocking(&manager, &repo, &pr))
            .await
            .map_err(|e| Error::Internal(format!("rebase task failed: {e}")))?
    }
}
