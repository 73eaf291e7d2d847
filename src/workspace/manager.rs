//! Registry of local workspaces

use super::{GcCountdown, LocalWorkspace};
use crate::error::{Error, Result};
use crate::types::{CommitIdentity, RepoKey, RepositoryConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// A workspace slot; `None` until prepared, and again after eviction
type Slot = Arc<Mutex<Option<LocalWorkspace>>>;

/// Owns one workspace per repository and the shared GC countdown
///
/// Each workspace sits behind its own lock, so at most one operation touches
/// a clone at a time while different repositories stay independent.
#[derive(Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
    identity: CommitIdentity,
    gc: GcCountdown,
    slots: Mutex<HashMap<RepoKey, Slot>>,
}

impl WorkspaceManager {
    /// Create a manager rooted at `root`; nothing is cloned yet
    pub fn new(root: impl Into<PathBuf>, identity: CommitIdentity, gc_countdown: u32) -> Self {
        Self {
            root: root.into(),
            identity,
            gc: GcCountdown::new(gc_countdown),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of all clones
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared garbage-collection countdown
    pub const fn gc_countdown(&self) -> &GcCountdown {
        &self.gc
    }

    fn slot(&self, key: &RepoKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Prepare every repository's workspace, logging failures
    ///
    /// A repository whose workspace cannot be prepared is retried on its next
    /// rebase. Returns how many workspaces are ready.
    pub fn prepare_all(&self, repos: &[RepositoryConfig]) -> usize {
        let mut ready = 0;
        for repo in repos {
            match self.prepare(repo) {
                Ok(()) => ready += 1,
                Err(e) => warn!(repo = %repo.key(), error = %e, "failed to prepare workspace"),
            }
        }
        info!(ready, total = repos.len(), "workspaces prepared");
        ready
    }

    /// Clone or reopen a workspace and clean it
    pub fn prepare(&self, repo: &RepositoryConfig) -> Result<()> {
        let slot = self.slot(&repo.key());
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        *guard = Some(self.open_clean(repo)?);
        Ok(())
    }

    /// Open (or clone) and clean; a clone that cannot be cleaned is cloned again once
    fn open_clean(&self, repo: &RepositoryConfig) -> Result<LocalWorkspace> {
        let workspace = LocalWorkspace::prepare(&self.root, repo, &self.identity)?;
        match workspace.clean_up(&self.gc) {
            Ok(()) => Ok(workspace),
            Err(e) => {
                warn!(repo = %repo.key(), error = %e, "cleanup failed, cloning again");
                let workspace = LocalWorkspace::clone_fresh(&self.root, repo, &self.identity)?;
                workspace.clean_up(&self.gc)?;
                Ok(workspace)
            }
        }
    }

    /// Run `f` with exclusive access to the repository's workspace
    ///
    /// Prepares the workspace first if it is not ready.
    pub fn with_workspace<T, F>(&self, repo: &RepositoryConfig, f: F) -> Result<T>
    where
        F: FnOnce(&LocalWorkspace, &GcCountdown) -> Result<T>,
    {
        let slot = self.slot(&repo.key());
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_none() {
            info!(repo = %repo.key(), "preparing workspace on demand");
            *guard = Some(self.open_clean(repo)?);
        }

        match guard.as_ref() {
            Some(workspace) => f(workspace, &self.gc),
            None => Err(Error::Internal(format!(
                "workspace for {} vanished while locked",
                repo.key()
            ))),
        }
    }

    /// Forget a workspace so it is prepared again before its next use
    pub fn evict(&self, repo: &RepositoryConfig) {
        let slot = self.slot(&repo.key());
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            warn!(repo = %repo.key(), "workspace evicted");
        }
    }

    /// Whether the repository's workspace is prepared
    pub fn is_ready(&self, repo: &RepositoryConfig) -> bool {
        let slot = self.slot(&repo.key());
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::test_support::TestRemote;

    fn manager(remote: &TestRemote) -> WorkspaceManager {
        WorkspaceManager::new(remote.workspace_root(), remote.identity(), 20)
    }

    #[test]
    fn prepare_all_counts_ready_workspaces() {
        let remote = TestRemote::new();
        let mut missing = remote.repo.clone();
        missing.name = "missing".to_string();

        let manager = manager(&remote);
        let ready = manager.prepare_all(&[remote.repo.clone(), missing.clone()]);

        assert_eq!(ready, 1);
        assert!(manager.is_ready(&remote.repo));
        assert!(!manager.is_ready(&missing));
    }

    #[test]
    fn with_workspace_prepares_lazily() {
        let remote = TestRemote::new();
        let manager = manager(&remote);
        assert!(!manager.is_ready(&remote.repo));

        let branches = manager
            .with_workspace(&remote.repo, |ws, _| ws.local_branches())
            .unwrap();

        assert!(branches.is_empty());
        assert!(manager.is_ready(&remote.repo));
    }

    #[test]
    fn evicted_workspace_is_prepared_again() {
        let remote = TestRemote::new();
        let manager = manager(&remote);
        manager.prepare(&remote.repo).unwrap();

        manager
            .with_workspace(&remote.repo, |ws, _| {
                ws.git(&["checkout", "--quiet", "-b", "leftover"])
            })
            .unwrap();
        manager.evict(&remote.repo);
        assert!(!manager.is_ready(&remote.repo));

        let branches = manager
            .with_workspace(&remote.repo, |ws, _| ws.local_branches())
            .unwrap();
        assert!(branches.is_empty());
    }

    #[test]
    fn prepare_failure_leaves_slot_empty() {
        let remote = TestRemote::new();
        let mut broken = remote.repo.clone();
        broken.main_branch = "no-such-branch".to_string();

        let manager = manager(&remote);
        assert!(manager.prepare(&broken).is_err());
        assert!(!manager.is_ready(&broken));
    }
}
