//! A single verified clone

use super::{
    git_command, git_network_command, is_ancestor, run_command, run_git_stdout, run_git_sync,
};
use crate::error::{Error, Result};
use crate::types::{CommitIdentity, Credentials, RepositoryConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a `git rebase` invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseExit {
    /// Every commit was replayed
    Completed,
    /// Git stopped on a conflict and left a rebase in progress
    Stopped,
    /// Git failed without leaving a rebase in progress
    Failed {
        /// What git printed on stderr
        stderr: String,
    },
}

/// On-disk clone of one repository whose `origin` is the repository's remote
#[derive(Debug)]
pub struct LocalWorkspace {
    path: PathBuf,
    main_branch: String,
    credentials: Credentials,
    identity: CommitIdentity,
}

impl LocalWorkspace {
    /// Open the workspace under `root`, re-cloning when it is missing or unusable
    ///
    /// An existing directory is kept only if it opens as a git repository whose
    /// `origin` URL equals the repository's remote URL.
    pub fn prepare(
        root: &Path,
        repo: &RepositoryConfig,
        identity: &CommitIdentity,
    ) -> Result<Self> {
        let path = root.join(repo.qualifier());
        let expected = repo.remote_url();

        if path.exists() {
            match verify_origin(&path, &expected) {
                Ok(()) => {
                    debug!(repo = %repo.key(), path = %path.display(), "reusing workspace");
                    return Ok(Self::bind(path, repo, identity));
                }
                Err(e) => {
                    warn!(
                        repo = %repo.key(),
                        path = %path.display(),
                        error = %e,
                        "workspace unusable, cloning again"
                    );
                }
            }
        }

        Self::clone_fresh(root, repo, identity)
    }

    /// Delete whatever is on disk and clone the repository again
    pub fn clone_fresh(
        root: &Path,
        repo: &RepositoryConfig,
        identity: &CommitIdentity,
    ) -> Result<Self> {
        let path = root.join(repo.qualifier());
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        let parent = path
            .parent()
            .ok_or_else(|| Error::Workspace(format!("{} has no parent", path.display())))?;
        fs::create_dir_all(parent)?;

        let target = path
            .to_str()
            .ok_or_else(|| Error::Workspace(format!("{} is not valid UTF-8", path.display())))?;
        let url = repo.remote_url();

        info!(repo = %repo.key(), path = %path.display(), "cloning workspace");
        run_command(
            git_network_command(parent, &repo.credentials),
            &["clone", "--quiet", &url, target],
        )?;

        Ok(Self::bind(path, repo, identity))
    }

    fn bind(path: PathBuf, repo: &RepositoryConfig, identity: &CommitIdentity) -> Self {
        Self {
            path,
            main_branch: repo.main_branch.clone(),
            credentials: repo.credentials.clone(),
            identity: identity.clone(),
        }
    }

    /// Working directory of the clone
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Branch checked out (detached) between rebases
    pub fn main_branch(&self) -> &str {
        &self.main_branch
    }

    pub(crate) fn git(&self, args: &[&str]) -> Result<()> {
        run_git_sync(&self.path, args)?;
        Ok(())
    }

    pub(crate) fn git_stdout(&self, args: &[&str]) -> Result<String> {
        run_git_stdout(&self.path, args)
    }

    /// Fetch every remote branch, pruning deleted ones
    pub fn fetch(&self) -> Result<()> {
        run_command(
            git_network_command(&self.path, &self.credentials),
            &["fetch", "--quiet", "--prune", "origin"],
        )?;
        Ok(())
    }

    /// Create or reset local `branch` to `origin/<branch>` and check it out
    pub fn checkout_branch(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", "--quiet", "-B", branch, &format!("origin/{branch}")])
    }

    /// Whether `potential_ancestor` is reachable from `descendant`
    pub fn is_ancestor(&self, potential_ancestor: &str, descendant: &str) -> Result<bool> {
        is_ancestor(&self.path, potential_ancestor, descendant)
    }

    /// Replay the checked-out branch onto `upstream` as the bot identity
    pub fn rebase(&self, upstream: &str) -> Result<RebaseExit> {
        let output = git_command(&self.path)
            .arg("-c")
            .arg(format!("user.name={}", self.identity.name))
            .arg("-c")
            .arg(format!("user.email={}", self.identity.email))
            .args(["rebase", upstream])
            .output()?;

        if output.status.success() {
            return Ok(RebaseExit::Completed);
        }
        if self.rebase_in_progress() {
            return Ok(RebaseExit::Stopped);
        }
        Ok(RebaseExit::Failed {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Force-push local `branch` to the remote branch of the same name
    pub fn push_force(&self, branch: &str) -> Result<()> {
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        run_command(
            git_network_command(&self.path, &self.credentials),
            &["push", "--quiet", "--force", "origin", &refspec],
        )?;
        Ok(())
    }

    /// Whether a rebase is stopped in this clone
    pub fn rebase_in_progress(&self) -> bool {
        let git_dir = self.path.join(".git");
        git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
    }

    /// Abort a stopped rebase; does nothing when none is in progress
    pub fn abort_rebase(&self) -> Result<()> {
        if self.rebase_in_progress() {
            self.git(&["rebase", "--abort"])?;
        }
        Ok(())
    }

    /// Names of all local branches
    pub fn local_branches(&self) -> Result<Vec<String>> {
        let output = self.git_stdout(&["for-each-ref", "--format=%(refname:short)", "refs/heads/"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Whether the working tree has no changes, untracked or ignored files
    pub fn is_clean(&self) -> Result<bool> {
        let status = self.git_stdout(&["status", "--porcelain", "--ignored"])?;
        Ok(status.is_empty())
    }
}

/// Check that `path` opens as a repository whose `origin` is `expected`
fn verify_origin(path: &Path, expected: &str) -> Result<()> {
    let repo = gix::open(path)
        .map_err(|e| Error::Workspace(format!("cannot open {}: {e}", path.display())))?;
    let actual = repo
        .config_snapshot()
        .string("remote.origin.url")
        .map(|url| url.to_string())
        .ok_or_else(|| Error::Workspace(format!("{} has no origin remote", path.display())))?;

    if actual.trim_end_matches('/') == expected.trim_end_matches('/') {
        Ok(())
    } else {
        Err(Error::Workspace(format!(
            "origin of {} is {actual}, expected {expected}",
            path.display()
        )))
    }
}
