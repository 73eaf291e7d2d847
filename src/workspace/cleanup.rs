//! Returning a workspace to its resting state
//!
//! Runs after every rebase attempt and when a workspace is prepared. Each step
//! is idempotent, so running it on an already clean clone changes nothing:
//!
//! 1. Abort a rebase left in progress (e.g. by a crashed process)
//! 2. Remove untracked and ignored files
//! 3. Hard-reset the index and working tree
//! 4. Detach HEAD at `origin/<main branch>`
//! 5. Delete every local branch
//! 6. Count down towards the next garbage collection

use super::{GcCountdown, LocalWorkspace};
use crate::error::Result;
use tracing::{debug, info};

impl LocalWorkspace {
    /// Bring the clone back to a detached, branch-free, clean state
    pub fn clean_up(&self, gc: &GcCountdown) -> Result<()> {
        if self.rebase_in_progress() {
            info!(path = %self.path().display(), "aborting rebase left in progress");
        }
        self.abort_rebase()?;

        // -ff also removes nested repositories, -x ignored files
        self.git(&["clean", "-ffdx", "--quiet"])?;
        self.git(&["reset", "--quiet", "--hard"])?;
        self.git(&[
            "checkout",
            "--quiet",
            "--detach",
            &format!("origin/{}", self.main_branch()),
        ])?;

        let branches = self.local_branches()?;
        if !branches.is_empty() {
            let mut args = vec!["branch", "--quiet", "-D"];
            args.extend(branches.iter().map(String::as_str));
            self.git(&args)?;
        }

        if gc.tick() {
            info!(path = %self.path().display(), "running garbage collection");
            self.git(&["reflog", "expire", "--expire=now", "--all"])?;
            self.git(&["gc", "--quiet", "--prune=now"])?;
        }

        debug!(path = %self.path().display(), deleted = branches.len(), "workspace cleaned");
        Ok(())
    }
}
