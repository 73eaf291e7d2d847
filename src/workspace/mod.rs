//! Local git workspaces
//!
//! One persistent clone per configured repository. Every mutation goes through
//! the `git` CLI with system and global configuration disabled, so behaviour
//! does not depend on the machine the daemon runs on:
//!
//! - [`LocalWorkspace`]: a verified clone bound to one repository
//! - [`WorkspaceManager`]: the registry of all workspaces, one lock each
//! - [`GcCountdown`]: process-wide counter deciding when cleanup runs `git gc`

mod cleanup;
mod local;
mod manager;

#[cfg(test)]
pub(crate) mod test_support;

pub use local::{LocalWorkspace, RebaseExit};
pub use manager::WorkspaceManager;

use crate::error::{Error, Result};
use crate::types::Credentials;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::{Mutex, PoisonError};

/// Environment variable carrying the git user to the credential helper
const USER_ENV: &str = "REBAZER_GIT_USER";

/// Environment variable carrying the git secret to the credential helper
const SECRET_ENV: &str = "REBAZER_GIT_PASS";

/// Credential helper answering from the variables above
const CREDENTIAL_HELPER: &str =
    "!f() { echo \"username=${REBAZER_GIT_USER}\"; echo \"password=${REBAZER_GIT_PASS}\"; }; f";

/// Create a git Command with clean environment (no system/user config).
pub(crate) fn git_command(workdir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);

    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    cmd
}

/// Create a git Command that can authenticate against the remote.
///
/// Any configured helper is reset and replaced by one that reads the
/// credentials from this child's environment only.
pub(crate) fn git_network_command(workdir: &Path, credentials: &Credentials) -> Command {
    let mut cmd = git_command(workdir);
    cmd.args(["-c", "credential.helper="]);
    cmd.arg("-c");
    cmd.arg(format!("credential.helper={CREDENTIAL_HELPER}"));
    cmd.env(USER_ENV, &credentials.user);
    cmd.env(SECRET_ENV, &credentials.secret);
    cmd
}

/// Run a prepared command, mapping a non-zero exit to [`Error::Git`].
///
/// `args` is only used to describe the command in the error.
pub(crate) fn run_command(mut cmd: Command, args: &[&str]) -> Result<Output> {
    let output = cmd.args(args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(Error::Git {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a git command in the given working directory.
pub fn run_git_sync(workdir: &Path, args: &[&str]) -> Result<Output> {
    run_command(git_command(workdir), args)
}

/// Run a git command and return stdout as a string.
pub fn run_git_stdout(workdir: &Path, args: &[&str]) -> Result<String> {
    let output = run_git_sync(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check if one revision is an ancestor of another.
pub fn is_ancestor(workdir: &Path, potential_ancestor: &str, descendant: &str) -> Result<bool> {
    let output = git_command(workdir)
        .args(["merge-base", "--is-ancestor", potential_ancestor, descendant])
        .output()?;

    // Exit 0 = is ancestor, exit 1 = not ancestor, other = error
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(Error::Git {
            command: format!("git merge-base --is-ancestor {potential_ancestor} {descendant}"),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Cleanups left until the next forced garbage collection
///
/// Shared by every workspace: the counter is decremented once per cleanup,
/// whichever repository is cleaned.
#[derive(Debug)]
pub struct GcCountdown {
    initial: u32,
    remaining: Mutex<u32>,
}

impl GcCountdown {
    /// Start a countdown; zero is treated as one
    pub fn new(initial: u32) -> Self {
        let initial = initial.max(1);
        Self {
            initial,
            remaining: Mutex::new(initial),
        }
    }

    /// Count one cleanup; returns true when garbage collection is due
    ///
    /// The counter resets to its initial value whenever it fires.
    pub fn tick(&self) -> bool {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            *remaining = self.initial;
            true
        } else {
            false
        }
    }

    /// Cleanups left before the next collection
    pub fn remaining(&self) -> u32 {
        *self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
