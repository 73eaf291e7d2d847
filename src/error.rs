//! Error types for rebazer

use thiserror::Error;

/// Errors raised by the daemon, its hosting adapters and its git workspaces
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is missing, unreadable or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// GitHub API failure
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API failure
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Bitbucket API failure
    #[error("Bitbucket API error: {0}")]
    BitbucketApi(String),

    /// A git command exited unsuccessfully
    #[error("git command failed: {command}\nstderr: {stderr}")]
    Git {
        /// The command line that failed (credentials are never part of it)
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// A local workspace could not be prepared or is unusable
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Invariant violation inside the daemon
    #[error("internal error: {0}")]
    Internal(String),

    /// Filesystem or process spawning failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure of a raw HTTP call
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure reported by octocrab
    #[error("GitHub error: {0}")]
    Octocrab(#[from] octocrab::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
