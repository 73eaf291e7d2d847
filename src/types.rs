//! Core types for rebazer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Hosting service type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
    /// Bitbucket Cloud
    Bitbucket,
}

impl Platform {
    /// Default base URL for git remotes (always ends with `/`)
    pub const fn default_git_host(self) -> &'static str {
        match self {
            Self::GitHub => "https://github.com/",
            Self::GitLab => "https://gitlab.com/",
            Self::Bitbucket => "https://bitbucket.org/",
        }
    }

    /// Default base URL of the REST API
    pub const fn default_api_host(self) -> &'static str {
        match self {
            Self::GitHub => "https://api.github.com",
            Self::GitLab => "https://gitlab.com/api/v4",
            Self::Bitbucket => "https://api.bitbucket.org/2.0",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
            Self::GitLab => write!(f, "GitLab"),
            Self::Bitbucket => write!(f, "Bitbucket"),
        }
    }
}

/// User and secret used for both the hosting API and git transport
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name
    pub user: String,
    /// Password, app password or token
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Identity used for commits created while rebasing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// Committer name (git `user.name`)
    pub name: String,
    /// Committer email (git `user.email`)
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "rebazer".to_string(),
            email: "rebazer@localhost".to_string(),
        }
    }
}

/// Stable identity of a configured repository
///
/// Formed from the git host, team and repository name, so two teams with a
/// repository of the same name never share cache entries or workspaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoKey(String);

impl RepoKey {
    /// Borrow the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One configured repository, flattened from the host/team/repo tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Hosting service type
    pub platform: Platform,
    /// REST API base URL (no trailing slash)
    pub api_host: String,
    /// Git host base URL (with trailing slash)
    pub git_host: String,
    /// Team, workspace, group or owner
    pub team: String,
    /// Repository name (slug)
    pub name: String,
    /// Credentials for API and git transport
    pub credentials: Credentials,
    /// Branch the workspace returns to after every rebase
    pub main_branch: String,
}

impl RepositoryConfig {
    /// URL the workspace's `origin` remote must point at
    pub fn remote_url(&self) -> String {
        format!("{}{}/{}.git", self.git_host, self.team, self.name)
    }

    /// Relative on-disk location of this repository's workspace
    pub fn qualifier(&self) -> PathBuf {
        PathBuf::from(self.host_component())
            .join(&self.team)
            .join(&self.name)
    }

    /// Identity used to key workspaces and cache entries
    pub fn key(&self) -> RepoKey {
        RepoKey(format!("{}/{}/{}", self.host_component(), self.team, self.name))
    }

    fn host_component(&self) -> String {
        match url::Url::parse(&self.git_host) {
            Ok(url) => match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{host}_{port}"),
                (Some(host), None) => host.to_string(),
                (None, _) => "local".to_string(),
            },
            Err(_) => "local".to_string(),
        }
    }
}

/// Opaque "last updated" marker of a pull request
///
/// Host-defined; only ever compared for equality, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateMarker(String);

impl UpdateMarker {
    /// Wrap a host-provided marker
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    /// Borrow the raw marker
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpdateMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pull request / merge request as seen by one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// Owning repository name
    pub repo: String,
    /// Source (head) branch
    pub source: String,
    /// Destination (base) branch
    pub destination: String,
    /// Canonical API locator of this pull request
    pub api_url: String,
    /// Last-updated marker at the time of the poll
    pub updated: UpdateMarker,
}

impl PullRequest {
    /// Same pull request carrying a newer update marker
    #[must_use]
    pub fn with_marker(&self, updated: UpdateMarker) -> Self {
        Self {
            updated,
            ..self.clone()
        }
    }
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PR #{} ({} -> {}) in {}",
            self.number, self.source, self.destination, self.repo
        )
    }
}
