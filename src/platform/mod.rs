//! Hosting services for GitHub, GitLab and Bitbucket
//!
//! Provides a unified interface for the pull-request operations the decision
//! engine needs, whatever the hosting provider.

mod bitbucket;
mod factory;
mod github;
mod gitlab;

pub use bitbucket::BitbucketService;
pub use factory::create_platform_service;
pub use github::{GitHubService, ReviewVerdict, reviews_approve};
pub use gitlab::GitLabService;

use crate::error::Result;
use crate::types::{PullRequest, RepositoryConfig};
use async_trait::async_trait;

/// Body of the comment posted when a rebase stops on a conflict
pub const CONFLICT_COMMENT: &str = "This pull request needs some manual love ...";

/// Commit title used for merges performed by the daemon
pub fn merge_message(pr: &PullRequest) -> String {
    format!(
        "Merged in {} (pull request #{}) by rebazer",
        pr.source, pr.number
    )
}

/// Platform service trait for pull-request operations
///
/// One implementation per hosting type, selected per repository when the
/// configuration is loaded. The decision engine only ever sees this trait.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// List open pull requests in the order the host returns them
    ///
    /// Returns an empty list when there are none.
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>>;

    /// Re-fetch the update marker of a pull request
    async fn refresh_pull_request(&self, pr: &PullRequest) -> Result<PullRequest>;

    /// Whether at least one qualifying approval exists and is still current
    async fn is_approved(&self, pr: &PullRequest) -> Result<bool>;

    /// Whether the destination head is not the merge base of source and destination
    async fn has_diverged_from_destination(&self, pr: &PullRequest) -> Result<bool>;

    /// Whether a successful build exists for the head commit
    ///
    /// A repository without any recorded build checks counts as green.
    async fn has_green_build(&self, pr: &PullRequest) -> Result<bool>;

    /// Merge the pull request on the hosting side
    async fn merge(&self, pr: &PullRequest) -> Result<()>;

    /// Post a visible comment on the pull request
    async fn comment(&self, pr: &PullRequest, body: &str) -> Result<()>;

    /// The repository this service is bound to
    fn config(&self) -> &RepositoryConfig;
}
