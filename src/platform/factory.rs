//! Platform service construction

use crate::error::Result;
use crate::platform::{BitbucketService, GitHubService, GitLabService, PlatformService};
use crate::types::{Platform, RepositoryConfig};
use tracing::debug;

/// Create the platform service matching a repository's hosting type
pub fn create_platform_service(config: &RepositoryConfig) -> Result<Box<dyn PlatformService>> {
    debug!(
        platform = %config.platform,
        api_host = %config.api_host,
        repo = %config.name,
        "creating platform service"
    );

    let service: Box<dyn PlatformService> = match config.platform {
        Platform::GitHub => Box::new(GitHubService::new(config.clone())?),
        Platform::GitLab => Box::new(GitLabService::new(config.clone())?),
        Platform::Bitbucket => Box::new(BitbucketService::new(config.clone())?),
    };
    Ok(service)
}
