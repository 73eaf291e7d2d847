//! Shared test helpers

#![allow(dead_code)]

mod git_remote;
mod mock_platform;

pub use git_remote::TempRemote;
pub use mock_platform::{CommentCall, MockPlatformService, MockRebaser};

use rebazer::config::DEFAULT_BRANCH_BLACKLIST;
use rebazer::engine::EngineSettings;
use rebazer::types::{Credentials, Platform, PullRequest, RepositoryConfig, UpdateMarker};
use regex::Regex;

/// Bitbucket repository `acme/<name>` with throwaway credentials
pub fn repo_config(name: &str) -> RepositoryConfig {
    RepositoryConfig {
        platform: Platform::Bitbucket,
        api_host: "https://api.bitbucket.org/2.0".to_string(),
        git_host: "https://bitbucket.org/".to_string(),
        team: "acme".to_string(),
        name: name.to_string(),
        credentials: Credentials {
            user: "bot".to_string(),
            secret: "secret".to_string(),
        },
        main_branch: "main".to_string(),
    }
}

/// Pull request from `source` into `main` of repository `widgets`
pub fn make_pr(number: u64, source: &str, marker: &str) -> PullRequest {
    PullRequest {
        number,
        repo: "widgets".to_string(),
        source: source.to_string(),
        destination: "main".to_string(),
        api_url: format!(
            "https://api.bitbucket.org/2.0/repositories/acme/widgets/pullrequests/{number}"
        ),
        updated: UpdateMarker::new(marker),
    }
}

/// Default blacklist, change detection as given
pub fn settings(change_detection: bool) -> EngineSettings {
    EngineSettings {
        branch_blacklist: Regex::new(DEFAULT_BRANCH_BLACKLIST).unwrap(),
        change_detection,
    }
}
