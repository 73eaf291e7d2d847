//! Daemon configuration
//!
//! The file describes a host → team → repository tree plus a handful of
//! process-wide options. [`Config::repositories`] flattens the tree into one
//! [`RepositoryConfig`] per repository, in file order.

mod file;

pub use file::{default_config_path, load_config, parse_config};

use crate::error::{Error, Result};
use crate::types::{CommitIdentity, Credentials, Platform, RepositoryConfig};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default seconds between the end of one pass and the start of the next
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default number of cleanups between two forced `git gc` runs
pub const DEFAULT_GC_COUNTDOWN: u32 = 20;

/// Default pattern for shared integration branches that are never touched
pub const DEFAULT_BRANCH_BLACKLIST: &str = "^(main|master|develop|release|hotfix).*";

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds between passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Root directory of all local clones
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Cleanups between forced garbage collections
    #[serde(default = "default_gc_countdown")]
    pub garbage_collection_countdown: u32,
    /// Skip pull requests whose update marker did not change since last pass
    #[serde(default)]
    pub change_detection: bool,
    /// Source branches matching this regex are ignored
    #[serde(default = "default_branch_blacklist")]
    pub branch_blacklist: String,
    /// Commit identity for rebased commits
    #[serde(default)]
    pub bot: BotConfig,
    /// Hosting services and their teams
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

/// Commit identity section
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Committer name
    #[serde(default = "default_bot_name")]
    pub name: String,
    /// Committer email
    #[serde(default = "default_bot_email")]
    pub email: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            email: default_bot_email(),
        }
    }
}

/// One hosting service
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Hosting type
    #[serde(rename = "type")]
    pub platform: Platform,
    /// Base URL for git remotes; defaults per type
    pub git_host: Option<String>,
    /// Base URL of the REST API; defaults per type
    pub api_host: Option<String>,
    /// Teams on this host
    #[serde(default)]
    pub teams: Vec<TeamConfig>,
}

/// One team / workspace / group
#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
    /// Team name as it appears in URLs
    pub name: String,
    /// Login; defaults to the team name
    pub user: Option<String>,
    /// Secret given inline
    pub pass: Option<String>,
    /// Name of an environment variable holding the secret
    pub pass_env: Option<String>,
    /// Repositories of this team
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

/// One repository entry
#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
    /// Repository slug
    pub name: String,
    /// Branch the workspace returns to between rebases
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
    /// Deprecated alias of `main_branch`; wins when present
    pub master_branch: Option<String>,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_workspace() -> PathBuf {
    PathBuf::from("rebazer-workspace")
}

const fn default_gc_countdown() -> u32 {
    DEFAULT_GC_COUNTDOWN
}

fn default_branch_blacklist() -> String {
    DEFAULT_BRANCH_BLACKLIST.to_string()
}

fn default_bot_name() -> String {
    CommitIdentity::default().name
}

fn default_bot_email() -> String {
    CommitIdentity::default().email
}

fn default_main_branch() -> String {
    "main".to_string()
}

impl Config {
    /// Check process-wide options
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval == 0 {
            return Err(Error::Config("poll_interval must be at least 1 second".to_string()));
        }
        if self.garbage_collection_countdown == 0 {
            return Err(Error::Config(
                "garbage_collection_countdown must be at least 1".to_string(),
            ));
        }
        self.branch_blacklist_regex()?;
        Ok(())
    }

    /// Interval between passes
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Compiled blacklist pattern
    pub fn branch_blacklist_regex(&self) -> Result<Regex> {
        Regex::new(&self.branch_blacklist).map_err(|e| {
            Error::Config(format!(
                "invalid branch_blacklist '{}': {e}",
                self.branch_blacklist
            ))
        })
    }

    /// Commit identity for the workspaces
    pub fn commit_identity(&self) -> CommitIdentity {
        CommitIdentity {
            name: self.bot.name.clone(),
            email: self.bot.email.clone(),
        }
    }

    /// Flatten the host tree, reading `pass_env` secrets from the process environment
    pub fn repositories(&self) -> Result<Vec<RepositoryConfig>> {
        self.repositories_with_env(|name| std::env::var(name).ok())
    }

    /// Flatten the host tree with an explicit environment lookup
    ///
    /// Fails when nothing is configured: the daemon refuses to run idle.
    pub fn repositories_with_env<F>(&self, env: F) -> Result<Vec<RepositoryConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut repos = Vec::new();

        for host in &self.hosts {
            let git_host = with_trailing_slash(
                host.git_host
                    .as_deref()
                    .unwrap_or_else(|| host.platform.default_git_host()),
            );
            let api_host = host
                .api_host
                .as_deref()
                .unwrap_or_else(|| host.platform.default_api_host())
                .trim_end_matches('/')
                .to_string();

            for team in &host.teams {
                let credentials = Credentials {
                    user: team
                        .user
                        .as_deref()
                        .filter(|u| !u.is_empty())
                        .unwrap_or(&team.name)
                        .to_string(),
                    secret: resolve_secret(team, &env)?,
                };

                for repo in &team.repos {
                    repos.push(RepositoryConfig {
                        platform: host.platform,
                        api_host: api_host.clone(),
                        git_host: git_host.clone(),
                        team: team.name.clone(),
                        name: repo.name.clone(),
                        credentials: credentials.clone(),
                        main_branch: repo
                            .master_branch
                            .clone()
                            .unwrap_or_else(|| repo.main_branch.clone()),
                    });
                }
            }
        }

        if repos.is_empty() {
            return Err(Error::Config(
                "No repositories defined, please verify that the configuration file is placed \
                 at the correct location and is readable"
                    .to_string(),
            ));
        }

        Ok(repos)
    }
}

fn resolve_secret<F>(team: &TeamConfig, env: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(pass) = &team.pass {
        return Ok(pass.clone());
    }
    if let Some(var) = &team.pass_env {
        return env(var).ok_or_else(|| {
            Error::Config(format!(
                "team '{}': environment variable {var} is not set",
                team.name
            ))
        });
    }
    Err(Error::Config(format!(
        "team '{}': either pass or pass_env is required",
        team.name
    )))
}

fn with_trailing_slash(host: &str) -> String {
    if host.ends_with('/') {
        host.to_string()
    } else {
        format!("{host}/")
    }
}
