//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::{PlatformService, merge_message};
use crate::types::{PullRequest, RepositoryConfig, UpdateMarker};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

// Raw REST response types (fields we read only)

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Deserialize)]
struct PullHead {
    head: ShaRef,
}

#[derive(Deserialize)]
struct GitRef {
    object: ShaRef,
}

#[derive(Deserialize)]
struct Comparison {
    merge_base_commit: ShaRef,
}

#[derive(Deserialize)]
struct CombinedStatus {
    total_count: u32,
    #[serde(default)]
    statuses: Vec<CommitStatus>,
}

#[derive(Deserialize)]
struct CommitStatus {
    state: String,
}

#[derive(Deserialize)]
struct CheckRunsResponse {
    total_count: u32,
    #[serde(default)]
    check_runs: Vec<CheckRun>,
}

#[derive(Deserialize)]
struct CheckRun {
    status: String,
    conclusion: Option<String>,
}

/// What a single review says about a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewVerdict {
    /// Reviewer approved
    Approved,
    /// Reviewer requested changes
    ChangesRequested,
    /// Reviewer's earlier review was dismissed
    Dismissed,
    /// Comment-only or pending review; does not change the reviewer's verdict
    Neutral,
}

/// Decide approval from reviews in chronological order
///
/// Only each reviewer's latest non-neutral verdict counts. The pull request is
/// approved when at least one reviewer currently approves and nobody
/// currently requests changes.
pub fn reviews_approve<I, S>(reviews: I) -> bool
where
    I: IntoIterator<Item = (S, ReviewVerdict)>,
    S: Into<String>,
{
    let mut latest: HashMap<String, ReviewVerdict> = HashMap::new();
    for (reviewer, verdict) in reviews {
        if verdict != ReviewVerdict::Neutral {
            latest.insert(reviewer.into(), verdict);
        }
    }

    let any_approval = latest.values().any(|v| *v == ReviewVerdict::Approved);
    let any_block = latest
        .values()
        .any(|v| *v == ReviewVerdict::ChangesRequested);
    any_approval && !any_block
}

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: RepositoryConfig,
    /// HTTP client for raw requests (statuses, check runs, compare)
    http_client: Client,
}

impl GitHubService {
    /// Create a new GitHub service bound to one repository
    pub fn new(config: RepositoryConfig) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(config.credentials.secret.clone())
            .base_uri(&config.api_host)
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("rebazer")
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            http_client,
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.config.api_host, self.config.team, self.config.name, path
        )
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response> {
        self.http_client
            .get(url)
            .bearer_auth(&self.config.credentials.secret)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("GET {url} failed: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.send_get(url)
            .await?
            .error_for_status()
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse {url}: {e}")))
    }

    async fn pull_head(&self, pr: &PullRequest) -> Result<PullHead> {
        self.get_json(&pr.api_url).await
    }

    /// Head of the destination branch
    async fn destination_head(&self, pr: &PullRequest) -> Result<String> {
        let git_ref: GitRef = self
            .get_json(&self.repo_url(&format!("/git/ref/heads/{}", pr.destination)))
            .await?;
        Ok(git_ref.object.sha)
    }

    /// Legacy commit statuses: (entries recorded, any success)
    async fn commit_statuses(&self, sha: &str) -> Result<(bool, bool)> {
        let status: CombinedStatus = self
            .get_json(&self.repo_url(&format!("/commits/{sha}/status")))
            .await?;

        let any_success = status.statuses.iter().any(|s| s.state == "success");
        debug!(count = status.total_count, any_success, "commit status result");
        Ok((status.total_count > 0, any_success))
    }

    /// GitHub Actions check runs: (entries recorded, any success)
    async fn check_runs(&self, sha: &str) -> Result<(bool, bool)> {
        let url = self.repo_url(&format!("/commits/{sha}/check-runs"));
        let response = self.send_get(&url).await?;

        // Tokens without the checks scope get 403/404; there is nothing to read then
        if matches!(
            response.status(),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            debug!(status = %response.status(), "check runs not readable, treating as none");
            return Ok((false, false));
        }

        let runs: CheckRunsResponse = response
            .error_for_status()
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse check runs: {e}")))?;

        let any_success = runs
            .check_runs
            .iter()
            .any(|run| run.status == "completed" && run.conclusion.as_deref() == Some("success"));
        debug!(count = runs.total_count, any_success, "check runs result");
        Ok((runs.total_count > 0, any_success))
    }

    fn pr_from_octocrab(&self, pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
        PullRequest {
            number: pr.number,
            repo: self.config.name.clone(),
            source: pr.head.ref_field.clone(),
            destination: pr.base.ref_field.clone(),
            api_url: pr.url.clone(),
            updated: UpdateMarker::new(
                pr.updated_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ),
        }
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>> {
        debug!(repo = %self.config.name, "listing open PRs");
        let first_page = self
            .client
            .pulls(&self.config.team, &self.config.name)
            .list()
            .state(octocrab::params::State::Open)
            .per_page(100)
            .send()
            .await?;

        let prs = self.client.all_pages(first_page).await?;
        let result: Vec<PullRequest> = prs.iter().map(|pr| self.pr_from_octocrab(pr)).collect();
        debug!(repo = %self.config.name, count = result.len(), "listed open PRs");
        Ok(result)
    }

    async fn refresh_pull_request(&self, pr: &PullRequest) -> Result<PullRequest> {
        // Same conversion as the listing, so unchanged PRs keep equal markers
        let fresh = self
            .client
            .pulls(&self.config.team, &self.config.name)
            .get(pr.number)
            .await?;
        Ok(pr.with_marker(self.pr_from_octocrab(&fresh).updated))
    }

    async fn is_approved(&self, pr: &PullRequest) -> Result<bool> {
        let reviews = self
            .client
            .pulls(&self.config.team, &self.config.name)
            .list_reviews(pr.number)
            .send()
            .await?;
        let reviews = self.client.all_pages(reviews).await?;

        let verdicts = reviews.iter().map(|r| {
            let reviewer = r.user.as_ref().map(|u| u.login.clone()).unwrap_or_default();
            let verdict = match r.state {
                Some(octocrab::models::pulls::ReviewState::Approved) => ReviewVerdict::Approved,
                Some(octocrab::models::pulls::ReviewState::ChangesRequested) => {
                    ReviewVerdict::ChangesRequested
                }
                Some(octocrab::models::pulls::ReviewState::Dismissed) => ReviewVerdict::Dismissed,
                _ => ReviewVerdict::Neutral,
            };
            (reviewer, verdict)
        });

        let approved = reviews_approve(verdicts);
        debug!(pr_number = pr.number, approved, "checked approval");
        Ok(approved)
    }

    async fn has_diverged_from_destination(&self, pr: &PullRequest) -> Result<bool> {
        let head = self.pull_head(pr).await?.head.sha;
        let destination_head = self.destination_head(pr).await?;

        let comparison: Comparison = self
            .get_json(&self.repo_url(&format!("/compare/{destination_head}...{head}")))
            .await?;

        let diverged = comparison.merge_base_commit.sha != destination_head;
        debug!(
            pr_number = pr.number,
            merge_base = %comparison.merge_base_commit.sha,
            destination_head = %destination_head,
            diverged,
            "checked divergence"
        );
        Ok(diverged)
    }

    async fn has_green_build(&self, pr: &PullRequest) -> Result<bool> {
        let head = self.pull_head(pr).await?.head.sha;
        let (has_statuses, status_success) = self.commit_statuses(&head).await?;
        let (has_runs, run_success) = self.check_runs(&head).await?;

        // No CI configured at all is not a blocker
        if !has_statuses && !has_runs {
            debug!(pr_number = pr.number, "no build checks recorded");
            return Ok(true);
        }
        Ok(status_success || run_success)
    }

    async fn merge(&self, pr: &PullRequest) -> Result<()> {
        debug!(pr_number = pr.number, "merging PR");
        let result = self
            .client
            .pulls(&self.config.team, &self.config.name)
            .merge(pr.number)
            .method(octocrab::params::pulls::MergeMethod::Merge)
            .title(merge_message(pr))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        if !result.merged {
            return Err(Error::GitHubApi(format!(
                "Merge of PR #{} was refused: {}",
                pr.number,
                result.message.unwrap_or_default()
            )));
        }

        debug!(pr_number = pr.number, sha = ?result.sha, "merge complete");
        Ok(())
    }

    async fn comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        debug!(pr_number = pr.number, "creating PR comment");
        self.client
            .issues(&self.config.team, &self.config.name)
            .create_comment(pr.number, body)
            .await?;
        debug!(pr_number = pr.number, "created PR comment");
        Ok(())
    }

    fn config(&self) -> &RepositoryConfig {
        &self.config
    }
}
