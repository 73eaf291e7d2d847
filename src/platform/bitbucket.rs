//! Bitbucket Cloud platform service implementation

use crate::error::{Error, Result};
use crate::platform::{PlatformService, merge_message};
use crate::types::{PullRequest, RepositoryConfig, UpdateMarker};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Bitbucket Cloud service using reqwest with basic auth
pub struct BitbucketService {
    client: Client,
    config: RepositoryConfig,
}

/// One page of a paginated collection
#[derive(Deserialize)]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct BbPullRequest {
    id: u64,
    source: Endpoint,
    destination: Endpoint,
    updated_on: String,
}

#[derive(Deserialize)]
struct Endpoint {
    branch: BranchName,
}

#[derive(Deserialize)]
struct BranchName {
    name: String,
}

#[derive(Deserialize)]
struct PullRequestState {
    updated_on: String,
    #[serde(default)]
    participants: Vec<Participant>,
}

#[derive(Deserialize)]
struct Participant {
    #[serde(default)]
    approved: bool,
}

#[derive(Deserialize)]
struct BuildStatus {
    state: String, // "SUCCESSFUL", "FAILED", "INPROGRESS", "STOPPED"
}

#[derive(Deserialize)]
struct BranchRef {
    target: Commit,
}

#[derive(Deserialize)]
struct Commit {
    hash: String,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl BitbucketService {
    /// Create a new Bitbucket service bound to one repository
    pub fn new(config: RepositoryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::BitbucketApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repositories/{}/{}{}",
            self.config.api_host, self.config.team, self.config.name, path
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(
            &self.config.credentials.user,
            Some(&self.config.credentials.secret),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.authorized(self.client.get(url))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::BitbucketApi(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::BitbucketApi(format!("failed to parse {url}: {e}")))
    }

    /// Collect every page of a collection, following `next` links
    async fn get_all_pages<T: DeserializeOwned>(&self, first: String) -> Result<Vec<T>> {
        let mut url = Some(first);
        let mut values = Vec::new();

        while let Some(page_url) = url {
            let page: Paged<T> = self.get_json(&page_url).await?;
            values.extend(page.values);
            url = page.next;
        }
        Ok(values)
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<()> {
        self.authorized(self.client.post(url))
            .json(body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::BitbucketApi(e.to_string()))?;
        Ok(())
    }

    fn pr_from_bitbucket(&self, pr: BbPullRequest) -> PullRequest {
        PullRequest {
            number: pr.id,
            repo: self.config.name.clone(),
            source: pr.source.branch.name,
            destination: pr.destination.branch.name,
            api_url: self.repo_url(&format!("/pullrequests/{}", pr.id)),
            updated: UpdateMarker::new(pr.updated_on),
        }
    }
}

#[async_trait]
impl PlatformService for BitbucketService {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>> {
        debug!(repo = %self.config.name, "listing open PRs");
        let prs: Vec<BbPullRequest> = self
            .get_all_pages(self.repo_url("/pullrequests?state=OPEN&pagelen=50"))
            .await?;
        let result: Vec<PullRequest> = prs
            .into_iter()
            .map(|pr| self.pr_from_bitbucket(pr))
            .collect();

        debug!(repo = %self.config.name, count = result.len(), "listed open PRs");
        Ok(result)
    }

    async fn refresh_pull_request(&self, pr: &PullRequest) -> Result<PullRequest> {
        let state: PullRequestState = self.get_json(&pr.api_url).await?;
        Ok(pr.with_marker(UpdateMarker::new(state.updated_on)))
    }

    async fn is_approved(&self, pr: &PullRequest) -> Result<bool> {
        let state: PullRequestState = self.get_json(&pr.api_url).await?;
        let approved = state.participants.iter().any(|p| p.approved);
        debug!(pr_number = pr.number, approved, "checked approval");
        Ok(approved)
    }

    async fn has_diverged_from_destination(&self, pr: &PullRequest) -> Result<bool> {
        let branch: BranchRef = self
            .get_json(&self.repo_url(&format!(
                "/refs/branches/{}",
                urlencoding::encode(&pr.destination)
            )))
            .await?;

        let merge_base: Commit = self
            .get_json(&self.repo_url(&format!(
                "/merge-base/{}..{}",
                urlencoding::encode(&pr.destination),
                urlencoding::encode(&pr.source)
            )))
            .await?;

        let diverged = merge_base.hash != branch.target.hash;
        debug!(
            pr_number = pr.number,
            merge_base = %merge_base.hash,
            destination_head = %branch.target.hash,
            diverged,
            "checked divergence"
        );
        Ok(diverged)
    }

    async fn has_green_build(&self, pr: &PullRequest) -> Result<bool> {
        let statuses: Vec<BuildStatus> = self
            .get_all_pages(format!("{}/statuses?pagelen=100", pr.api_url))
            .await?;

        if statuses.is_empty() {
            debug!(pr_number = pr.number, "no build statuses recorded");
            return Ok(true);
        }

        let green = statuses.iter().any(|s| s.state == "SUCCESSFUL");
        debug!(pr_number = pr.number, green, "checked build statuses");
        Ok(green)
    }

    async fn merge(&self, pr: &PullRequest) -> Result<()> {
        debug!(pr_number = pr.number, "merging PR");
        self.post_json(
            &format!("{}/merge", pr.api_url),
            &serde_json::json!({
                "close_source_branch": true,
                "message": merge_message(pr),
                "merge_strategy": "merge_commit",
            }),
        )
        .await
        .map_err(|e| Error::BitbucketApi(format!("Merge failed: {e}")))?;
        debug!(pr_number = pr.number, "merge complete");
        Ok(())
    }

    async fn comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        debug!(pr_number = pr.number, "creating PR comment");
        self.post_json(
            &format!("{}/comments", pr.api_url),
            &serde_json::json!({ "content": { "raw": body } }),
        )
        .await?;
        debug!(pr_number = pr.number, "created PR comment");
        Ok(())
    }

    fn config(&self) -> &RepositoryConfig {
        &self.config
    }
}
