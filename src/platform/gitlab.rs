//! GitLab platform service implementation

use crate::error::{Error, Result};
use crate::platform::{PlatformService, merge_message};
use crate::types::{PullRequest, RepositoryConfig, UpdateMarker};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    config: RepositoryConfig,
    project_path: String,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    source_branch: String,
    target_branch: String,
    updated_at: String,
    #[serde(default)]
    sha: Option<String>,
}

/// MR approvals response
#[derive(Deserialize)]
struct MrApprovals {
    approved: bool,
}

/// Pipeline status
#[derive(Deserialize)]
struct Pipeline {
    sha: String,
    status: String, // "success", "failed", "running", "pending"
}

#[derive(Deserialize)]
struct Branch {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    id: String,
}

#[derive(Deserialize)]
struct MergeBase {
    id: String,
}

/// Merge response
#[derive(Deserialize)]
struct MergeResponse {
    state: String,
    merge_commit_sha: Option<String>,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Merge requests fetched per page when listing
const PAGE_SIZE: u32 = 100;

impl GitLabService {
    /// Create a new GitLab service bound to one repository
    pub fn new(config: RepositoryConfig) -> Result<Self> {
        let project_path = format!("{}/{}", config.team, config.name);

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::GitLabApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            project_path,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}{}",
            self.config.api_host,
            urlencoding::encode(&self.project_path),
            path
        )
    }

    fn mr_url(&self, iid: u64) -> String {
        self.api_url(&format!("/merge_requests/{iid}"))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("PRIVATE-TOKEN", &self.config.credentials.secret)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.authorized(self.client.get(url))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::GitLabApi(format!("failed to parse {url}: {e}")))
    }

    fn pr_from_mr(&self, mr: MergeRequest) -> PullRequest {
        PullRequest {
            number: mr.iid,
            repo: self.config.name.clone(),
            source: mr.source_branch,
            destination: mr.target_branch,
            api_url: self.mr_url(mr.iid),
            updated: UpdateMarker::new(mr.updated_at),
        }
    }

    async fn fetch_mr(&self, pr: &PullRequest) -> Result<MergeRequest> {
        self.get_json(&pr.api_url).await
    }

    async fn head_sha(&self, pr: &PullRequest) -> Result<String> {
        self.fetch_mr(pr).await?.sha.ok_or_else(|| {
            Error::GitLabApi(format!("merge request !{} has no head commit", pr.number))
        })
    }
}

#[async_trait]
impl PlatformService for GitLabService {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>> {
        debug!(repo = %self.config.name, "listing open MRs");
        let url = self.api_url("/merge_requests");
        let mut result = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .authorized(self.client.get(&url))
                .query(&[
                    ("state", "opened".to_string()),
                    ("order_by", "created_at".to_string()),
                    ("sort", "asc".to_string()),
                    ("per_page", PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?
                .error_for_status()
                .map_err(|e| Error::GitLabApi(e.to_string()))?;

            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u32>().ok());

            let mrs: Vec<MergeRequest> = response.json().await?;
            result.extend(mrs.into_iter().map(|mr| self.pr_from_mr(mr)));

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        debug!(repo = %self.config.name, count = result.len(), "listed open MRs");
        Ok(result)
    }

    async fn refresh_pull_request(&self, pr: &PullRequest) -> Result<PullRequest> {
        let mr = self.fetch_mr(pr).await?;
        Ok(pr.with_marker(self.pr_from_mr(mr).updated))
    }

    async fn is_approved(&self, pr: &PullRequest) -> Result<bool> {
        let approvals: MrApprovals = self
            .get_json(&format!("{}/approvals", pr.api_url))
            .await?;
        debug!(mr_iid = pr.number, approved = approvals.approved, "checked approval");
        Ok(approvals.approved)
    }

    async fn has_diverged_from_destination(&self, pr: &PullRequest) -> Result<bool> {
        let head = self.head_sha(pr).await?;
        let branch: Branch = self
            .get_json(&self.api_url(&format!(
                "/repository/branches/{}",
                urlencoding::encode(&pr.destination)
            )))
            .await?;
        let destination_head = branch.commit.id;

        let merge_base: MergeBase = self
            .authorized(self.client.get(self.api_url("/repository/merge_base")))
            .query(&[("refs[]", destination_head.as_str()), ("refs[]", head.as_str())])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?
            .json()
            .await?;

        let diverged = merge_base.id != destination_head;
        debug!(
            mr_iid = pr.number,
            merge_base = %merge_base.id,
            destination_head = %destination_head,
            diverged,
            "checked divergence"
        );
        Ok(diverged)
    }

    async fn has_green_build(&self, pr: &PullRequest) -> Result<bool> {
        let pipelines: Vec<Pipeline> = self
            .get_json(&format!("{}/pipelines", pr.api_url))
            .await?;

        // No pipeline = not blocking
        if pipelines.is_empty() {
            debug!(mr_iid = pr.number, "no pipelines recorded");
            return Ok(true);
        }

        let head = self.head_sha(pr).await?;
        let green = pipelines
            .iter()
            .any(|p| p.sha == head && p.status == "success");
        debug!(mr_iid = pr.number, count = pipelines.len(), green, "checked pipelines");
        Ok(green)
    }

    async fn merge(&self, pr: &PullRequest) -> Result<()> {
        debug!(mr_iid = pr.number, "merging MR");
        let response: MergeResponse = self
            .authorized(self.client.put(format!("{}/merge", pr.api_url)))
            .json(&serde_json::json!({
                "merge_commit_message": merge_message(pr),
                "should_remove_source_branch": true,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(format!("Merge failed: {e}")))?
            .json()
            .await?;

        if response.state != "merged" {
            return Err(Error::GitLabApi(format!(
                "merge request !{} is {} after merge",
                pr.number, response.state
            )));
        }

        debug!(mr_iid = pr.number, sha = ?response.merge_commit_sha, "merge complete");
        Ok(())
    }

    async fn comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        debug!(mr_iid = pr.number, "creating MR comment");
        self.authorized(self.client.post(format!("{}/notes", pr.api_url)))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?;

        debug!(mr_iid = pr.number, "created MR comment");
        Ok(())
    }

    fn config(&self) -> &RepositoryConfig {
        &self.config
    }
}
