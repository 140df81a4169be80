//! Data models for the GitHub resources the mirror reads and writes.
//!
//! Only the fields the reconciliation needs are decoded; everything else in
//! the API payloads is ignored.

use serde::Deserialize;

use super::error::ApiError;
use super::locator::{CommitSha, PullRequestNumber};
use super::transport::ApiResponse;

/// Snapshot of an open pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Pull request number.
    pub number: PullRequestNumber,
    /// Head commit of the pull request branch.
    pub head_sha: CommitSha,
    /// Title of the pull request.
    pub title: String,
    /// HTML URL for displaying to a user.
    pub html_url: String,
    /// Number of issue comments; used as a pagination hint only.
    pub comments: u64,
}

/// Completed workflow run at a pull request head.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowRun {
    /// Run identifier.
    pub id: u64,
    /// Path of the workflow file, e.g. `.github/workflows/docs.yml`.
    pub path: String,
    /// Run status reported by the API.
    #[serde(default)]
    pub status: Option<String>,
    /// URL listing the run's artifacts.
    pub artifacts_url: String,
}

/// Artifact uploaded by a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artifact {
    /// Artifact identifier.
    pub id: u64,
    /// Artifact name.
    pub name: String,
    /// URL returning the zip archive.
    pub archive_download_url: String,
}

/// Pull request issue comment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueComment {
    /// Comment identifier.
    pub id: u64,
    /// Comment body.
    #[serde(default)]
    pub body: Option<String>,
}

impl IssueComment {
    /// Whether the comment body contains `marker`.
    #[must_use]
    pub fn contains(&self, marker: &str) -> bool {
        self.body.as_deref().is_some_and(|body| body.contains(marker))
    }
}

/// Repository in the target organisation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    /// Repository name.
    pub name: String,
    /// HTML URL of the repository.
    #[serde(default)]
    pub html_url: Option<String>,
}

/// GitHub App installation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Installation {
    /// Installation identifier.
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiPullRequest {
    pub(super) number: u64,
    #[serde(default)]
    pub(super) title: Option<String>,
    #[serde(default)]
    pub(super) html_url: Option<String>,
    #[serde(default)]
    pub(super) comments: Option<u64>,
    pub(super) head: ApiHead,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiHead {
    pub(super) sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiWorkflowRuns {
    #[serde(default)]
    pub(super) workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiArtifacts {
    #[serde(default)]
    pub(super) artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiInstallationToken {
    pub(super) token: String,
}

impl PullRequest {
    /// Decodes a single pull request response.
    ///
    /// # Errors
    ///
    /// Returns an error for non-2xx statuses or malformed payloads.
    pub fn from_response(response: ApiResponse) -> Result<Self, ApiError> {
        response
            .into_success::<ApiPullRequest>("get pull request")
            .map(Self::from)
    }

    /// Decodes a pull request listing.
    ///
    /// # Errors
    ///
    /// Returns an error for non-2xx statuses or malformed payloads.
    pub fn list_from(response: ApiResponse) -> Result<Vec<Self>, ApiError> {
        let pulls: Vec<ApiPullRequest> = response.into_success("list pull requests")?;
        Ok(pulls.into_iter().map(Self::from).collect())
    }
}

impl WorkflowRun {
    /// Decodes a workflow run listing.
    ///
    /// # Errors
    ///
    /// Returns an error for non-2xx statuses or malformed payloads.
    pub fn list_from(response: ApiResponse) -> Result<Vec<Self>, ApiError> {
        let runs: ApiWorkflowRuns = response.into_success("list workflow runs")?;
        Ok(runs.workflow_runs)
    }
}

impl Artifact {
    /// Decodes an artifact listing.
    ///
    /// # Errors
    ///
    /// Returns an error for non-2xx statuses or malformed payloads.
    pub fn list_from(response: ApiResponse) -> Result<Vec<Self>, ApiError> {
        let listing: ApiArtifacts = response.into_success("list artifacts")?;
        Ok(listing.artifacts)
    }
}

impl From<ApiPullRequest> for PullRequest {
    fn from(value: ApiPullRequest) -> Self {
        Self {
            number: PullRequestNumber::new(value.number),
            head_sha: CommitSha::new(value.head.sha),
            title: value.title.unwrap_or_default(),
            html_url: value.html_url.unwrap_or_default(),
            comments: value.comments.unwrap_or_default(),
        }
    }
}
