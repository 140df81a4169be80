//! Client for the source organisation, authenticated as an App installation.
//!
//! Every method returns the raw [`ApiResponse`]; callers decide whether a
//! status is fatal via [`ApiResponse::into_success`].

use http::Method;
use serde_json::json;

use super::error::ApiError;
use super::identity::{AppCredentials, exchange_installation_token};
use super::locator::{BearerToken, PullRequestNumber, RepositoryName, RepositoryOwner};
use super::query::Query;
use super::transport::{ApiRequest, ApiResponse, Transport};

/// Read and comment access to repositories of the source organisation.
///
/// Built in two phases: the installation token is obtained first, then the
/// client is constructed around it and never changes afterwards.
pub struct SourceClient<'client, T>
where
    T: Transport + ?Sized,
{
    transport: &'client T,
    owner: RepositoryOwner,
    token: BearerToken,
}

impl<'client, T> SourceClient<'client, T>
where
    T: Transport + ?Sized,
{
    /// Creates a client from an already issued token.
    #[must_use]
    pub const fn new(transport: &'client T, owner: RepositoryOwner, token: BearerToken) -> Self {
        Self {
            transport,
            owner,
            token,
        }
    }

    /// Authenticates as the App's first installation and returns the client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] when the token exchange fails.
    pub async fn for_app(
        transport: &'client T,
        owner: RepositoryOwner,
        credentials: &AppCredentials,
    ) -> Result<Self, ApiError> {
        let token = exchange_installation_token(transport, credentials).await?;
        Ok(Self::new(transport, owner, token))
    }

    /// Owner of the source repositories.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Transport shared with artifact downloads.
    #[must_use]
    pub const fn transport(&self) -> &'client T {
        self.transport
    }

    /// Installation token, also needed for artifact downloads.
    #[must_use]
    pub const fn token(&self) -> &BearerToken {
        &self.token
    }

    /// Lists open pull requests, most recently updated first.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn list_open_pull_requests(
        &self,
        repo: &RepositoryName,
        per_page: u8,
    ) -> Result<ApiResponse, ApiError> {
        let query = Query::new()
            .with("state", "open")
            .with("per_page", per_page)
            .with("sort", "updated")
            .with("direction", "desc");
        self.get(&query.apply_to(&self.repo_path(repo, "pulls")))
            .await
    }

    /// Fetches one pull request.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn get_pull_request(
        &self,
        repo: &RepositoryName,
        number: PullRequestNumber,
    ) -> Result<ApiResponse, ApiError> {
        self.get(&self.repo_path(repo, &format!("pulls/{number}")))
            .await
    }

    /// Lists completed workflow runs for `head_sha`.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn list_completed_workflow_runs(
        &self,
        repo: &RepositoryName,
        head_sha: &str,
    ) -> Result<ApiResponse, ApiError> {
        let query = Query::new()
            .with("status", "completed")
            .with("head_sha", head_sha);
        self.get(&query.apply_to(&self.repo_path(repo, "actions/runs")))
            .await
    }

    /// Fetches an arbitrary API path, such as a run's artifacts listing.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.transport
            .request(ApiRequest::get(path, &self.token))
            .await
    }

    /// Lists one page of issue comments, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn list_issue_comments(
        &self,
        repo: &RepositoryName,
        number: PullRequestNumber,
        per_page: u8,
        page: u64,
    ) -> Result<ApiResponse, ApiError> {
        let query = Query::new().with("per_page", per_page).with("page", page);
        let path = self.repo_path(repo, &format!("issues/{number}/comments"));
        self.get(&query.apply_to(&path)).await
    }

    /// Creates an issue comment on the pull request.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn create_issue_comment(
        &self,
        repo: &RepositoryName,
        number: PullRequestNumber,
        body: &str,
    ) -> Result<ApiResponse, ApiError> {
        let path = self.repo_path(repo, &format!("issues/{number}/comments"));
        self.send(Method::POST, path, body).await
    }

    /// Replaces the body of an existing issue comment.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn update_issue_comment(
        &self,
        repo: &RepositoryName,
        comment_id: u64,
        body: &str,
    ) -> Result<ApiResponse, ApiError> {
        let path = self.repo_path(repo, &format!("issues/comments/{comment_id}"));
        self.send(Method::PATCH, path, body).await
    }

    async fn send(&self, method: Method, path: String, body: &str) -> Result<ApiResponse, ApiError> {
        self.transport
            .request(ApiRequest::with_body(
                method,
                path,
                &self.token,
                Some(json!({ "body": body })),
            ))
            .await
    }

    fn repo_path(&self, repo: &RepositoryName, rest: &str) -> String {
        format!("/repos/{}/{}/{rest}", self.owner, repo)
    }
}

/// Reduces an absolute API URL to a path relative to `api_base`.
///
/// URLs on other hosts are returned unchanged.
#[must_use]
pub fn resource_path(url: &str, api_base: &str) -> String {
    let base = api_base.trim_end_matches('/');
    url.strip_prefix(base)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .map_or_else(|| url.to_owned(), ToOwned::to_owned)
}
