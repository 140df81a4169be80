//! Client for the target organisation that hosts preview repositories.

use http::{Method, StatusCode};
use serde_json::json;

use super::error::ApiError;
use super::locator::{BearerToken, RepositoryName, RepositoryOwner};
use super::transport::{ApiRequest, ApiResponse, Transport};

/// Repository administration in the target organisation using a static token.
pub struct TargetClient<'client, T>
where
    T: Transport + ?Sized,
{
    transport: &'client T,
    owner: RepositoryOwner,
    token: BearerToken,
}

impl<'client, T> TargetClient<'client, T>
where
    T: Transport + ?Sized,
{
    /// Creates a client for `owner` authenticated with `token`.
    #[must_use]
    pub const fn new(transport: &'client T, owner: RepositoryOwner, token: BearerToken) -> Self {
        Self {
            transport,
            owner,
            token,
        }
    }

    /// Organisation that owns the preview repositories.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Static token, also used for git pushes.
    #[must_use]
    pub const fn token(&self) -> &BearerToken {
        &self.token
    }

    /// Fetches a repository; a 404 status means it does not exist.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn get_repo(&self, name: &RepositoryName) -> Result<ApiResponse, ApiError> {
        self.transport
            .request(ApiRequest::get(self.repo_path(name), &self.token))
            .await
    }

    /// Creates a public repository with issues, projects and wiki disabled.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn create_repo(
        &self,
        name: &RepositoryName,
        description: &str,
    ) -> Result<ApiResponse, ApiError> {
        let body = json!({
            "name": name.as_str(),
            "description": description,
            "private": false,
            "visibility": "public",
            "has_issues": false,
            "has_projects": false,
            "has_wiki": false,
        });
        self.transport
            .request(ApiRequest::with_body(
                Method::POST,
                format!("/orgs/{}/repos", self.owner),
                &self.token,
                Some(body),
            ))
            .await
    }

    /// Deletes a repository.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn delete_repo(&self, name: &RepositoryName) -> Result<ApiResponse, ApiError> {
        self.transport
            .request(ApiRequest::with_body(
                Method::DELETE,
                self.repo_path(name),
                &self.token,
                None,
            ))
            .await
    }

    /// Whether the repository exists.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] or [`ApiError::UnexpectedStatus`]
    /// for any status other than 2xx or 404.
    pub async fn repo_exists(&self, name: &RepositoryName) -> Result<bool, ApiError> {
        let response = self.get_repo(name).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        response.ensure_success("get repository")?;
        Ok(true)
    }

    fn repo_path(&self, name: &RepositoryName) -> String {
        format!("/repos/{}/{}", self.owner, name)
    }
}
