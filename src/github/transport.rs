//! HTTP transport shared by the source and target API clients.
//!
//! The [`Transport`] trait is the seam between typed request builders and the
//! network. The Octocrab-backed implementation sends JSON API calls; artifact
//! archives are fetched with `reqwest` because their download URLs redirect to
//! blob storage outside the API host.

use async_trait::async_trait;
use camino::Utf8Path;
use http::header::{ACCEPT, AUTHORIZATION};
use http::{Method, StatusCode, Uri};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::error::ApiError;
use super::locator::BearerToken;

/// Media type requested for every API call.
pub const GITHUB_JSON: &str = "application/vnd.github+json";
/// Header pinning the REST API version. Octocrab already sends it on API
/// calls, so only downloads set it explicitly.
pub const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
/// REST API version the clients are written against.
pub const API_VERSION: &str = "2022-11-28";

/// A single authenticated API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base, including any query string.
    pub path: String,
    /// Credential sent as `Authorization: Bearer`.
    pub token: BearerToken,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Builds a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>, token: &BearerToken) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            token: token.clone(),
            body: None,
        }
    }

    /// Builds a request carrying a JSON body.
    #[must_use]
    pub fn with_body(
        method: Method,
        path: impl Into<String>,
        token: &BearerToken,
        body: Option<Value>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            token: token.clone(),
            body,
        }
    }
}

/// Status code and parsed JSON body of an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Status code returned by GitHub.
    pub status: StatusCode,
    /// Parsed body; `Null` for empty bodies, a JSON string for non-JSON text.
    pub body: Value,
}

impl ApiResponse {
    /// Creates a response from its parts.
    #[must_use]
    pub const fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `message` field GitHub includes in error bodies.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    /// Decodes the body when the call succeeded, otherwise reports the status.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] for 401/403,
    /// [`ApiError::UnexpectedStatus`] for any other non-2xx status, and
    /// [`ApiError::Decode`] when the body does not match `T`.
    pub fn into_success<T: DeserializeOwned>(self, operation: &str) -> Result<T, ApiError> {
        self.ensure_success(operation)?;
        serde_json::from_value(self.body).map_err(|error| ApiError::Decode {
            operation: operation.to_owned(),
            message: error.to_string(),
        })
    }

    /// Fails unless the status is in the 2xx range.
    ///
    /// # Errors
    ///
    /// Same status mapping as [`ApiResponse::into_success`].
    pub fn ensure_success(&self, operation: &str) -> Result<(), ApiError> {
        if self.is_success() {
            return Ok(());
        }
        Err(map_http_error(operation, self.status, self.message()))
    }
}

pub(crate) fn map_http_error(
    operation: &str,
    status: StatusCode,
    maybe_message: Option<&str>,
) -> ApiError {
    let message = maybe_message.unwrap_or("unknown error").to_owned();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiError::Authentication {
            message: format!("{operation} failed: GitHub returned {status} {message}"),
        }
    } else {
        ApiError::UnexpectedStatus {
            operation: operation.to_owned(),
            status,
            message,
        }
    }
}

/// Issues API requests and file downloads.
///
/// Implementations never retry; callers own the retry policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends an API request and returns its status and parsed body.
    ///
    /// Non-2xx statuses are returned, not raised.
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Downloads `url` into `destination`, returning the final status.
    ///
    /// The file is only written when the status is 2xx.
    async fn download_file(
        &self,
        url: &str,
        token: &BearerToken,
        destination: &Utf8Path,
    ) -> Result<StatusCode, ApiError>;
}

/// Octocrab-backed transport used in production.
#[derive(Debug, Clone)]
pub struct GitHubTransport {
    client: Octocrab,
    downloader: reqwest::Client,
}

impl GitHubTransport {
    /// Builds a transport rooted at `api_base`.
    ///
    /// The Octocrab client carries no credentials of its own; each request
    /// supplies its bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] when the base URL cannot be used or
    /// either HTTP client fails to build.
    pub fn new(api_base: &Url) -> Result<Self, ApiError> {
        let base_uri: Uri = api_base
            .as_str()
            .parse::<Uri>()
            .map_err(|error| ApiError::InvalidRequest {
                message: format!("API base {api_base}: {error}"),
            })?;

        let client = Octocrab::builder()
            .base_uri(base_uri)
            .map_err(|error| ApiError::InvalidRequest {
                message: format!("build client failed: {error}"),
            })?
            .build()
            .map_err(|error| ApiError::InvalidRequest {
                message: format!("build client failed: {error}"),
            })?;

        let downloader = reqwest::Client::builder()
            .user_agent(concat!("preview-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ApiError::InvalidRequest {
                message: format!("build download client failed: {error}"),
            })?;

        Ok(Self { client, downloader })
    }
}

#[async_trait]
impl Transport for GitHubTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let operation = format!("{} {}", request.method, request.path);
        let uri = request
            .path
            .parse::<Uri>()
            .map_err(|error| ApiError::InvalidRequest {
                message: format!("{}: {error}", request.path),
            })?;

        let builder = http::Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .header(ACCEPT, GITHUB_JSON)
            .header(AUTHORIZATION, format!("Bearer {}", request.token.value()));

        tracing::debug!("{operation}");
        let http_request = self
            .client
            .build_request(builder, request.body.as_ref())
            .map_err(|error| map_octocrab_error(&operation, &error))?;
        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|error| map_octocrab_error(&operation, &error))?;

        let status = response.status();
        let text = self
            .client
            .body_to_string(response)
            .await
            .map_err(|error| map_octocrab_error(&operation, &error))?;
        tracing::debug!("{operation} -> {status}");

        Ok(ApiResponse::new(status, parse_body(&text)))
    }

    async fn download_file(
        &self,
        url: &str,
        token: &BearerToken,
        destination: &Utf8Path,
    ) -> Result<StatusCode, ApiError> {
        let response = self
            .downloader
            .get(url)
            .header(API_VERSION_HEADER, API_VERSION)
            .bearer_auth(token.value())
            .send()
            .await
            .map_err(|error| ApiError::Network {
                message: format!("download failed: {error}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Ok(status);
        }

        let bytes = response.bytes().await.map_err(|error| ApiError::Network {
            message: format!("download body failed: {error}"),
        })?;
        tokio::fs::write(destination.as_std_path(), &bytes).await?;
        Ok(status)
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

fn map_octocrab_error(operation: &str, error: &octocrab::Error) -> ApiError {
    let is_network = matches!(
        error,
        octocrab::Error::Http { .. }
            | octocrab::Error::Hyper { .. }
            | octocrab::Error::Service { .. }
    );
    if is_network {
        ApiError::Network {
            message: format!("{operation} failed: {error}"),
        }
    } else {
        ApiError::InvalidRequest {
            message: format!("{operation} failed: {error}"),
        }
    }
}
