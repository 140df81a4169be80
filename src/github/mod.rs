//! GitHub REST access for the source and target organisations.
//!
//! The source client authenticates as a GitHub App installation and reads pull
//! requests, workflow runs, artifacts and comments. The target client uses a
//! static token to manage preview repositories. Both are thin typed request
//! builders over the [`Transport`] seam and never retry on their own.

pub mod download;
pub mod error;
pub mod identity;
pub mod locator;
pub mod models;
pub mod query;
pub mod source;
pub mod target;
pub mod transport;

pub use download::{DownloadOutcome, RetryPolicy, download_with_retry};
pub use error::ApiError;
pub use identity::{AppClaims, AppCredentials, exchange_installation_token, sign_app_assertion};
pub use locator::{BearerToken, CommitSha, PullRequestNumber, RepositoryName, RepositoryOwner};
pub use models::{Artifact, Installation, IssueComment, PullRequest, Repository, WorkflowRun};
pub use query::Query;
pub use source::{SourceClient, resource_path};
pub use target::TargetClient;
pub use transport::{ApiRequest, ApiResponse, GitHubTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;
