//! Names and URLs derived for a pull request's preview.

use url::Url;

use crate::github::{BearerToken, CommitSha, PullRequestNumber, RepositoryName, RepositoryOwner};
use crate::vcs::{GitOperationError, RemoteUrl};

/// Where previews of one source repository are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSite {
    source_owner: RepositoryOwner,
    source_repo: RepositoryName,
    target_owner: RepositoryOwner,
    web_base: Url,
}

impl PreviewSite {
    /// Describes previews of `source_owner/source_repo` hosted by
    /// `target_owner` on the GitHub instance at `web_base`.
    #[must_use]
    pub const fn new(
        source_owner: RepositoryOwner,
        source_repo: RepositoryName,
        target_owner: RepositoryOwner,
        web_base: Url,
    ) -> Self {
        Self {
            source_owner,
            source_repo,
            target_owner,
            web_base,
        }
    }

    /// Organisation hosting the previews.
    #[must_use]
    pub const fn target_owner(&self) -> &RepositoryOwner {
        &self.target_owner
    }

    /// `{source_repo}-PR{n}`.
    #[must_use]
    pub fn repo_name(&self, number: PullRequestNumber) -> RepositoryName {
        RepositoryName::new(format!("{}-PR{number}", self.source_repo))
    }

    /// Public GitHub Pages address of the preview.
    #[must_use]
    pub fn pages_url(&self, number: PullRequestNumber) -> String {
        format!(
            "https://{}.github.io/{}/",
            self.target_owner,
            self.repo_name(number)
        )
    }

    /// Web address of the preview repository, where its history doubles as a
    /// rendered diff.
    #[must_use]
    pub fn diff_url(&self, number: PullRequestNumber) -> String {
        format!(
            "{}/{}/{}",
            self.web_root(),
            self.target_owner,
            self.repo_name(number)
        )
    }

    /// Web address of the source pull request.
    #[must_use]
    pub fn pull_request_url(&self, number: PullRequestNumber) -> String {
        format!(
            "{}/{}/{}/pull/{number}",
            self.web_root(),
            self.source_owner,
            self.source_repo
        )
    }

    /// Description given to a newly created preview repository.
    #[must_use]
    pub fn description(&self, number: PullRequestNumber) -> String {
        format!(
            "{} From: {}",
            self.pages_url(number),
            self.pull_request_url(number)
        )
    }

    /// Message of the commit carrying a preview.
    #[must_use]
    pub fn commit_message(&self, number: PullRequestNumber) -> String {
        [
            format!("Preview for PR#{number}"),
            String::new(),
            format!("See {}", self.pages_url(number)),
            format!("From: {}", self.pull_request_url(number)),
        ]
        .join("\n")
    }

    /// Clone URL of the preview repository carrying `token`.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::InvalidPath`] when the web base cannot
    /// form a repository URL.
    pub fn remote(
        &self,
        number: PullRequestNumber,
        token: &BearerToken,
    ) -> Result<RemoteUrl, GitOperationError> {
        RemoteUrl::for_repository(
            &self.web_base,
            &self.target_owner,
            &self.repo_name(number),
            token,
        )
    }

    fn web_root(&self) -> &str {
        self.web_base.as_str().trim_end_matches('/')
    }
}

/// Tag marking the commit built from `sha`.
#[must_use]
pub fn tag_name(sha: &CommitSha) -> String {
    format!("sha_{sha}")
}
