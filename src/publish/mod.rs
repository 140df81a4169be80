//! Publishing rendered documentation to per-pull-request preview repositories.
//!
//! A publish walks one state machine: make sure the preview repository exists,
//! clone it, switch to the publish branch, replace the tree with the artifact,
//! commit if anything changed, tag the tip `sha_{head}` and force-push. The
//! clone lives in a scratch directory that is removed afterwards.

pub mod archive;
pub mod site;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};

pub use archive::{ArchiveError, UnpackReport, clear_worktree, unpack};
pub use site::{PreviewSite, tag_name};

use crate::error::PreviewError;
use crate::github::{CommitSha, PullRequestNumber, TargetClient, Transport};
use crate::vcs::{CommitIdentity, CommitResult, CreateBranchResult, GitWorkingCopy};

/// One preview to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Pull request the preview belongs to.
    pub number: PullRequestNumber,
    /// Head commit the artifact was built from.
    pub head_sha: CommitSha,
    /// Downloaded artifact archive.
    pub archive: Utf8PathBuf,
}

/// What a publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Whether a new commit was pushed.
    pub was_updated: bool,
    /// Whether the preview repository had to be created.
    pub created_repository: bool,
}

/// Publishes previews; the engine depends on this seam only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `request` and reports whether the preview changed.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PreviewError>;
}

/// Git-backed [`Publisher`] writing to the target organisation.
pub struct GitPublisher<'client, T>
where
    T: Transport + ?Sized,
{
    target: TargetClient<'client, T>,
    site: PreviewSite,
    branch: String,
    identity: CommitIdentity,
    scratch: Utf8PathBuf,
}

impl<'client, T> GitPublisher<'client, T>
where
    T: Transport + ?Sized,
{
    /// Creates a publisher cloning into subdirectories of `scratch`.
    #[must_use]
    pub fn new(
        target: TargetClient<'client, T>,
        site: PreviewSite,
        branch: impl Into<String>,
        identity: CommitIdentity,
        scratch: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            target,
            site,
            branch: branch.into(),
            identity,
            scratch: scratch.into(),
        }
    }

    async fn ensure_repository(&self, number: PullRequestNumber) -> Result<bool, PreviewError> {
        let name = self.site.repo_name(number);
        if self.target.repo_exists(&name).await? {
            tracing::info!(":: Already created...");
            return Ok(false);
        }
        tracing::info!(":: Creating repo {}/{name}...", self.target.owner());
        self.target
            .create_repo(&name, &self.site.description(number))
            .await?
            .ensure_success("create repository")?;
        Ok(true)
    }

    fn publish_into(
        &self,
        checkout: &Utf8Path,
        request: &PublishRequest,
    ) -> Result<bool, PreviewError> {
        let remote = self.site.remote(request.number, self.target.token())?;
        let copy = GitWorkingCopy::clone_remote(&remote, checkout)?;
        match copy.create_branch(&self.branch)? {
            CreateBranchResult::Created => {
                tracing::debug!("created branch {}", self.branch);
            }
            CreateBranchResult::AlreadyExists => copy.checkout(&self.branch)?,
        }

        clear_worktree(copy.workdir())?;
        let report = unpack(&request.archive, copy.workdir())?;
        tracing::debug!(
            "unpacked {} files, skipped {}",
            report.files,
            report.skipped.len()
        );

        copy.stage_all()?;
        let commit = copy.commit(&self.site.commit_message(request.number), &self.identity)?;
        let was_updated = match commit {
            CommitResult::Committed { id } => {
                tracing::debug!("committed {id}");
                true
            }
            CommitResult::NoChange => false,
        };

        if copy.head_id()?.is_none() {
            tracing::warn!("   nothing to push; the artifact is empty");
            return Ok(false);
        }
        copy.force_tag(&tag_name(&request.head_sha))?;
        copy.force_push(&self.branch)?;
        Ok(was_updated)
    }
}

#[async_trait]
impl<T> Publisher for GitPublisher<'_, T>
where
    T: Transport + ?Sized,
{
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PreviewError> {
        let name = self.site.repo_name(request.number);
        tracing::info!("   -> Attempting to push to {name}");
        let created_repository = self.ensure_repository(request.number).await?;

        let checkout = self.scratch.join(name.as_str());
        let result = self.publish_into(&checkout, request);
        if let Err(error) = std::fs::remove_dir_all(&checkout)
            && error.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("could not remove clone {checkout}: {error}");
        }

        Ok(PublishOutcome {
            was_updated: result?,
            created_repository,
        })
    }
}

#[cfg(test)]
mod tests;
