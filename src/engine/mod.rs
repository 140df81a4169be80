//! The reconciliation engine.
//!
//! For every open pull request, newest-updated first, the engine finds the
//! completed docs workflow run at the head commit, downloads its first
//! artifact, hands it to the [`Publisher`] and, when the preview changed,
//! reconciles the tracked comment. Pull requests are processed one at a time.

use camino::{Utf8Path, Utf8PathBuf};

use crate::comment::{self, CommentAction};
use crate::error::PreviewError;
use crate::github::{
    Artifact, DownloadOutcome, PullRequest, PullRequestNumber, RepositoryName, RetryPolicy,
    SourceClient, Transport, WorkflowRun, download_with_retry, resource_path,
};
use crate::publish::{PreviewSite, PublishRequest, Publisher};

const PULL_REQUEST_PAGE_SIZE: u8 = 100;

/// Run parameters that do not change between pull requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Source repository whose pull requests are mirrored.
    pub source_repo: RepositoryName,
    /// Workflow file whose runs produce the docs artifact.
    pub workflow_path: String,
    /// API base used to reduce absolute artifact URLs to paths.
    pub api_base: String,
    /// Download retry policy.
    pub retry: RetryPolicy,
    /// Scratch directory for downloaded archives.
    pub workdir: Utf8PathBuf,
}

/// What happened to one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestOutcome {
    /// No completed run of the docs workflow at the head commit.
    NoWorkflowRun,
    /// The run uploaded no artifact.
    NoArtifact,
    /// Every download attempt failed.
    DownloadFailed {
        /// Attempts made.
        attempts: u32,
    },
    /// The preview already matched the artifact.
    Unchanged,
    /// A new preview was pushed and the comment reconciled.
    Published {
        /// What happened to the tracked comment.
        comment: CommentAction,
    },
}

/// One pull request's entry in a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestReport {
    /// Pull request number.
    pub number: PullRequestNumber,
    /// What the engine did with it.
    pub outcome: PullRequestOutcome,
}

/// Per-pull-request results of a run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Reports in processing order.
    pub reports: Vec<PullRequestReport>,
}

impl RunSummary {
    /// Outcome recorded for `number`, if it was processed.
    #[must_use]
    pub fn outcome(&self, number: PullRequestNumber) -> Option<&PullRequestOutcome> {
        self.reports
            .iter()
            .find(|report| report.number == number)
            .map(|report| &report.outcome)
    }

    /// Number of pull requests whose preview was updated.
    #[must_use]
    pub fn published(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| matches!(report.outcome, PullRequestOutcome::Published { .. }))
            .count()
    }

    fn record(&mut self, number: PullRequestNumber, outcome: PullRequestOutcome) {
        self.reports.push(PullRequestReport { number, outcome });
    }
}

/// Drives one mirror run.
pub struct Engine<'run, T, P>
where
    T: Transport + ?Sized,
    P: Publisher + ?Sized,
{
    source: SourceClient<'run, T>,
    publisher: &'run P,
    site: &'run PreviewSite,
    settings: EngineSettings,
}

impl<'run, T, P> Engine<'run, T, P>
where
    T: Transport + ?Sized,
    P: Publisher + ?Sized,
{
    /// Assembles an engine from its collaborators.
    #[must_use]
    pub const fn new(
        source: SourceClient<'run, T>,
        publisher: &'run P,
        site: &'run PreviewSite,
        settings: EngineSettings,
    ) -> Self {
        Self {
            source,
            publisher,
            site,
            settings,
        }
    }

    /// Mirrors every open pull request.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: an authentication or query failure, a
    /// publish failure, or a comment failure. Download exhaustion is not
    /// fatal; it is recorded as [`PullRequestOutcome::DownloadFailed`].
    pub async fn run(&self) -> Result<RunSummary, PreviewError> {
        let pulls = PullRequest::list_from(
            self.source
                .list_open_pull_requests(&self.settings.source_repo, PULL_REQUEST_PAGE_SIZE)
                .await?,
        )?;
        tracing::info!("{} open pull requests", pulls.len());

        let mut summary = RunSummary::default();
        for pull in &pulls {
            let outcome = self.mirror(pull).await?;
            summary.record(pull.number, outcome);
        }
        Ok(summary)
    }

    async fn mirror(&self, pull: &PullRequest) -> Result<PullRequestOutcome, PreviewError> {
        let repo = &self.settings.source_repo;
        tracing::info!(":: {}", pull.html_url);
        tracing::info!("   {}", pull.number);
        tracing::info!("   {}", pull.title);

        let runs = WorkflowRun::list_from(
            self.source
                .list_completed_workflow_runs(repo, pull.head_sha.as_str())
                .await?,
        )?;
        let Some(run) = runs
            .into_iter()
            .find(|run| run.path == self.settings.workflow_path)
        else {
            tracing::info!("   Skipping; no completed {} run", self.settings.workflow_path);
            return Ok(PullRequestOutcome::NoWorkflowRun);
        };

        let listing = resource_path(&run.artifacts_url, &self.settings.api_base);
        let artifacts = Artifact::list_from(self.source.get(&listing).await?)?;
        let Some(artifact) = artifacts.into_iter().next() else {
            tracing::info!("   Skipping; run {} has no artifacts", run.id);
            return Ok(PullRequestOutcome::NoArtifact);
        };

        let archive = self
            .settings
            .workdir
            .join(format!("{}.zip", pull.head_sha));
        tracing::info!("   Downloading artifact...");
        let download = download_with_retry(
            self.source.transport(),
            &artifact.archive_download_url,
            self.source.token(),
            &archive,
            self.settings.retry,
        )
        .await;
        if let DownloadOutcome::Exhausted { attempts } = download {
            tracing::warn!("   !!! could not download artifact...");
            tracing::warn!("   Skipping hoping next run will succeed...");
            return Ok(PullRequestOutcome::DownloadFailed { attempts });
        }
        tracing::info!("   ... done!");

        let request = PublishRequest {
            number: pull.number,
            head_sha: pull.head_sha.clone(),
            archive: archive.clone(),
        };
        let published = self.publisher.publish(&request).await;
        discard(&archive);
        if !published?.was_updated {
            tracing::info!("   (No update to pages...)");
            return Ok(PullRequestOutcome::Unchanged);
        }

        let fresh =
            PullRequest::from_response(self.source.get_pull_request(repo, pull.number).await?)?;
        let comment = comment::reconcile(&self.source, repo, &fresh, self.site).await?;
        Ok(PullRequestOutcome::Published { comment })
    }
}

fn discard(archive: &Utf8Path) {
    if let Err(error) = std::fs::remove_file(archive)
        && error.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("could not remove {archive}: {error}");
    }
}
