//! Wires settings into a complete mirror run.

use camino::Utf8Path;

use crate::config::Settings;
use crate::engine::{Engine, RunSummary};
use crate::error::PreviewError;
use crate::github::{GitHubTransport, SourceClient, TargetClient};
use crate::publish::GitPublisher;

/// Authenticates, then mirrors every open pull request.
///
/// Downloads and clones are placed under `workdir`, which the caller owns and
/// removes.
///
/// # Errors
///
/// Returns the first fatal [`PreviewError`] of the run.
pub async fn mirror(settings: &Settings, workdir: &Utf8Path) -> Result<RunSummary, PreviewError> {
    let transport = GitHubTransport::new(&settings.api_base)?;
    let source = SourceClient::for_app(
        &transport,
        settings.source_owner.clone(),
        &settings.credentials,
    )
    .await?;
    tracing::debug!("authenticated as an installation of app {}", settings.credentials.app_id());
    let target = TargetClient::new(
        &transport,
        settings.target_owner.clone(),
        settings.target_token.clone(),
    );

    let site = settings.site();
    let publisher = GitPublisher::new(
        target,
        site.clone(),
        settings.publish_branch.clone(),
        settings.identity.clone(),
        workdir,
    );
    let summary = Engine::new(source, &publisher, &site, settings.engine(workdir))
        .run()
        .await?;
    tracing::info!(
        "processed {} pull requests, {} previews updated",
        summary.reports.len(),
        summary.published()
    );
    Ok(summary)
}
