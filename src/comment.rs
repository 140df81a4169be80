//! The single tracked comment announcing a preview on its pull request.
//!
//! The tracked comment is recognised by a marker line naming the target
//! organisation. Comments without the marker are never touched.

use crate::github::{
    ApiError, CommitSha, IssueComment, PullRequest, PullRequestNumber, RepositoryName,
    SourceClient, Transport,
};
use crate::publish::PreviewSite;

const PAGE_SIZE: u8 = 100;

/// What [`reconcile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    /// A new tracked comment was posted.
    Created {
        /// Identifier of the new comment.
        id: u64,
    },
    /// The existing tracked comment was rewritten.
    Updated {
        /// Identifier of the rewritten comment.
        id: u64,
    },
}

/// Marker line identifying comments owned by the mirror for `site`.
#[must_use]
pub fn marker(site: &PreviewSite) -> String {
    format!(
        "*Beep-boop, this comment was auto-generated for {}.*",
        site.target_owner()
    )
}

/// Body of the tracked comment for the preview of `sha`.
#[must_use]
pub fn compose(site: &PreviewSite, number: PullRequestNumber, sha: &CommitSha) -> String {
    [
        "Hi there!".to_owned(),
        String::new(),
        format!(
            "In the next few minutes a fresh preview of the docs for {sha} will be available at {}.",
            site.pages_url(number)
        ),
        String::new(),
        format!("See also the generated diff at: {}", site.diff_url(number)),
        String::new(),
        "Cheers!".to_owned(),
        String::new(),
        "* * *".to_owned(),
        String::new(),
        marker(site),
    ]
    .join("\n")
}

/// Creates or updates the tracked comment on `pull`.
///
/// `pull` should be freshly fetched; its comment count bounds the scan.
///
/// # Errors
///
/// Returns [`ApiError`] when listing, creating or updating comments fails.
pub async fn reconcile<T>(
    source: &SourceClient<'_, T>,
    repo: &RepositoryName,
    pull: &PullRequest,
    site: &PreviewSite,
) -> Result<CommentAction, ApiError>
where
    T: Transport + ?Sized,
{
    tracing::info!("   -> Commenting...");
    let marker = marker(site);
    let body = compose(site, pull.number, &pull.head_sha);

    if let Some(existing) = find_tracked(source, repo, pull, &marker).await? {
        tracing::info!("   ... updating comment");
        let updated: IssueComment = source
            .update_issue_comment(repo, existing.id, &body)
            .await?
            .into_success("update comment")?;
        return Ok(CommentAction::Updated { id: updated.id });
    }

    tracing::info!("   ... adding a comment");
    let created: IssueComment = source
        .create_issue_comment(repo, pull.number, &body)
        .await?
        .into_success("create comment")?;
    Ok(CommentAction::Created { id: created.id })
}

/// Scans comments oldest-first and returns the last one carrying `marker`.
async fn find_tracked<T>(
    source: &SourceClient<'_, T>,
    repo: &RepositoryName,
    pull: &PullRequest,
    marker: &str,
) -> Result<Option<IssueComment>, ApiError>
where
    T: Transport + ?Sized,
{
    let pages = pull.comments.div_ceil(u64::from(PAGE_SIZE));
    let mut tracked = None;
    for page in 1..=pages {
        let comments: Vec<IssueComment> = source
            .list_issue_comments(repo, pull.number, PAGE_SIZE, page)
            .await?
            .into_success("list comments")?;
        let short_page = comments.len() < usize::from(PAGE_SIZE);
        if let Some(found) = comments.into_iter().rev().find(|comment| comment.contains(marker)) {
            tracked = Some(found);
        }
        if short_page {
            break;
        }
    }
    Ok(tracked)
}
