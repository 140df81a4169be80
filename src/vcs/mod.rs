//! Working-copy operations on preview repositories.
//!
//! Wraps the handful of git operations the publisher needs behind
//! [`GitWorkingCopy`], built on `git2` so no `git` executable is required.
//! Remote credentials ride in the clone URL and are masked whenever the URL is
//! displayed.

pub mod error;

use std::cell::{Cell, RefCell};
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Commit, Cred, ErrorCode, FetchOptions, IndexAddOption, ObjectType, PushOptions,
    RemoteCallbacks, Repository, Signature,
};
use url::Url;

pub use error::GitOperationError;

use crate::github::{BearerToken, RepositoryName, RepositoryOwner};

/// Username GitHub expects alongside an installation or personal token.
pub const TOKEN_USERNAME: &str = "x-access-token";

const ORIGIN: &str = "origin";

/// Clone URL of a preview repository with optional embedded credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    url: Url,
    token: Option<BearerToken>,
}

impl RemoteUrl {
    /// Builds `{web_base}/{owner}/{name}` with the token embedded for HTTP
    /// remotes.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::InvalidPath`] when `web_base` cannot carry
    /// a repository path.
    pub fn for_repository(
        web_base: &Url,
        owner: &RepositoryOwner,
        name: &RepositoryName,
        token: &BearerToken,
    ) -> Result<Self, GitOperationError> {
        let mut url = web_base.clone();
        url.path_segments_mut()
            .map_err(|()| GitOperationError::InvalidPath {
                message: format!("{web_base} cannot be a base URL"),
            })?
            .pop_if_empty()
            .push(owner.as_str())
            .push(name.as_str());
        Self::with_token(url, token)
    }

    /// Wraps an existing URL, embedding `token` when the scheme is HTTP(S).
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::InvalidPath`] when credentials cannot be
    /// attached.
    pub fn with_token(mut url: Url, token: &BearerToken) -> Result<Self, GitOperationError> {
        if !matches!(url.scheme(), "http" | "https") || token.is_empty() {
            return Ok(Self { url, token: None });
        }
        let rejected = |()| GitOperationError::InvalidPath {
            message: "remote URL cannot carry credentials".to_owned(),
        };
        url.set_username(TOKEN_USERNAME).map_err(rejected)?;
        url.set_password(Some(token.value())).map_err(rejected)?;
        Ok(Self {
            url,
            token: Some(token.clone()),
        })
    }

    /// Full URL including credentials; never log this.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.url.as_str()
    }

    fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut masked = self.url.clone();
        if masked.password().is_some() && masked.set_password(Some("***")).is_err() {
            return f.write_str("<remote>");
        }
        write!(f, "{masked}")
    }
}

impl fmt::Debug for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteUrl({self})")
    }
}

/// Author identity recorded on preview commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// Author and committer name.
    pub name: String,
    /// Author and committer email.
    pub email: String,
}

/// Result of [`GitWorkingCopy::create_branch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateBranchResult {
    /// The branch is new and HEAD now points at it.
    Created,
    /// A local or remote-tracking branch with that name already exists.
    AlreadyExists,
}

/// Result of [`GitWorkingCopy::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// A new commit was written.
    Committed {
        /// Hex object id of the new commit.
        id: String,
    },
    /// The staged tree matches HEAD; nothing was written.
    NoChange,
}

/// A cloned preview repository.
pub struct GitWorkingCopy {
    repo: Repository,
    workdir: Utf8PathBuf,
    token: Option<BearerToken>,
}

impl fmt::Debug for GitWorkingCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitWorkingCopy")
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}

impl GitWorkingCopy {
    /// Clones `remote` into `destination`, which must not exist or be empty.
    ///
    /// Empty remotes are accepted; HEAD is then unborn.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::Git`] when the clone fails.
    pub fn clone_remote(
        remote: &RemoteUrl,
        destination: &Utf8Path,
    ) -> Result<Self, GitOperationError> {
        tracing::debug!("cloning {remote} into {destination}");
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(remote_callbacks(remote.token()));
        let repo = RepoBuilder::new()
            .fetch_options(fetch)
            .clone(remote.expose(), destination.as_std_path())
            .map_err(GitOperationError::git("clone"))?;
        Ok(Self {
            repo,
            workdir: destination.to_owned(),
            token: remote.token().cloned(),
        })
    }

    /// Root of the checked-out tree.
    #[must_use]
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    /// Creates `branch` at HEAD and switches to it, keeping the working tree.
    ///
    /// On a fresh clone of an empty repository HEAD is simply repointed at the
    /// unborn branch.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::Git`] when a reference cannot be written.
    pub fn create_branch(&self, branch: &str) -> Result<CreateBranchResult, GitOperationError> {
        if self.has_local_branch(branch)? || self.has_remote_branch(branch)? {
            return Ok(CreateBranchResult::AlreadyExists);
        }
        if let Some(head) = self.head_commit()? {
            self.repo
                .branch(branch, &head, false)
                .map_err(GitOperationError::git("branch"))?;
        }
        self.repo
            .set_head(&local_ref(branch))
            .map_err(GitOperationError::git("branch"))?;
        Ok(CreateBranchResult::Created)
    }

    /// Switches to an existing `branch`, creating the local branch from
    /// `origin/{branch}` when only the remote one exists.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::Git`] when the branch is unknown or the
    /// checkout fails.
    pub fn checkout(&self, branch: &str) -> Result<(), GitOperationError> {
        let local = match self.repo.find_branch(branch, BranchType::Local) {
            Ok(local) => local,
            Err(error) if error.code() == ErrorCode::NotFound => {
                let upstream = remote_branch(branch);
                let remote = self
                    .repo
                    .find_branch(&upstream, BranchType::Remote)
                    .map_err(GitOperationError::git("checkout"))?;
                let commit = remote
                    .get()
                    .peel_to_commit()
                    .map_err(GitOperationError::git("checkout"))?;
                let mut created = self
                    .repo
                    .branch(branch, &commit, false)
                    .map_err(GitOperationError::git("checkout"))?;
                created
                    .set_upstream(Some(upstream.as_str()))
                    .map_err(GitOperationError::git("checkout"))?;
                created
            }
            Err(error) => return Err(GitOperationError::git("checkout")(error)),
        };

        let target = local
            .get()
            .peel(ObjectType::Commit)
            .map_err(GitOperationError::git("checkout"))?;
        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().force()))
            .map_err(GitOperationError::git("checkout"))?;
        self.repo
            .set_head(&local_ref(branch))
            .map_err(GitOperationError::git("checkout"))
    }

    /// Stages every addition, modification and deletion in the working tree.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::Git`] when the index cannot be updated.
    pub fn stage_all(&self) -> Result<(), GitOperationError> {
        let mut index = self.repo.index().map_err(GitOperationError::git("add"))?;
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .map_err(GitOperationError::git("add"))?;
        index
            .update_all(["*"], None)
            .map_err(GitOperationError::git("add"))?;
        index.write().map_err(GitOperationError::git("add"))
    }

    /// Commits the index on the current branch.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::Git`] when the commit cannot be written.
    pub fn commit(
        &self,
        message: &str,
        identity: &CommitIdentity,
    ) -> Result<CommitResult, GitOperationError> {
        let mut index = self.repo.index().map_err(GitOperationError::git("commit"))?;
        let tree_id = index
            .write_tree()
            .map_err(GitOperationError::git("commit"))?;
        let parent = self.head_commit()?;
        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => index.is_empty(),
        };
        if unchanged {
            return Ok(CommitResult::NoChange);
        }

        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(GitOperationError::git("commit"))?;
        let signature = Signature::now(&identity.name, &identity.email)
            .map_err(GitOperationError::git("commit"))?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let id = self
            .repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .map_err(GitOperationError::git("commit"))?;
        Ok(CommitResult::Committed { id: id.to_string() })
    }

    /// Points the lightweight tag `name` at HEAD, moving it if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::UnbornHead`] when the branch has no
    /// commits, or [`GitOperationError::Git`] when the tag cannot be written.
    pub fn force_tag(&self, name: &str) -> Result<(), GitOperationError> {
        let head = self
            .head_commit()?
            .ok_or(GitOperationError::UnbornHead { operation: "tag" })?;
        self.repo
            .tag_lightweight(name, head.as_object(), true)
            .map_err(GitOperationError::git("tag"))?;
        Ok(())
    }

    /// Force-pushes `branch` and every local tag to `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::PushRejected`] when the remote refuses a
    /// reference, or [`GitOperationError::Git`] when the push fails outright.
    pub fn force_push(&self, branch: &str) -> Result<(), GitOperationError> {
        let mut refspecs = vec![format!("+{0}:{0}", local_ref(branch))];
        let tags = self
            .repo
            .tag_names(None)
            .map_err(GitOperationError::git("push"))?;
        refspecs.extend(
            tags.iter()
                .flatten()
                .map(|tag| format!("+refs/tags/{tag}:refs/tags/{tag}")),
        );

        let mut remote = self
            .repo
            .find_remote(ORIGIN)
            .map_err(GitOperationError::git("push"))?;
        let rejected = RefCell::new(Vec::new());
        {
            let mut callbacks = remote_callbacks(self.token.as_ref());
            callbacks.push_update_reference(|refname, status| {
                if let Some(reason) = status {
                    rejected.borrow_mut().push(format!("{refname}: {reason}"));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote
                .push(&refspecs, Some(&mut options))
                .map_err(GitOperationError::git("push"))?;
        }

        let refs = rejected.into_inner();
        if refs.is_empty() {
            Ok(())
        } else {
            Err(GitOperationError::PushRejected { refs })
        }
    }

    /// Commit id at HEAD, or `None` while the branch is unborn.
    ///
    /// # Errors
    ///
    /// Returns [`GitOperationError::Git`] when HEAD cannot be read.
    pub fn head_id(&self) -> Result<Option<String>, GitOperationError> {
        Ok(self.head_commit()?.map(|commit| commit.id().to_string()))
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>, GitOperationError> {
        match self.repo.head() {
            Ok(head) => head
                .peel_to_commit()
                .map(Some)
                .map_err(GitOperationError::git("resolve HEAD")),
            Err(error)
                if matches!(error.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) =>
            {
                Ok(None)
            }
            Err(error) => Err(GitOperationError::git("resolve HEAD")(error)),
        }
    }

    fn has_local_branch(&self, branch: &str) -> Result<bool, GitOperationError> {
        self.branch_exists(branch, BranchType::Local)
    }

    fn has_remote_branch(&self, branch: &str) -> Result<bool, GitOperationError> {
        self.branch_exists(&remote_branch(branch), BranchType::Remote)
    }

    fn branch_exists(&self, name: &str, kind: BranchType) -> Result<bool, GitOperationError> {
        match self.repo.find_branch(name, kind) {
            Ok(_) => Ok(true),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(false),
            Err(error) => Err(GitOperationError::git("branch lookup")(error)),
        }
    }
}

fn local_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

fn remote_branch(branch: &str) -> String {
    format!("{ORIGIN}/{branch}")
}

/// Offers the token once; libgit2 re-invokes the callback after a rejection.
fn remote_callbacks(token: Option<&BearerToken>) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(token) = token {
        let offered = Cell::new(false);
        callbacks.credentials(move |_url, _username, _allowed| {
            if offered.replace(true) {
                return Err(git2::Error::from_str("remote rejected the access token"));
            }
            Cred::userpass_plaintext(TOKEN_USERNAME, token.value())
        });
    }
    callbacks
}

#[cfg(test)]
mod tests;
