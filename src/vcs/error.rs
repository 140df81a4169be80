//! Error types for working-copy operations.

use thiserror::Error;

/// Errors raised while manipulating a preview working copy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitOperationError {
    /// A libgit2 call failed.
    #[error("git {operation} failed: {message}")]
    Git {
        /// Operation being performed, e.g. `clone` or `push`.
        operation: &'static str,
        /// Error detail from the git2 library.
        message: String,
    },

    /// An operation needed a commit but the branch has none yet.
    #[error("branch has no commits to {operation}")]
    UnbornHead {
        /// Operation that needed a commit.
        operation: &'static str,
    },

    /// The remote refused one or more pushed references.
    #[error("push rejected: {}", refs.join(", "))]
    PushRejected {
        /// `refname: reason` for each rejected reference.
        refs: Vec<String>,
    },

    /// The working copy path is not usable.
    #[error("invalid working copy path: {message}")]
    InvalidPath {
        /// Detail about the path.
        message: String,
    },
}

impl GitOperationError {
    pub(crate) fn git(operation: &'static str) -> impl FnOnce(git2::Error) -> Self {
        move |error| Self::Git {
            operation,
            message: error.message().to_owned(),
        }
    }
}
