//! Top-level error type for a mirror run.

use thiserror::Error;

use crate::github::ApiError;
use crate::publish::ArchiveError;
use crate::vcs::GitOperationError;

/// Errors that abort a mirror run.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Required secrets were not provided.
    #[error("missing secrets from the environment: {}", names.join(", "))]
    MissingSecrets {
        /// Environment variable names that were unset.
        names: Vec<&'static str>,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// A GitHub API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A working-copy operation failed.
    #[error(transparent)]
    Git(#[from] GitOperationError),

    /// The artifact could not be unpacked.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Local I/O failed outside the working copy.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail from the underlying I/O operation.
        message: String,
    },
}

impl From<std::io::Error> for PreviewError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
