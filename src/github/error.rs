//! Error types exposed by the GitHub API layer.

use http::StatusCode;
use thiserror::Error;

/// Errors surfaced while talking to the GitHub REST API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The token exchange or an authenticated call was rejected.
    #[error("GitHub rejected the credentials: {message}")]
    Authentication {
        /// Operation and response detail.
        message: String,
    },

    /// GitHub answered with a status the caller cannot proceed from.
    #[error("{operation} failed with status {status}: {message}")]
    UnexpectedStatus {
        /// Operation that was attempted.
        operation: String,
        /// Status code returned by GitHub.
        status: StatusCode,
        /// `message` field of the response body, if any.
        message: String,
    },

    /// Networking failed while calling GitHub.
    #[error("network error talking to GitHub: {message}")]
    Network {
        /// Transport-level error detail.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("{operation} response could not be decoded: {message}")]
    Decode {
        /// Operation whose response failed to decode.
        operation: String,
        /// Deserialisation error detail.
        message: String,
    },

    /// A URL or request could not be constructed.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Detail about the malformed request.
        message: String,
    },

    /// The application private key could not be used for signing.
    #[error("could not sign the application assertion: {message}")]
    Signing {
        /// Error detail from the JWT encoder.
        message: String,
    },

    /// Local I/O failed while storing a downloaded file.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail from the underlying I/O operation.
        message: String,
    },
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
