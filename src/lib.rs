//! Mirrors pull-request documentation builds into browsable preview sites.
//!
//! For every open pull request of a source repository, the crate finds the
//! docs artifact produced by CI, publishes it to a dedicated preview
//! repository in a target organisation (served by GitHub Pages) and keeps a
//! single announcement comment on the pull request up to date. Nothing is
//! persisted locally; every run reconstructs its state from GitHub.

pub mod app;
pub mod comment;
pub mod config;
pub mod engine;
pub mod error;
pub mod github;
pub mod logging;
pub mod publish;
pub mod vcs;

pub use comment::CommentAction;
pub use config::{PreviewConfig, Settings};
pub use engine::{Engine, EngineSettings, PullRequestOutcome, RunSummary};
pub use error::PreviewError;
pub use github::{ApiError, GitHubTransport, SourceClient, TargetClient};
pub use publish::{GitPublisher, PreviewSite, Publisher};
pub use vcs::GitOperationError;
