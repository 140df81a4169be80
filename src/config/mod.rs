//! Run configuration loaded from defaults, files, environment and CLI.
//!
//! # Precedence
//!
//! Values are merged with the following precedence (lowest to highest):
//!
//! 1. **Defaults** – the Jovian NixOS docs setup
//! 2. **Configuration file** – `.preview-mirror.toml` in the current
//!    directory, home directory, or XDG config directory
//! 3. **Environment variables** – `PREVIEW_MIRROR_*`
//! 4. **Command-line arguments** – `--target-token`, `--source-repo`, ...
//!
//! The three secrets additionally fall back to the unprefixed `TARGET_TOKEN`,
//! `SOURCE_APP_ID` and `SOURCE_PRIVATE_KEY` variables so existing CI secrets
//! keep working.
//!
//! # Configuration File
//!
//! ```toml
//! source_owner = "Jovian-Experiments"
//! source_repo = "Jovian-NixOS"
//! target_owner = "www-jovian"
//! workflow_path = ".github/workflows/docs.yml"
//! download_attempts = 5
//! ```

use std::env;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::engine::EngineSettings;
use crate::error::PreviewError;
use crate::github::{AppCredentials, BearerToken, RepositoryName, RepositoryOwner, RetryPolicy};
use crate::publish::PreviewSite;
use crate::vcs::CommitIdentity;

/// Legacy variable holding the target organisation token.
pub const TARGET_TOKEN_VAR: &str = "TARGET_TOKEN";
/// Legacy variable holding the GitHub App id.
pub const SOURCE_APP_ID_VAR: &str = "SOURCE_APP_ID";
/// Legacy variable holding the GitHub App private key.
pub const SOURCE_PRIVATE_KEY_VAR: &str = "SOURCE_PRIVATE_KEY";

const DEFAULT_SOURCE_OWNER: &str = "Jovian-Experiments";
const DEFAULT_SOURCE_REPO: &str = "Jovian-NixOS";
const DEFAULT_TARGET_OWNER: &str = "www-jovian";
const DEFAULT_WORKFLOW_PATH: &str = ".github/workflows/docs.yml";
const DEFAULT_PUBLISH_BRANCH: &str = "gh-pages";
const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_WEB_BASE: &str = "https://github.com";
const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 5;
const DEFAULT_DOWNLOAD_RETRY_DELAY_SECONDS: u64 = 5;
const DEFAULT_AUTHOR_NAME: &str = "Jovian Experiments";
const DEFAULT_AUTHOR_EMAIL: &str = "jovian-experiments@users.noreply.github.com";

/// Mirror configuration supporting CLI, environment, and file sources.
///
/// # Environment Variables
///
/// - `PREVIEW_MIRROR_TARGET_TOKEN` or `TARGET_TOKEN`: token for the target
///   organisation (repository admin and contents write)
/// - `PREVIEW_MIRROR_SOURCE_APP_ID` or `SOURCE_APP_ID`: GitHub App id
/// - `PREVIEW_MIRROR_SOURCE_PRIVATE_KEY` or `SOURCE_PRIVATE_KEY`: App private
///   key in PEM form
/// - `PREVIEW_MIRROR_<FIELD>` for every other field
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "PREVIEW_MIRROR",
    discovery(
        dotfile_name = ".preview-mirror.toml",
        config_file_name = "preview-mirror.toml",
        app_name = "preview-mirror"
    )
)]
pub struct PreviewConfig {
    /// Token for the target organisation.
    #[ortho_config()]
    pub target_token: Option<String>,

    /// GitHub App id used against the source organisation.
    #[ortho_config()]
    pub source_app_id: Option<String>,

    /// PEM-encoded GitHub App private key.
    #[ortho_config()]
    pub source_private_key: Option<String>,

    /// Organisation owning the source repository.
    #[ortho_config()]
    pub source_owner: String,

    /// Repository whose pull requests are mirrored.
    #[ortho_config()]
    pub source_repo: String,

    /// Organisation receiving the preview repositories.
    #[ortho_config()]
    pub target_owner: String,

    /// Workflow file producing the docs artifact.
    #[ortho_config()]
    pub workflow_path: String,

    /// Branch served by GitHub Pages.
    #[ortho_config()]
    pub publish_branch: String,

    /// REST API root.
    #[ortho_config()]
    pub api_base: String,

    /// Web root used for clone URLs and links.
    #[ortho_config()]
    pub web_base: String,

    /// Download attempts per artifact.
    #[ortho_config()]
    pub download_attempts: u32,

    /// Pause between download attempts, in seconds.
    #[ortho_config()]
    pub download_retry_delay_seconds: u64,

    /// Author and committer name of preview commits.
    #[ortho_config()]
    pub commit_author_name: String,

    /// Author and committer email of preview commits.
    #[ortho_config()]
    pub commit_author_email: String,

    /// Enables debug logging.
    ///
    /// Can be provided via `--verbose` / `-v` or `verbose = true` in a
    /// configuration file. `PREVIEW_MIRROR_VERBOSE` is not supported because
    /// `ortho_config` does not load boolean values from the environment;
    /// `RUST_LOG` still applies.
    #[ortho_config(cli_short = 'v')]
    pub verbose: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            target_token: None,
            source_app_id: None,
            source_private_key: None,
            source_owner: DEFAULT_SOURCE_OWNER.to_owned(),
            source_repo: DEFAULT_SOURCE_REPO.to_owned(),
            target_owner: DEFAULT_TARGET_OWNER.to_owned(),
            workflow_path: DEFAULT_WORKFLOW_PATH.to_owned(),
            publish_branch: DEFAULT_PUBLISH_BRANCH.to_owned(),
            api_base: DEFAULT_API_BASE.to_owned(),
            web_base: DEFAULT_WEB_BASE.to_owned(),
            download_attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
            download_retry_delay_seconds: DEFAULT_DOWNLOAD_RETRY_DELAY_SECONDS,
            commit_author_name: DEFAULT_AUTHOR_NAME.to_owned(),
            commit_author_email: DEFAULT_AUTHOR_EMAIL.to_owned(),
            verbose: false,
        }
    }
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Token for the target organisation.
    pub target_token: BearerToken,
    /// GitHub App credentials for the source organisation.
    pub credentials: AppCredentials,
    /// Organisation owning the source repository.
    pub source_owner: RepositoryOwner,
    /// Repository whose pull requests are mirrored.
    pub source_repo: RepositoryName,
    /// Organisation receiving the previews.
    pub target_owner: RepositoryOwner,
    /// Workflow file producing the docs artifact.
    pub workflow_path: String,
    /// Branch served by GitHub Pages.
    pub publish_branch: String,
    /// REST API root.
    pub api_base: Url,
    /// Web root.
    pub web_base: Url,
    /// Download retry policy.
    pub retry: RetryPolicy,
    /// Identity recorded on preview commits.
    pub identity: CommitIdentity,
    /// Whether debug logging was requested.
    pub verbose: bool,
}

impl Settings {
    /// Names and URLs of the previews.
    #[must_use]
    pub fn site(&self) -> PreviewSite {
        PreviewSite::new(
            self.source_owner.clone(),
            self.source_repo.clone(),
            self.target_owner.clone(),
            self.web_base.clone(),
        )
    }

    /// Engine parameters with archives stored under `workdir`.
    #[must_use]
    pub fn engine(&self, workdir: impl Into<camino::Utf8PathBuf>) -> EngineSettings {
        EngineSettings {
            source_repo: self.source_repo.clone(),
            workflow_path: self.workflow_path.clone(),
            api_base: self.api_base.as_str().to_owned(),
            retry: self.retry,
            workdir: workdir.into(),
        }
    }
}

impl PreviewConfig {
    /// Validates the configuration and resolves the secrets.
    ///
    /// Secrets missing from every layer are looked up in the legacy
    /// environment variables before being reported.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::MissingSecrets`] naming every unset secret, or
    /// [`PreviewError::Configuration`] when a URL does not parse.
    pub fn settings(&self) -> Result<Settings, PreviewError> {
        let mut missing = Vec::new();
        let target_token = secret(self.target_token.as_deref(), TARGET_TOKEN_VAR, &mut missing);
        let app_id = secret(self.source_app_id.as_deref(), SOURCE_APP_ID_VAR, &mut missing);
        let private_key = secret(
            self.source_private_key.as_deref(),
            SOURCE_PRIVATE_KEY_VAR,
            &mut missing,
        );
        let (Some(target_token), Some(app_id), Some(private_key)) =
            (target_token, app_id, private_key)
        else {
            return Err(PreviewError::MissingSecrets { names: missing });
        };

        Ok(Settings {
            target_token: BearerToken::new(target_token),
            credentials: AppCredentials::new(app_id.trim(), private_key),
            source_owner: RepositoryOwner::new(&self.source_owner),
            source_repo: RepositoryName::new(&self.source_repo),
            target_owner: RepositoryOwner::new(&self.target_owner),
            workflow_path: self.workflow_path.clone(),
            publish_branch: self.publish_branch.clone(),
            api_base: parse_url("api_base", &self.api_base)?,
            web_base: parse_url("web_base", &self.web_base)?,
            retry: RetryPolicy::new(
                self.download_attempts,
                Duration::from_secs(self.download_retry_delay_seconds),
            ),
            identity: CommitIdentity {
                name: self.commit_author_name.clone(),
                email: self.commit_author_email.clone(),
            },
            verbose: self.verbose,
        })
    }
}

fn secret(
    configured: Option<&str>,
    legacy: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<String> {
    let value = configured
        .map(ToOwned::to_owned)
        .or_else(|| env::var(legacy).ok())
        .filter(|value| !value.trim().is_empty());
    if value.is_none() {
        missing.push(legacy);
    }
    value
}

fn parse_url(field: &str, value: &str) -> Result<Url, PreviewError> {
    Url::parse(value).map_err(|error| PreviewError::Configuration {
        message: format!("{field} {value:?} is not a valid URL: {error}"),
    })
}

#[cfg(test)]
mod tests;
