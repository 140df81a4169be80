//! Artifact download with a fixed-delay retry policy.
//!
//! Artifact storage occasionally drops connections, so the archive fetch is
//! attempted a bounded number of times. Exhaustion is reported, not raised:
//! the caller skips the pull request and the next scheduled run starts the
//! whole pipeline again.

use std::time::Duration;

use camino::Utf8Path;

use super::locator::BearerToken;
use super::transport::Transport;

/// Default number of download attempts.
pub const DEFAULT_ATTEMPTS: u32 = 5;
/// Default pause between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// How often and how patiently a download is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made.
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pause between consecutive attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_DELAY)
    }
}

/// Result of a retried download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The archive was written to the destination.
    Downloaded {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed; no file is left at the destination.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl DownloadOutcome {
    /// Whether the archive is available.
    #[must_use]
    pub const fn is_downloaded(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }
}

/// Downloads `url` to `destination`, retrying per `policy`.
pub async fn download_with_retry<T>(
    transport: &T,
    url: &str,
    token: &BearerToken,
    destination: &Utf8Path,
    policy: RetryPolicy,
) -> DownloadOutcome
where
    T: Transport + ?Sized,
{
    for attempt in 1..=policy.attempts() {
        tracing::info!("   Attempt #{attempt}");
        match transport.download_file(url, token, destination).await {
            Ok(status) if status.is_success() => {
                return DownloadOutcome::Downloaded { attempts: attempt };
            }
            Ok(status) => tracing::warn!("   ... Failed to download ({status})"),
            Err(error) => tracing::warn!("   ... Failed to download ({error})"),
        }
        if attempt < policy.attempts() {
            tokio::time::sleep(policy.delay()).await;
        }
    }

    if let Err(error) = tokio::fs::remove_file(destination.as_std_path()).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("could not remove partial download {destination}: {error}");
    }
    DownloadOutcome::Exhausted {
        attempts: policy.attempts(),
    }
}
