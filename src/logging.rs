//! Tracing subscriber setup for the binary.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default level: `debug` when verbose, `info` otherwise.
#[must_use]
pub const fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Builds the filter, letting `RUST_LOG` override the default level.
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level(verbose).into())
        .from_env_lossy()
}

/// Installs a plain stdout formatter for progress output.
///
/// Does nothing when a global subscriber is already set.
pub fn init(verbose: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(verbose)
        .without_time()
        .with_filter(env_filter(verbose));
    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
