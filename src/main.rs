//! preview-mirror entrypoint: one reconciliation pass over open pull requests.

use std::io::{self, Write};
use std::process::ExitCode;

use camino::Utf8Path;
use ortho_config::OrthoConfig;
use preview_mirror::{PreviewConfig, PreviewError, app, logging};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if report(&error).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), PreviewError> {
    let config = load_config()?;
    let settings = config.settings()?;
    logging::init(settings.verbose);

    let scratch = tempfile::TempDir::new()?;
    let workdir = Utf8Path::from_path(scratch.path()).ok_or_else(|| PreviewError::Io {
        message: format!(
            "temporary directory {} is not UTF-8",
            scratch.path().display()
        ),
    })?;
    app::mirror(&settings, workdir).await?;
    Ok(())
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`PreviewError::Configuration`] when ortho-config fails to parse
/// arguments or load configuration files.
fn load_config() -> Result<PreviewConfig, PreviewError> {
    PreviewConfig::load().map_err(|error| PreviewError::Configuration {
        message: error.to_string(),
    })
}

fn report(error: &PreviewError) -> io::Result<()> {
    let mut stderr = io::stderr().lock();
    if let PreviewError::MissingSecrets { names } = error {
        writeln!(stderr, "ERROR: Missing secrets from ENV:")?;
        for name in names {
            writeln!(stderr, "  - {name}")?;
        }
        return Ok(());
    }
    writeln!(stderr, "ERROR: {error}")
}
