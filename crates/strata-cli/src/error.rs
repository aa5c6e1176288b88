//! CLI errors and their rendering.
//!
//! Findings logged during a build are not errors here; they are printed as
//! they stand and turned into a single [`CliError::BuildFailed`] when the
//! registry counted any error.

use std::path::PathBuf;

use miette::Report;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Profile missing, malformed or failing validation
    #[error("Profile error: {0}")]
    Config(#[from] strata_config::ConfigError),

    /// The bundler stopped before producing a result
    #[error(transparent)]
    Bundler(#[from] strata_bundler::Error),

    /// The build ran to completion but logged errors
    #[error("Finished with {errors} error(s) and {warnings} warning(s)")]
    BuildFailed { errors: usize, warnings: usize },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Convert to a miette report, keeping the bundler's codes and help text.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Bundler(e) => Report::new(e),
        CliError::Config(strata_config::ConfigError::NotFound { path }) => miette::miette!(
            help = "Pass the profile path explicitly or create strata.toml",
            "Profile not found: {}",
            path.display()
        ),
        CliError::BuildFailed { errors, warnings } => miette::miette!(
            help = "The messages above list every problem; run with --verbose for pipeline detail",
            "Finished with {errors} error(s) and {warnings} warning(s)"
        ),
        other => miette::miette!("{}", other),
    }
}
