#![cfg_attr(docsrs, feature(doc_cfg))]

//! # strata-bundler
//!
//! Layered module bundler: normalizes a build profile, resolves each
//! layer's module closure with cross-layer deduplication, runs the text
//! transforms (static features, string interning, resource-bundle
//! flattening, compression, theme stylesheets) and writes the artifacts.
//!
//! Recoverable problems never surface as `Err`; they are logged to the
//! [`Diagnostics`] registry and the build carries on. Check
//! [`BuildResult::succeeded`] (the registry's error count) to decide
//! whether the output is deployable.
//!
//! ## Quick Start
//!
//! ```no_run
//! use strata_bundler::BuildOptions;
//! use strata_config::load_profile;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = load_profile("strata.toml")?;
//! let result = BuildOptions::new(profile)
//!     .output_dir("release")
//!     .build()
//!     .await?;
//!
//! for (path, bytes) in result.artifacts.iter() {
//!     println!("{path}: {} bytes", bytes.len());
//! }
//! if !result.succeeded() {
//!     eprintln!("{}", result.diagnostics.non_report_messages());
//! }
//! # Ok(()) }
//! ```

pub mod builders;
pub mod control;
pub mod diagnostics;
pub mod output;
pub mod resolve;
pub mod transform;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use builders::{BuildOptions, BuildResult, LayerOutput, ResolvedBuild};
pub use control::{BuildControl, LayerSpec, Version, normalize};
pub use diagnostics::{DiagnosticEntry, Diagnostics, Severity};
pub use output::{Artifacts, LayerWriter, WriteReport};
pub use resolve::{Resolution, resolve_layers};
pub use transform::nls::{BundleEvaluator, SourceBundleEvaluator};
pub use transform::optimize::{CompressOptions, CompressorBackend, backend_for};

/// Error types for strata-bundler operations.
///
/// Only failures that end a build early are represented here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Profile could not be loaded.
    #[error(transparent)]
    Config(#[from] strata_config::ConfigError),

    /// No layer resolved to any module.
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    /// The cancel flag was raised between layers.
    #[error("Build cancelled")]
    Cancelled,

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for strata-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Config(_) => "CONFIG_ERROR",
            Error::DiscoveryFailed(_) => "DISCOVERY_FAILED",
            Error::Cancelled => "CANCELLED",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check the base package and layer declarations in your profile.\nError: {}",
                msg
            ))),
            Error::Config(_) => Some(Box::new(
                "Check your profile file for syntax errors and unsupported values.",
            )),
            Error::DiscoveryFailed(_) => Some(Box::new(
                "No layer resolved to any module. Check package prefixes and layer dependencies.",
            )),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it stays within the output directory and doesn't contain '..' components.",
                path
            ))),
            _ => None,
        }
    }
}
