//! Build entry points.
//!
//! [`BuildOptions`] collects a profile plus optional overrides (sources,
//! bundle evaluator, compressor, destination) and runs the pipeline:
//!
//! 1. normalize the profile into a [`BuildControl`](crate::BuildControl)
//! 2. resolve every layer's module closure
//! 3. assemble and transform each layer in declaration order
//! 4. process the theme stylesheets
//! 5. write all artifacts concurrently
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_bundler::BuildOptions;
//! use strata_config::{BuildProfile, LayerDecl};
//! use strata_graph::MemorySource;
//!
//! # async fn example() -> strata_bundler::Result<()> {
//! let source = MemorySource::new()
//!     .file("/js/dojo/main.js", "define([], function(){ return {}; });");
//! let profile = BuildProfile {
//!     base_path: Some("/js".into()),
//!     ..Default::default()
//! };
//!
//! let result = BuildOptions::new(profile)
//!     .source(Arc::new(source))
//!     .write(false)
//!     .build()
//!     .await?;
//! assert!(result.artifacts.contains("dojo/dojo.js"));
//! # Ok(())
//! # }
//! ```

mod executor;
mod options;
mod output;

pub use options::{BuildOptions, ResolvedBuild};
pub use output::{BuildResult, LayerOutput};
