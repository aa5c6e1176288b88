use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use strata_config::BuildProfile;
use strata_graph::paths::to_slash;
use strata_graph::{NativeSource, SourceProvider};

use crate::Result;
use crate::control::{BuildControl, normalize};
use crate::diagnostics::Diagnostics;
use crate::resolve::{Resolution, resolve_layers};
use crate::transform::{BundleEvaluator, CompressorBackend};

use super::output::BuildResult;

/// Configuration for one build.
///
/// Everything except the profile is optional: sources default to the local
/// filesystem, bundles are read by a [`SourceBundleEvaluator`](crate::SourceBundleEvaluator),
/// the compressor follows the profile's `layer_optimize` switch and output
/// goes to the profile's release directory.
pub struct BuildOptions {
    pub profile: BuildProfile,

    /// Directory relative profile paths resolve against.
    pub cwd: Option<PathBuf>,

    /// Overrides the destination computed from the profile.
    pub output_dir: Option<PathBuf>,

    pub source: Option<Arc<dyn SourceProvider>>,

    pub evaluator: Option<Arc<dyn BundleEvaluator>>,

    /// Overrides the backend chosen by `layer_optimize`.
    pub compressor: Option<Box<dyn CompressorBackend>>,

    /// Registry to log into; a fresh one is created when absent.
    pub diagnostics: Option<Arc<Diagnostics>>,

    /// Checked between layers; raising it ends the build with
    /// [`Error::Cancelled`](crate::Error::Cancelled).
    pub cancel: Option<Arc<AtomicBool>>,

    /// When `false` artifacts are produced but not written.
    pub write: bool,
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("cwd", &self.cwd)
            .field("output_dir", &self.output_dir)
            .field("layers", &self.profile.layers.len())
            .field("compressor", &self.compressor)
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

/// Normalized profile plus layer assignment, without any transform run.
#[derive(Debug)]
pub struct ResolvedBuild {
    pub control: BuildControl,
    pub resolution: Resolution,
    pub diagnostics: Arc<Diagnostics>,
}

impl BuildOptions {
    /// Create options for `profile`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use strata_bundler::BuildOptions;
    /// use strata_config::{BuildProfile, LayerDecl, PackagePrefix};
    ///
    /// # async fn example() -> strata_bundler::Result<()> {
    /// let profile = BuildProfile {
    ///     base_path: Some("js".into()),
    ///     prefixes: vec![PackagePrefix::new("app", "../app")],
    ///     layers: vec![LayerDecl::new("app.main").dependencies(["app.main"])],
    ///     ..Default::default()
    /// };
    /// let result = BuildOptions::new(profile).output_dir("release").build().await?;
    /// assert!(result.succeeded());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(profile: BuildProfile) -> Self {
        Self {
            profile,
            cwd: None,
            output_dir: None,
            source: None,
            evaluator: None,
            compressor: None,
            diagnostics: None,
            cancel: None,
            write: true,
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Read sources from `source` instead of the local filesystem.
    pub fn source(mut self, source: Arc<dyn SourceProvider>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn BundleEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn compressor(mut self, backend: Box<dyn CompressorBackend>) -> Self {
        self.compressor = Some(backend);
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn write(mut self, enabled: bool) -> Self {
        self.write = enabled;
        self
    }

    pub(crate) fn cwd_string(&self) -> Result<String> {
        let cwd = match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        Ok(to_slash(&cwd))
    }

    pub(crate) fn source_provider(&self) -> Arc<dyn SourceProvider> {
        self.source
            .clone()
            .unwrap_or_else(|| Arc::new(NativeSource) as Arc<dyn SourceProvider>)
    }

    pub(crate) fn shared_diagnostics(&self) -> Arc<Diagnostics> {
        self.diagnostics.clone().unwrap_or_else(Diagnostics::shared)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Normalize and resolve only.
    pub fn resolve(self) -> Result<ResolvedBuild> {
        let diagnostics = self.shared_diagnostics();
        diagnostics.reset();
        let control = normalize(&self.profile, &self.cwd_string()?, &diagnostics)?;
        let resolution = resolve_layers(&control, self.source_provider(), &diagnostics)?;
        Ok(ResolvedBuild {
            control,
            resolution,
            diagnostics,
        })
    }

    /// Run the whole pipeline.
    pub async fn build(self) -> Result<BuildResult> {
        super::executor::execute_build(self).await
    }
}
