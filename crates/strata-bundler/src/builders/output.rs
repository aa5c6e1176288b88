use std::path::PathBuf;
use std::sync::Arc;

use strata_graph::ModuleId;

use crate::diagnostics::Diagnostics;
use crate::output::{Artifacts, WriteReport};

/// One layer's share of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOutput {
    pub module_id: ModuleId,
    /// Output path relative to the destination root.
    pub path: String,
    /// Modules assigned to this layer, in emission order.
    pub modules: Vec<ModuleId>,
    /// Resolved but not emitted.
    pub discard: bool,
}

/// Result of a build.
///
/// Producing artifacts and succeeding are separate facts: a build with
/// errors still returns everything it managed to produce.
#[derive(Debug)]
pub struct BuildResult {
    pub artifacts: Artifacts,
    pub layers: Vec<LayerOutput>,
    pub diagnostics: Arc<Diagnostics>,
    /// Present when artifacts were written.
    pub write_report: Option<WriteReport>,
    /// Destination root the artifacts were (or would have been) written to.
    pub output_dir: PathBuf,
}

impl BuildResult {
    /// `true` when no error-level diagnostic was logged.
    pub fn succeeded(&self) -> bool {
        self.diagnostics.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    pub fn warn_count(&self) -> usize {
        self.diagnostics.warn_count()
    }

    pub fn layer(&self, id: &ModuleId) -> Option<&LayerOutput> {
        self.layers.iter().find(|l| &l.module_id == id)
    }
}
