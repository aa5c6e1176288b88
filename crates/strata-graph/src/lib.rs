//! # strata-graph
//!
//! Module identifiers, source access and dependency closure for the strata
//! bundler. Nothing here knows about layers or diagnostics; the bundler
//! drives these pieces and reports what they find.
//!
//! ```
//! use strata_graph::{ModuleId, StaticDependencies, ordered_closure};
//!
//! let id = |s: &str| ModuleId::new(s).unwrap();
//! let mut deps = StaticDependencies::new();
//! deps.insert(id("app/main"), vec![id("app/util")]);
//! deps.insert(id("app/util"), vec![]);
//!
//! let closure = ordered_closure(&mut deps, &[id("app/main")], |_| false);
//! assert_eq!(closure.order, vec![id("app/util"), id("app/main")]);
//! ```

pub mod closure;
pub mod graph;
pub mod module_id;
pub mod paths;
pub mod runtime;
pub mod scan;

pub use closure::{Closure, ClosureEvent, DependencySource, StaticDependencies, ordered_closure};
pub use graph::{MissingReason, ModuleGraph, ModuleNode, PackageMap};
pub use module_id::{ModuleId, ModuleIdError};
pub use runtime::{MemorySource, NativeSource, RuntimeError, RuntimeResult, SourceProvider};
pub use scan::{ModuleKind, ScanResult, scan_dependencies, split_plugin};

/// Error types for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid module id: {0}")]
    ModuleId(#[from] ModuleIdError),

    #[error("Source error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, Error>;
