//! Source access abstraction.
//!
//! Every stage that reads module text, resource bundles or theme files goes
//! through a [`SourceProvider`]. [`NativeSource`] reads the real filesystem;
//! [`MemorySource`] serves an in-memory snapshot (tests, uploaded trees) and
//! can overlay a fallback provider.

mod memory;
mod native;

pub use memory::MemorySource;
pub use native::NativeSource;

use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during source access
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("File is not valid UTF-8: {}", .0.display())]
    InvalidUtf8(PathBuf),
}

/// Synchronous, read-only view of a source tree.
///
/// Resolution and text transforms are synchronous, so the trait is too.
/// Implementations must be shareable across the writer's worker tasks.
pub trait SourceProvider: Send + Sync + std::fmt::Debug {
    fn read(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Every file below `dir`, recursively, in a stable order.
    fn list_files(&self, dir: &Path) -> RuntimeResult<Vec<PathBuf>>;

    fn read_to_string(&self, path: &Path) -> RuntimeResult<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| RuntimeError::InvalidUtf8(path.to_path_buf()))
    }
}
