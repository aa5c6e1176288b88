//! Artifact writing.
//!
//! Every write is its own blocking task on a [`JoinSet`]; [`LayerWriter::finish`]
//! waits for all of them and aggregates the failures. A failed write never
//! cancels its siblings, and nothing already written is rolled back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;
use tokio::task::JoinSet;

use strata_graph::paths::DirectoryCache;

use crate::diagnostics::Diagnostics;
use crate::{Error, Result};

/// Outcome of a batch of writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fan-out writer rooted at the destination directory.
pub struct LayerWriter {
    root: PathBuf,
    dirs: Arc<DirectoryCache>,
    tasks: JoinSet<(PathBuf, io::Result<()>)>,
}

impl LayerWriter {
    /// Create a writer for `root`, made absolute against the process
    /// working directory when relative.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            root: validate_and_normalize_dir(root.as_ref())?,
            dirs: Arc::new(DirectoryCache::new()),
            tasks: JoinSet::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Queue `content` for `relative`. Returns the validated target path.
    ///
    /// Must be called from within a tokio runtime.
    pub fn write(&mut self, relative: &str, content: Vec<u8>) -> Result<PathBuf> {
        let target = validate_output_path(&self.root, relative)?;
        let dirs = Arc::clone(&self.dirs);
        let path = target.clone();
        self.tasks.spawn_blocking(move || {
            let result = dirs
                .ensure_directory_by_filename(&path)
                .and_then(|()| fs::write(&path, &content));
            (path, result)
        });
        Ok(target)
    }

    /// Number of writes still in flight.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every queued write. Any failure is logged as a single
    /// `writeFailed` entry naming all failed files.
    pub async fn finish(mut self, diagnostics: &Diagnostics) -> WriteReport {
        let mut report = WriteReport::default();

        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok((path, Ok(()))) => {
                    tracing::debug!(path = %path.display(), "wrote artifact");
                    report.written.push(path);
                }
                Ok((path, Err(e))) => {
                    tracing::debug!(path = %path.display(), error = %e, "write failed");
                    report.failed.push((path, e.to_string()));
                }
                Err(join_err) => {
                    report
                        .failed
                        .push((PathBuf::from("<unknown>"), format!("write task panicked: {join_err}")));
                }
            }
        }

        report.written.sort();
        report.failed.sort();
        if !report.failed.is_empty() {
            let files = report
                .failed
                .iter()
                .map(|(path, e)| format!("{} ({e})", path.display()))
                .collect::<Vec<_>>()
                .join(", ");
            diagnostics.log("writeFailed", ["files", files.as_str()]);
        }
        report
    }
}

fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir().map_err(|e| {
        Error::InvalidOutputPath(format!("Failed to get current directory: {}", e))
    })?;
    Ok(cwd.join(&cleaned).clean())
}

/// Resolve `filename` under `base_dir`, rejecting anything that escapes it.
pub fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let filename_path = Path::new(filename).clean();
    let full_path = base_dir.join(&filename_path).clean();

    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output_path_nested() {
        let base = Path::new("/tmp/output");
        let result = validate_output_path(base, "app/nls/main_de.js");
        assert_eq!(result.unwrap(), Path::new("/tmp/output/app/nls/main_de.js"));
    }

    #[test]
    fn test_validate_output_path_current_dir() {
        let base = Path::new("/tmp/output");
        let result = validate_output_path(base, "./dojo/dojo.js");
        assert_eq!(result.unwrap(), Path::new("/tmp/output/dojo/dojo.js"));
    }

    #[test]
    fn test_validate_output_path_traversal() {
        let base = Path::new("/tmp/output");
        for bad in ["../etc/passwd", "safe/../../../../etc/passwd", ".", "file\0name.js"] {
            let result = validate_output_path(base, bad);
            assert!(matches!(result, Err(Error::InvalidOutputPath(_))), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn writes_all_files_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let d = Diagnostics::new();
        let mut writer = LayerWriter::new(dir.path()).unwrap();
        writer.write("dojo/dojo.js", b"loader".to_vec()).unwrap();
        writer.write("app/nls/main_de.js", b"de".to_vec()).unwrap();
        let report = writer.finish(&d).await;

        assert!(report.is_success());
        assert_eq!(report.written.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("app/nls/main_de.js")).unwrap(), "de");
        assert_eq!(d.count("writeFailed"), 0);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocked"), "not a directory").unwrap();
        let d = Diagnostics::new();

        let mut writer = LayerWriter::new(dir.path()).unwrap();
        writer.write("app/a.js", b"a".to_vec()).unwrap();
        writer.write("blocked/b.js", b"b".to_vec()).unwrap();
        writer.write("app/c.js", b"c".to_vec()).unwrap();
        let report = writer.finish(&d).await;

        assert_eq!(report.written.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("blocked/b.js"));
        assert!(dir.path().join("app/a.js").exists());
        assert!(dir.path().join("app/c.js").exists());
        assert_eq!(d.count("writeFailed"), 1);
        assert_eq!(d.error_count(), 1);
    }

    #[test]
    fn rejects_escaping_paths_before_spawning() {
        let mut writer = LayerWriter::new("/tmp/strata-out").unwrap();
        assert!(writer.write("../escape.js", Vec::new()).is_err());
        assert_eq!(writer.pending(), 0);
    }
}
