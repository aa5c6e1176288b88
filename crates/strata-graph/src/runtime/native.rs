use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{RuntimeError, RuntimeResult, SourceProvider};

/// Filesystem-backed source provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSource;

impl SourceProvider for NativeSource {
    fn read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RuntimeError::FileNotFound(path.to_path_buf())
            } else {
                RuntimeError::Io(format!("Failed to read {}: {}", path.display(), e))
            }
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path) -> RuntimeResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(RuntimeError::FileNotFound(dir.to_path_buf()));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| RuntimeError::Io(e.to_string()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_and_lists() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/x.js"), "x").unwrap();
        std::fs::write(dir.path().join("a/y.js"), "y").unwrap();

        let src = NativeSource;
        assert_eq!(src.read_to_string(&dir.path().join("a/y.js")).unwrap(), "y");
        assert!(src.exists(&dir.path().join("a/b/x.js")));
        assert!(src.is_dir(&dir.path().join("a/b")));
        assert_eq!(src.list_files(&dir.path().join("a")).unwrap().len(), 2);
        assert!(matches!(
            src.read(&dir.path().join("nope.js")),
            Err(RuntimeError::FileNotFound(_))
        ));
    }
}
