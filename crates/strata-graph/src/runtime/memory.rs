use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;

use super::{RuntimeError, RuntimeResult, SourceProvider};

/// In-memory source tree, optionally layered over another provider.
///
/// Paths are cleaned before storage and lookup so `/a/./b.js` and `/a/b.js`
/// name the same file. Lookups that miss fall through to the fallback.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: Arc<RwLock<FxHashMap<PathBuf, Vec<u8>>>>,
    fallback: Option<Arc<dyn SourceProvider>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve virtual files first, then delegate to `fallback`.
    pub fn with_fallback(fallback: Arc<dyn SourceProvider>) -> Self {
        Self {
            files: Arc::default(),
            fallback: Some(fallback),
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        let path: PathBuf = path.into();
        self.files.write().insert(path.clean(), content.into());
    }

    /// Builder-style variant of [`add_file`](Self::add_file).
    pub fn file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl SourceProvider for MemorySource {
    fn read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let key = path.clean();
        if let Some(content) = self.files.read().get(&key) {
            return Ok(content.clone());
        }
        match &self.fallback {
            Some(fallback) => fallback.read(path),
            None => Err(RuntimeError::FileNotFound(key)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(&path.clean())
            || self.fallback.as_ref().is_some_and(|f| f.exists(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = path.clean();
        self.files
            .read()
            .keys()
            .any(|p| p != &dir && p.starts_with(&dir))
            || self.fallback.as_ref().is_some_and(|f| f.is_dir(path))
    }

    fn list_files(&self, dir: &Path) -> RuntimeResult<Vec<PathBuf>> {
        let dir = dir.clean();
        let mut files: Vec<PathBuf> = self
            .files
            .read()
            .keys()
            .filter(|p| *p != &dir && p.starts_with(&dir))
            .cloned()
            .collect();

        if let Some(fallback) = &self.fallback {
            if fallback.is_dir(&dir) {
                for path in fallback.list_files(&dir)? {
                    if !files.contains(&path) {
                        files.push(path);
                    }
                }
            }
        }

        if files.is_empty() && !self.is_dir(&dir) {
            return Err(RuntimeError::FileNotFound(dir));
        }
        files.sort();
        Ok(files)
    }
}
