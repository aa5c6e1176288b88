//! Path algebra over `/`-separated strings.
//!
//! Module locations, layer filenames and stylesheet URLs are all handled as
//! forward-slash strings regardless of host platform, so the functions here
//! never touch the filesystem. The only exceptions are [`dir_exists`],
//! [`file_exists`] and [`DirectoryCache`].

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Normalize separators and drop a trailing slash (the root `/` is kept).
pub fn cleanup_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.len() > 1 && path.ends_with('/') {
        path.trim_end_matches('/').to_string()
    } else {
        path
    }
}

/// Join two path fragments with exactly one slash between them.
pub fn cat_path(lhs: &str, rhs: &str) -> String {
    if lhs.is_empty() {
        return rhs.to_string();
    }
    if rhs.is_empty() {
        return lhs.to_string();
    }
    format!("{}/{}", lhs.trim_end_matches('/'), rhs.trim_start_matches('/'))
}

/// Join any number of fragments left to right.
pub fn cat_paths<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .fold(String::new(), |acc, part| cat_path(&acc, part.as_ref()))
}

/// Collapse `.` and `..` segments.
///
/// A `..` removes the previous segment unless that segment is itself a `..`
/// that could not be collapsed, so `../../a` stays intact while `a/b/../c`
/// becomes `a/c`. The leading empty segment of an absolute path is never
/// removed.
pub fn compact_path(path: &str) -> String {
    let path = cleanup_path(path);
    let absolute = path.starts_with('/');
    let mut result: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "." => {}
            "" if !result.is_empty() => {}
            ".." => match result.last() {
                Some(&last) if last != ".." && !last.is_empty() => {
                    result.pop();
                }
                Some(&"") => {}
                _ => result.push(".."),
            },
            _ => result.push(segment),
        }
    }

    if absolute && result.len() == 1 {
        return "/".to_string();
    }
    if result.is_empty() {
        return ".".to_string();
    }
    result.join("/")
}

/// Absolute in either POSIX (`/x`) or drive-letter (`C:/x`) form.
pub fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Resolve `path` against `base` unless it is already absolute, then compact.
pub fn compute_path(path: &str, base: &str) -> String {
    let path = cleanup_path(path);
    if is_absolute_path(&path) {
        compact_path(&path)
    } else {
        compact_path(&cat_path(base, &path))
    }
}

/// Alias of [`compute_path`] with the working directory as base.
pub fn get_absolute_path(path: &str, cwd: &str) -> String {
    compute_path(path, cwd)
}

/// Everything before the last slash, or `"."` for a bare filename.
pub fn get_filepath(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// Everything after the last slash.
pub fn get_filename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Extension of the filename, without the dot.
pub fn get_filetype(path: &str) -> Option<&str> {
    let name = get_filename(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Express `target` relative to the directory `from_dir`.
///
/// Both inputs are compacted first. When they share no common root the
/// target is returned unchanged.
pub fn relative_path(from_dir: &str, target: &str) -> String {
    let from = compact_path(from_dir);
    let to = compact_path(target);
    if is_absolute_path(&from) != is_absolute_path(&to) {
        return to;
    }

    let from_segs: Vec<&str> = from.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let to_segs: Vec<&str> = to.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let common = from_segs
        .iter()
        .zip(&to_segs)
        .take_while(|(a, b)| a == b)
        .count();

    if from_segs[common..].contains(&"..") {
        return to;
    }

    let mut parts: Vec<&str> = vec![".."; from_segs.len() - common];
    parts.extend(&to_segs[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Convert a host path into the slash form used throughout the crate.
pub fn to_slash(path: &Path) -> String {
    cleanup_path(&path.to_string_lossy())
}

pub fn dir_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// Idempotent directory creation with a memo of directories already verified.
///
/// Shared between concurrent writers; `create_dir_all` tolerates races, the
/// set only saves repeated syscalls.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    checked: Mutex<FxHashSet<PathBuf>>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `dir` and all of its parents exist.
    pub fn ensure_directory(&self, dir: &Path) -> io::Result<()> {
        if dir.as_os_str().is_empty() || self.checked.lock().contains(dir) {
            return Ok(());
        }
        std::fs::create_dir_all(dir)?;

        let mut checked = self.checked.lock();
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.as_os_str().is_empty() || !checked.insert(d.to_path_buf()) {
                break;
            }
            current = d.parent();
        }
        Ok(())
    }

    /// Ensure the parent directory of `filename` exists.
    pub fn ensure_directory_by_filename(&self, filename: &Path) -> io::Result<()> {
        match filename.parent() {
            Some(parent) => self.ensure_directory(parent),
            None => Ok(()),
        }
    }

    pub fn is_checked(&self, dir: &Path) -> bool {
        self.checked.lock().contains(dir)
    }

    /// Forget every verified directory (between builds).
    pub fn clear(&self) {
        self.checked.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_normalizes_separators() {
        assert_eq!(cleanup_path("a\\b\\c\\"), "a/b/c");
        assert_eq!(cleanup_path("/"), "/");
        assert_eq!(cleanup_path("a/b"), "a/b");
    }

    #[test]
    fn cat_inserts_single_slash() {
        assert_eq!(cat_path("a/", "/b"), "a/b");
        assert_eq!(cat_path("", "b"), "b");
        assert_eq!(cat_path("a", ""), "a");
        assert_eq!(cat_paths(&["/r", "app", "main.js"]), "/r/app/main.js");
    }

    #[test]
    fn compact_collapses_segments() {
        assert_eq!(compact_path("a/b/../c"), "a/c");
        assert_eq!(compact_path("./a/./b"), "a/b");
        assert_eq!(compact_path("../../a"), "../../a");
        assert_eq!(compact_path("a/../../b"), "../b");
        assert_eq!(compact_path("/a/../.."), "/");
        assert_eq!(compact_path("/src/dojo/../app"), "/src/app");
        assert_eq!(compact_path("a/.."), ".");
        assert_eq!(compact_path("a//b"), "a/b");
    }

    #[test]
    fn compute_respects_absolute() {
        assert_eq!(compute_path("/abs/x", "/base"), "/abs/x");
        assert_eq!(compute_path("../app", "/src/dojo"), "/src/app");
        assert_eq!(compute_path("C:/x", "/base"), "C:/x");
    }

    #[test]
    fn filename_parts() {
        assert_eq!(get_filepath("/a/b/c.js"), "/a/b");
        assert_eq!(get_filepath("c.js"), ".");
        assert_eq!(get_filepath("/c.js"), "/");
        assert_eq!(get_filename("/a/b/c.js"), "c.js");
        assert_eq!(get_filetype("/a/b/c.min.js"), Some("js"));
        assert_eq!(get_filetype("/a/.hidden"), None);
        assert_eq!(get_filetype("/a/README"), None);
    }

    #[test]
    fn relative_between_directories() {
        assert_eq!(relative_path("/t/claro", "/t/claro/img/a.png"), "img/a.png");
        assert_eq!(relative_path("/t/claro/form", "/t/claro/img/a.png"), "../img/a.png");
        assert_eq!(relative_path("/t", "/t"), ".");
        assert_eq!(relative_path("t/a", "t/b/c"), "../b/c");
    }

    #[test]
    fn directory_cache_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        let cache = DirectoryCache::new();
        cache.ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(cache.is_checked(&nested));
        assert!(cache.is_checked(&dir.path().join("a")));
        cache.ensure_directory(&nested).unwrap();
        cache
            .ensure_directory_by_filename(&dir.path().join("x/y.js"))
            .unwrap();
        assert!(dir.path().join("x").is_dir());
        cache.clear();
        assert!(!cache.is_checked(&nested));
    }
}
