//! Build output: layer assembly, the artifact map and the disk writer.

pub mod assemble;
pub mod writer;

use indexmap::IndexMap;

use crate::diagnostics::Diagnostics;

pub use assemble::{LayerAssembly, boot_suffix, config_stub, layer_body};
pub use writer::{LayerWriter, WriteReport, validate_output_path};

/// Insertion-ordered map from relative output path to content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    entries: IndexMap<String, Vec<u8>>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact. A second artifact for the same path is rejected
    /// with `outputCollide`; the first one stays.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
        diagnostics: &Diagnostics,
    ) -> bool {
        let path = path.into();
        if self.entries.contains_key(&path) {
            diagnostics.log("outputCollide", ["file", path.as_str()]);
            return false;
        }
        self.entries.insert(path, content.into());
        true
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Content as text, when it is valid UTF-8.
    pub fn text(&self, path: &str) -> Option<&str> {
        std::str::from_utf8(self.get(path)?).ok()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size in bytes.
    pub fn total_size(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_rejects_collisions() {
        let d = Diagnostics::new();
        let mut artifacts = Artifacts::new();
        assert!(artifacts.insert("dojo/dojo.js", "a", &d));
        assert!(artifacts.insert("app/main.js", "b", &d));
        assert!(!artifacts.insert("dojo/dojo.js", "c", &d));

        assert_eq!(artifacts.paths().collect::<Vec<_>>(), ["dojo/dojo.js", "app/main.js"]);
        assert_eq!(artifacts.text("dojo/dojo.js"), Some("a"));
        assert_eq!(artifacts.total_size(), 2);
        assert_eq!(d.count("outputCollide"), 1);
        assert_eq!(d.error_count(), 1);
    }
}
