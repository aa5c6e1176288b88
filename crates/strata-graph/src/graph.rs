//! Lazily populated module graph.
//!
//! Nodes are loaded the first time resolution asks for them. A module whose
//! file cannot be located or read is cached as missing so it is reported
//! once per lookup site rather than re-read on every visit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::module_id::ModuleId;
use crate::runtime::{RuntimeError, SourceProvider};
use crate::scan::{ModuleKind, scan_dependencies};

/// Top-level package name to absolute source location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMap {
    locations: IndexMap<String, PathBuf>,
}

impl PackageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, location: impl Into<PathBuf>) {
        self.locations.insert(name.into(), location.into());
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.locations.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.locations
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Source file for a module: `<package location>/<rest>.js`.
    ///
    /// A bare package id maps to the package's `main` module.
    pub fn locate(&self, id: &ModuleId) -> Option<PathBuf> {
        self.locate_resource(id, ".js")
    }

    /// Path of a non-module resource below a module's package, `suffix` appended verbatim.
    pub fn locate_resource(&self, id: &ModuleId, suffix: &str) -> Option<PathBuf> {
        let location = self.locations.get(id.top_level())?;
        let rest = id.rest().unwrap_or("main");
        Some(location.join(format!("{rest}{suffix}")))
    }
}

impl<S: Into<String>, P: Into<PathBuf>> FromIterator<(S, P)> for PackageMap {
    fn from_iter<T: IntoIterator<Item = (S, P)>>(iter: T) -> Self {
        let mut map = PackageMap::new();
        for (name, location) in iter {
            map.insert(name, location);
        }
        map
    }
}

/// One loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    pub id: ModuleId,
    pub path: PathBuf,
    pub source: String,
    pub kind: ModuleKind,
    /// Dependency specifiers as written in the source.
    pub dependencies: Vec<String>,
}

/// Why a module could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// The package is not in the [`PackageMap`].
    UnknownPackage,
    /// The file does not exist or could not be read.
    Unreadable(String),
}

#[derive(Debug, Clone)]
enum Slot {
    Loaded(Arc<ModuleNode>),
    Missing(MissingReason),
}

#[derive(Debug)]
pub struct ModuleGraph {
    packages: PackageMap,
    source: Arc<dyn SourceProvider>,
    nodes: FxHashMap<ModuleId, Slot>,
}

impl ModuleGraph {
    pub fn new(packages: PackageMap, source: Arc<dyn SourceProvider>) -> Self {
        Self {
            packages,
            source,
            nodes: FxHashMap::default(),
        }
    }

    pub fn packages(&self) -> &PackageMap {
        &self.packages
    }

    pub fn source(&self) -> &Arc<dyn SourceProvider> {
        &self.source
    }

    /// Load (or fetch the cached) node for `id`.
    pub fn load(&mut self, id: &ModuleId) -> Result<Arc<ModuleNode>, MissingReason> {
        if let Some(slot) = self.nodes.get(id) {
            return match slot {
                Slot::Loaded(node) => Ok(Arc::clone(node)),
                Slot::Missing(reason) => Err(reason.clone()),
            };
        }

        let slot = self.read_node(id);
        self.nodes.insert(id.clone(), slot.clone());
        match slot {
            Slot::Loaded(node) => Ok(node),
            Slot::Missing(reason) => Err(reason),
        }
    }

    fn read_node(&self, id: &ModuleId) -> Slot {
        let Some(path) = self.packages.locate(id) else {
            return Slot::Missing(MissingReason::UnknownPackage);
        };
        match self.source.read_to_string(&path) {
            Ok(source) => {
                let scan = scan_dependencies(&source);
                tracing::debug!(
                    module = %id,
                    deps = scan.dependencies.len(),
                    "loaded module"
                );
                Slot::Loaded(Arc::new(ModuleNode {
                    id: id.clone(),
                    path,
                    source,
                    kind: scan.kind,
                    dependencies: scan.dependencies,
                }))
            }
            Err(RuntimeError::FileNotFound(p)) => {
                Slot::Missing(MissingReason::Unreadable(format!("{} not found", p.display())))
            }
            Err(e) => Slot::Missing(MissingReason::Unreadable(e.to_string())),
        }
    }

    /// A node previously loaded, without touching the source provider.
    pub fn get(&self, id: &ModuleId) -> Option<&ModuleNode> {
        match self.nodes.get(id) {
            Some(Slot::Loaded(node)) => Some(node),
            _ => None,
        }
    }

    pub fn is_missing(&self, id: &ModuleId) -> bool {
        matches!(self.nodes.get(id), Some(Slot::Missing(_)))
    }

    /// Number of modules loaded successfully so far.
    pub fn loaded_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|s| matches!(s, Slot::Loaded(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MemorySource;

    fn graph() -> ModuleGraph {
        let src = MemorySource::new()
            .file("/src/app/main.js", "define([\"./util\"], function(){});")
            .file("/src/app/util.js", "define([], 1);");
        let packages: PackageMap = [("app", "/src/app")].into_iter().collect();
        ModuleGraph::new(packages, Arc::new(src))
    }

    #[test]
    fn locates_modules_and_bare_packages() {
        let packages: PackageMap = [("app", "/src/app")].into_iter().collect();
        let id = ModuleId::new("app/widgets/Button").unwrap();
        assert_eq!(
            packages.locate(&id),
            Some(PathBuf::from("/src/app/widgets/Button.js"))
        );
        assert_eq!(
            packages.locate(&ModuleId::new("app").unwrap()),
            Some(PathBuf::from("/src/app/main.js"))
        );
        assert_eq!(packages.locate(&ModuleId::new("other/x").unwrap()), None);
    }

    #[test]
    fn loads_lazily_and_caches_missing() {
        let mut g = graph();
        let main = g.load(&ModuleId::new("app/main").unwrap()).unwrap();
        assert_eq!(main.dependencies, vec!["./util"]);
        assert_eq!(main.kind, ModuleKind::Amd);
        assert_eq!(g.loaded_count(), 1);

        let missing = ModuleId::new("app/gone").unwrap();
        assert!(matches!(g.load(&missing), Err(MissingReason::Unreadable(_))));
        assert!(g.is_missing(&missing));
        assert_eq!(
            g.load(&ModuleId::new("nope/x").unwrap()),
            Err(MissingReason::UnknownPackage)
        );
    }
}
