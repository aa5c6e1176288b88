//! Layer assembly.
//!
//! Every layer receives the ordered closure of its include list, minus
//! whatever its exclude list names and minus every module an earlier layer
//! already took. An exclude entry naming another layer removes that layer's
//! own content (computed on demand and memoized); any other entry removes
//! the module's full closure.

mod deps;

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use strata_graph::{Closure, ClosureEvent, ModuleGraph, ModuleId, SourceProvider, ordered_closure};

pub use deps::GraphDependencies;

use crate::control::{BuildControl, LayerSpec};
use crate::diagnostics::Diagnostics;
use crate::{Error, Result};

/// Final module assignment per layer.
#[derive(Debug)]
pub struct Resolution {
    /// Layer id to its modules in dependency order, in layer order.
    pub layers: IndexMap<ModuleId, Vec<ModuleId>>,
    /// Graph holding every module that was loaded along the way.
    pub graph: ModuleGraph,
}

impl Resolution {
    pub fn modules(&self, layer: &ModuleId) -> &[ModuleId] {
        self.layers.get(layer).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn total_modules(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    /// Layer a module was assigned to, if any.
    pub fn owner(&self, module: &ModuleId) -> Option<&ModuleId> {
        self.layers
            .iter()
            .find(|(_, modules)| modules.contains(module))
            .map(|(layer, _)| layer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Include,
    Exclude,
}

struct Assembler<'a> {
    control: &'a BuildControl,
    deps: GraphDependencies<'a>,
    diagnostics: &'a Diagnostics,
    own_content: FxHashMap<ModuleId, Vec<ModuleId>>,
    exclusions: FxHashMap<ModuleId, FxHashSet<ModuleId>>,
    module_closures: FxHashMap<ModuleId, Vec<ModuleId>>,
    in_progress: Vec<ModuleId>,
    reported: FxHashSet<(&'static str, String, String)>,
}

impl<'a> Assembler<'a> {
    fn report_once(&mut self, name: &'static str, a: &str, b: &str, args: [&str; 4]) {
        if self.reported.insert((name, a.to_string(), b.to_string())) {
            self.diagnostics.log(name, args);
        }
    }

    fn report(&mut self, layer: &ModuleId, closure: &Closure, role: Role) {
        for event in &closure.events {
            match event {
                ClosureEvent::Missing {
                    module,
                    referrer: None,
                } => {
                    let name = match role {
                        Role::Include => "amdMissingLayerIncludeModule",
                        Role::Exclude => "amdMissingLayerExcludeModule",
                    };
                    self.report_once(
                        name,
                        layer.as_str(),
                        module.as_str(),
                        ["layer", layer.as_str(), "module", module.as_str()],
                    );
                }
                ClosureEvent::Missing {
                    module,
                    referrer: Some(referrer),
                } => self.report_once(
                    "amdMissingDependency",
                    module.as_str(),
                    referrer.as_str(),
                    ["module", module.as_str(), "referrer", referrer.as_str()],
                ),
                ClosureEvent::Cycle { from, to } => self.report_cycle(from, to),
            }
        }
    }

    fn report_cycle(&mut self, from: &ModuleId, to: &ModuleId) {
        self.report_once(
            "amdCircularDependency",
            from.as_str(),
            to.as_str(),
            ["from", from.as_str(), "to", to.as_str()],
        );
    }

    /// Union of everything `layer`'s exclude list removes.
    fn excluded(&mut self, layer: &LayerSpec) -> FxHashSet<ModuleId> {
        let control = self.control;
        let mut set = FxHashSet::default();
        for entry in &layer.exclude {
            if control.is_layer(entry) {
                if self.in_progress.contains(entry) {
                    self.report_cycle(&layer.module_id, entry);
                    continue;
                }
                set.extend(self.layer_content(entry));
            } else {
                set.extend(self.module_closure(&layer.module_id, entry));
            }
        }
        set
    }

    /// A layer's own content, ignoring what earlier layers took.
    fn layer_content(&mut self, id: &ModuleId) -> Vec<ModuleId> {
        if let Some(content) = self.own_content.get(id) {
            return content.clone();
        }
        let control = self.control;
        let Some(layer) = control.layer(id) else {
            return Vec::new();
        };

        self.in_progress.push(id.clone());
        let excluded = self.excluded(layer);
        self.in_progress.pop();

        let roots: Vec<ModuleId> = layer.include.iter().cloned().collect();
        let closure = ordered_closure(&mut self.deps, &roots, |m| excluded.contains(m));
        self.report(id, &closure, Role::Include);
        self.exclusions.insert(id.clone(), excluded);
        self.own_content.insert(id.clone(), closure.order.clone());
        closure.order
    }

    fn module_closure(&mut self, layer: &ModuleId, module: &ModuleId) -> Vec<ModuleId> {
        if let Some(closure) = self.module_closures.get(module) {
            return closure.clone();
        }
        let closure = ordered_closure(&mut self.deps, std::slice::from_ref(module), |_| false);
        self.report(layer, &closure, Role::Exclude);
        self.module_closures.insert(module.clone(), closure.order.clone());
        closure.order
    }

    /// Ordered module list for `layer`: its include closure, stopping at its
    /// exclusions and at anything in `assigned`.
    fn compute_layer_contents(&mut self, layer: &LayerSpec, assigned: &FxHashSet<ModuleId>) -> Vec<ModuleId> {
        let id = &layer.module_id;
        self.layer_content(id);
        let excluded = self.exclusions.remove(id).unwrap_or_default();

        let roots: Vec<ModuleId> = layer.include.iter().cloned().collect();
        let closure = ordered_closure(&mut self.deps, &roots, |m| {
            excluded.contains(m) || assigned.contains(m)
        });
        self.report(id, &closure, Role::Include);
        tracing::debug!(layer = %id, modules = closure.order.len(), "layer resolved");
        closure.order
    }

    fn assign(&mut self) -> IndexMap<ModuleId, Vec<ModuleId>> {
        let control = self.control;
        let mut assigned: FxHashSet<ModuleId> = FxHashSet::default();
        let mut layers = IndexMap::with_capacity(control.layers.len());

        for (id, layer) in &control.layers {
            let contents = self.compute_layer_contents(layer, &assigned);
            assigned.extend(contents.iter().cloned());
            layers.insert(id.clone(), contents);
        }
        layers
    }
}

/// Compute every layer's module list.
///
/// Missing modules and cycles are logged and skipped. The only error is a
/// build in which no layer received a single module.
pub fn resolve_layers(
    control: &BuildControl,
    source: Arc<dyn SourceProvider>,
    diagnostics: &Diagnostics,
) -> Result<Resolution> {
    let mut graph = ModuleGraph::new(control.package_map(), source);

    let layers = {
        let deps = GraphDependencies::new(
            &mut graph,
            &control.base_package,
            &control.static_has,
            diagnostics,
        );
        let mut assembler = Assembler {
            control,
            deps,
            diagnostics,
            own_content: FxHashMap::default(),
            exclusions: FxHashMap::default(),
            module_closures: FxHashMap::default(),
            in_progress: Vec::new(),
            reported: FxHashSet::default(),
        };
        assembler.assign()
    };

    if layers.values().all(Vec::is_empty) {
        diagnostics.log("discoveryFailed", ["layers", &layers.len().to_string()]);
        return Err(Error::DiscoveryFailed(format!(
            "none of the {} layers resolved to a module",
            layers.len()
        )));
    }

    tracing::debug!(
        layers = layers.len(),
        loaded = graph.loaded_count(),
        "dependency resolution complete"
    );
    Ok(Resolution { layers, graph })
}

#[cfg(test)]
mod tests {
    use strata_config::{BuildProfile, LayerDecl, PackagePrefix};
    use strata_graph::MemorySource;

    use super::*;
    use crate::control::normalize;

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s).unwrap()
    }

    fn source(files: &[(&str, &str)]) -> Arc<dyn SourceProvider> {
        let src = MemorySource::new();
        src.add_file("/s/dojo/dojo.js", "var require;");
        src.add_file("/s/dojo/main.js", "define([], 1);");
        for (path, text) in files {
            src.add_file(*path, *text);
        }
        Arc::new(src)
    }

    fn profile(layers: Vec<LayerDecl>) -> BuildProfile {
        BuildProfile {
            base_path: Some("/s".into()),
            prefixes: vec![PackagePrefix::new("app", "../app")],
            layers,
            ..Default::default()
        }
    }

    fn run(p: BuildProfile, files: &[(&str, &str)]) -> (Result<Resolution>, Diagnostics) {
        let d = Diagnostics::new();
        let control = normalize(&p, "/", &d).unwrap();
        (resolve_layers(&control, source(files), &d), d)
    }

    const APP: &[(&str, &str)] = &[
        ("/s/app/main.js", r#"define(["./a", "./b"], 1);"#),
        ("/s/app/a.js", r#"define(["./util"], 1);"#),
        ("/s/app/b.js", r#"define(["./util"], 1);"#),
        ("/s/app/util.js", "define([], 1);"),
        ("/s/app/sub.js", r#"define(["./main", "./extra"], 1);"#),
        ("/s/app/extra.js", r#"define(["./util"], 1);"#),
    ];

    #[test]
    fn sub_layer_excludes_root_layer() {
        let (res, d) = run(
            profile(vec![
                LayerDecl::new("app/main").dependencies(["app/main"]),
                LayerDecl::new("app/sub")
                    .dependencies(["app/sub"])
                    .layer_dependencies(["app/main"]),
            ]),
            APP,
        );
        let res = res.unwrap();
        assert_eq!(
            res.modules(&id("app/main")),
            &[id("app/util"), id("app/a"), id("app/b"), id("app/main")]
        );
        assert_eq!(res.modules(&id("app/sub")), &[id("app/extra"), id("app/sub")]);
        assert_eq!(res.modules(&id("dojo/dojo")), &[id("dojo/main")]);
        assert_eq!(d.error_count(), 0, "{}", d.non_report_messages());
    }

    #[test]
    fn modules_land_in_the_first_layer_only() {
        let (res, _) = run(
            profile(vec![
                LayerDecl::new("app/a").dependencies(["app/a"]),
                LayerDecl::new("app/b").dependencies(["app/b"]),
            ]),
            APP,
        );
        let res = res.unwrap();
        assert_eq!(res.modules(&id("app/a")), &[id("app/util"), id("app/a")]);
        assert_eq!(res.modules(&id("app/b")), &[id("app/b")]);
        assert_eq!(res.owner(&id("app/util")), Some(&id("app/a")));
        assert_eq!(res.total_modules(), 4);
    }

    #[test]
    fn mutually_excluding_layers_report_one_cycle() {
        let (res, d) = run(
            profile(vec![
                LayerDecl::new("app/a")
                    .dependencies(["app/a"])
                    .layer_dependencies(["app/b"]),
                LayerDecl::new("app/b")
                    .dependencies(["app/b"])
                    .layer_dependencies(["app/a"]),
            ]),
            APP,
        );
        assert!(res.is_ok());
        assert_eq!(d.count("amdCircularDependency"), 1);
    }

    #[test]
    fn missing_modules_are_reported_once() {
        let (res, d) = run(
            profile(vec![
                LayerDecl::new("app/x").dependencies(["app/x", "app/nope"]),
                LayerDecl::new("app/y")
                    .dependencies(["app/y"])
                    .layer_dependencies(["app/x"]),
            ]),
            &[
                ("/s/app/x.js", r#"define(["./gone"], 1);"#),
                ("/s/app/y.js", r#"define(["./gone"], 1);"#),
            ],
        );
        assert!(res.is_ok());
        assert_eq!(d.count("amdMissingLayerIncludeModule"), 1);
        assert_eq!(d.count("amdMissingDependency"), 2);
    }

    #[test]
    fn module_cycles_are_reported_and_broken() {
        let (res, d) = run(
            profile(vec![LayerDecl::new("app/p").dependencies(["app/p"])]),
            &[
                ("/s/app/p.js", r#"define(["./q"], 1);"#),
                ("/s/app/q.js", r#"define(["./p"], 1);"#),
            ],
        );
        assert_eq!(res.unwrap().modules(&id("app/p")), &[id("app/q"), id("app/p")]);
        assert_eq!(d.count("amdCircularDependency"), 1);
    }

    #[test]
    fn excluded_plain_module_removes_its_closure() {
        let d = Diagnostics::new();
        let p = profile(vec![LayerDecl::new("app/sub").dependencies(["app/sub"])]);
        let mut control = normalize(&p, "/", &d).unwrap();
        let sub = control.layers.get_mut(&id("app/sub")).unwrap();
        sub.exclude.insert(id("app/a"));
        sub.exclude.insert(id("app/missing"));

        let res = resolve_layers(&control, source(APP), &d).unwrap();
        assert_eq!(
            res.modules(&id("app/sub")),
            &[id("app/b"), id("app/main"), id("app/extra"), id("app/sub")]
        );
        assert_eq!(d.count("amdMissingLayerExcludeModule"), 1);
    }

    #[test]
    fn empty_build_fails_discovery() {
        let d = Diagnostics::new();
        let p = profile(vec![LayerDecl::new("app/none").dependencies(["app/none"])]);
        let control = normalize(&p, "/", &d).unwrap();
        let src: Arc<dyn SourceProvider> = Arc::new(MemorySource::new());
        let err = resolve_layers(&control, src, &d).unwrap_err();
        assert!(matches!(err, Error::DiscoveryFailed(_)));
        assert_eq!(d.count("discoveryFailed"), 1);
    }
}
