//! Dependency normalization over the lazily loaded module graph.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;

use strata_graph::scan::split_plugin;
use strata_graph::{DependencySource, ModuleGraph, ModuleId, ModuleKind, ModuleNode};

use crate::diagnostics::Diagnostics;
use crate::transform::has::{HasResolution, resolve_has_expression};

/// [`DependencySource`] backed by a [`ModuleGraph`].
///
/// Specifiers are normalized once per module: relative ids resolve against
/// the referrer, `plugin!resource` contributes the plugin module, bare
/// package ids mean the package's `main`, and `<base>/has!feature?a:b` is
/// decided against the static feature table.
pub struct GraphDependencies<'a> {
    graph: &'a mut ModuleGraph,
    static_has: &'a IndexMap<String, Value>,
    has_plugin: String,
    diagnostics: &'a Diagnostics,
    edges: FxHashMap<ModuleId, Option<Vec<ModuleId>>>,
}

impl<'a> GraphDependencies<'a> {
    pub fn new(
        graph: &'a mut ModuleGraph,
        base_package: &str,
        static_has: &'a IndexMap<String, Value>,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            graph,
            static_has,
            has_plugin: format!("{base_package}/has"),
            diagnostics,
            edges: FxHashMap::default(),
        }
    }

    pub fn graph(&self) -> &ModuleGraph {
        self.graph
    }

    fn canonical(&self, id: ModuleId) -> ModuleId {
        if id.rest().is_none() && self.graph.packages().contains(id.as_str()) {
            if let Ok(main) = id.join("main") {
                return main;
            }
        }
        id
    }

    fn resolve_spec(&self, referrer: &ModuleId, spec: &str) -> Option<ModuleId> {
        match referrer.resolve(spec) {
            Ok(id) => Some(self.canonical(id)),
            Err(e) => {
                tracing::debug!(module = %referrer, %spec, error = %e, "unresolvable specifier");
                self.diagnostics.log(
                    "amdMissingDependency",
                    ["module", spec, "referrer", referrer.as_str()],
                );
                None
            }
        }
    }

    fn normalize(&mut self, node: &ModuleNode) -> Vec<ModuleId> {
        let referrer = &node.id;
        let mut deps: Vec<ModuleId> = Vec::with_capacity(node.dependencies.len());
        let mut push = |deps: &mut Vec<ModuleId>, id: ModuleId| {
            if !deps.contains(&id) {
                deps.push(id);
            }
        };

        for spec in &node.dependencies {
            let (plugin, resource) = split_plugin(spec);
            let Some(target) = self.resolve_spec(referrer, plugin) else {
                continue;
            };
            let is_has = resource.is_some() && target.as_str() == self.has_plugin;
            push(&mut deps, target);

            let Some(resource) = resource.filter(|_| is_has) else {
                continue;
            };
            match resolve_has_expression(resource, self.static_has) {
                HasResolution::Module(chosen) => {
                    let Some(chosen) = self.resolve_spec(referrer, &chosen) else {
                        continue;
                    };
                    if self.graph.load(&chosen).is_ok() {
                        push(&mut deps, chosen);
                    } else {
                        self.diagnostics.log(
                            "dojoHasMissingModule",
                            ["module", chosen.as_str(), "referrer", referrer.as_str()],
                        );
                    }
                }
                HasResolution::Empty => {}
                HasResolution::Unresolved(feature) => self.diagnostics.log(
                    "dojoHasUnresolvedMid",
                    [
                        "resource",
                        resource,
                        "feature",
                        feature.as_str(),
                        "referrer",
                        referrer.as_str(),
                    ],
                ),
            }
        }
        deps
    }
}

impl DependencySource for GraphDependencies<'_> {
    fn dependencies(&mut self, id: &ModuleId) -> Option<Vec<ModuleId>> {
        if let Some(cached) = self.edges.get(id) {
            return cached.clone();
        }
        let result = match self.graph.load(id) {
            Ok(node) => {
                if node.kind == ModuleKind::Legacy {
                    self.diagnostics.log("legacyAssumed", ["module", id.as_str()]);
                }
                Some(self.normalize(&node))
            }
            Err(reason) => {
                tracing::debug!(module = %id, ?reason, "module not found");
                None
            }
        };
        self.edges.insert(id.clone(), result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use strata_graph::{MemorySource, PackageMap};

    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s).unwrap()
    }

    fn graph(files: &[(&str, &str)]) -> ModuleGraph {
        let src = MemorySource::new();
        for (path, text) in files {
            src.add_file(*path, *text);
        }
        let packages: PackageMap = [("dojo", "/s/dojo"), ("app", "/s/app")].into_iter().collect();
        ModuleGraph::new(packages, Arc::new(src))
    }

    #[test]
    fn normalizes_relative_plugin_and_bare_ids() {
        let mut g = graph(&[(
            "/s/app/views/list.js",
            r#"define(["require", "../store", "dojo/text!./list.html", "dojo", "dojo/i18n!../nls/strings"], function(){});"#,
        )]);
        let features = IndexMap::new();
        let d = Diagnostics::new();
        let mut deps = GraphDependencies::new(&mut g, "dojo", &features, &d);
        let out = deps.dependencies(&id("app/views/list")).unwrap();
        assert_eq!(
            out,
            vec![id("app/store"), id("dojo/text"), id("dojo/main"), id("dojo/i18n")]
        );
        assert_eq!(d.error_count(), 0);
    }

    #[test]
    fn has_plugin_is_decided_statically() {
        let mut g = graph(&[
            (
                "/s/app/a.js",
                r#"define(["dojo/has!dom?./dom:./node", "dojo/has!touch?./touch", "dojo/has!host-node?./gone"], 1);"#,
            ),
            ("/s/app/dom.js", "define([], 1);"),
        ]);
        let features: IndexMap<String, Value> =
            [("dom".to_string(), json!(1)), ("host-node".to_string(), json!(1))]
                .into_iter()
                .collect();
        let d = Diagnostics::new();
        let mut deps = GraphDependencies::new(&mut g, "dojo", &features, &d);
        let out = deps.dependencies(&id("app/a")).unwrap();

        assert_eq!(out, vec![id("dojo/has"), id("app/dom")]);
        assert_eq!(d.count("dojoHasUnresolvedMid"), 1);
        assert_eq!(d.count("dojoHasMissingModule"), 1);
    }

    #[test]
    fn legacy_modules_are_noted_once() {
        let mut g = graph(&[
            ("/s/app/old.js", "dojo.provide(\"app.old\");\ndojo.require(\"app.util\");"),
            ("/s/app/util.js", "define([], 1);"),
        ]);
        let features = IndexMap::new();
        let d = Diagnostics::new();
        let mut deps = GraphDependencies::new(&mut g, "dojo", &features, &d);
        deps.dependencies(&id("app/old"));
        deps.dependencies(&id("app/old"));
        deps.dependencies(&id("app/util"));
        assert_eq!(d.occurrences("legacyAssumed"), vec![vec!["module".to_string(), "app/old".to_string()]]);
    }

    #[test]
    fn missing_modules_and_cache() {
        let mut g = graph(&[]);
        let features = IndexMap::new();
        let d = Diagnostics::new();
        let mut deps = GraphDependencies::new(&mut g, "dojo", &features, &d);
        assert!(deps.dependencies(&id("app/none")).is_none());
        assert!(deps.dependencies(&id("app/none")).is_none());
        assert!(deps.graph().is_missing(&id("app/none")));
    }
}
