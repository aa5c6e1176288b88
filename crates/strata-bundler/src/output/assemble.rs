//! Raw layer text, before any transform runs.

use serde_json::{Map, Value};

use strata_graph::paths::relative_path;
use strata_graph::scan::name_anonymous_define;
use strata_graph::{ModuleGraph, ModuleId};

use crate::control::{BuildControl, LayerSpec, stamp_version};
use crate::diagnostics::Diagnostics;
use crate::resolve::Resolution;

/// User configuration used when the profile supplies none.
const FALLBACK_USER_CONFIG: &str = "this.dojoConfig || this.djConfig || this.require || {}";

/// Module sources in order, each anonymous `define(` given its module id.
pub fn layer_body(modules: &[ModuleId], graph: &ModuleGraph) -> String {
    modules
        .iter()
        .filter_map(|id| {
            let node = graph.get(id)?;
            Some(name_anonymous_define(&node.source, id.as_str()).into_owned())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `(<user config>, <default config>);` for the bootstrap layer.
pub fn config_stub(control: &BuildControl) -> String {
    let user = if control.user_config.is_empty() {
        FALLBACK_USER_CONFIG.to_string()
    } else {
        Value::Object(control.user_config.clone()).to_string()
    };

    let base_location = control.base_location();
    let packages: Vec<Value> = control
        .packages
        .values()
        .map(|pkg| {
            let mut entry = Map::new();
            entry.insert("name".into(), Value::String(pkg.name.clone()));
            entry.insert(
                "location".into(),
                Value::String(relative_path(base_location, &pkg.location)),
            );
            if let Some(overrides) = control.runtime_config.package_overrides.get(&pkg.name) {
                entry.extend(overrides.clone());
            }
            Value::Object(entry)
        })
        .collect();

    let mut defaults = Map::new();
    defaults.insert("packages".into(), Value::Array(packages));
    defaults.extend(control.runtime_config.defaults.clone());

    format!("({user}, {});\n", Value::Object(defaults))
}

/// Text appended to a `boot` layer: its own boot text, or a `require` of
/// its includes.
pub fn boot_suffix(layer: &LayerSpec) -> String {
    match &layer.boot_text {
        Some(text) => text.clone(),
        None => {
            let ids = layer
                .include
                .iter()
                .map(|id| format!("\"{id}\""))
                .collect::<Vec<_>>()
                .join(",");
            format!("require([{ids}]);")
        }
    }
}

/// Produces each layer's raw text for one resolved build.
pub struct LayerAssembly<'a> {
    control: &'a BuildControl,
    resolution: &'a Resolution,
    loader: Option<String>,
}

impl<'a> LayerAssembly<'a> {
    /// Reads the loader, the source of the bootstrap module itself.
    pub fn new(control: &'a BuildControl, resolution: &'a Resolution) -> Self {
        let graph = &resolution.graph;
        let loader = graph
            .packages()
            .locate(&control.bootstrap)
            .and_then(|path| graph.source().read_to_string(&path).ok());
        if loader.is_none() {
            tracing::debug!(bootstrap = %control.bootstrap, "no loader source found");
        }
        Self {
            control,
            resolution,
            loader,
        }
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    fn bootstrap_text(&self) -> String {
        let control = self.control;
        let body = layer_body(self.resolution.modules(&control.bootstrap), &self.resolution.graph);
        let mut text = String::new();
        if let Some(loader) = &self.loader {
            text.push_str(loader);
            if !loader.ends_with('\n') {
                text.push('\n');
            }
        }
        text.push_str(&config_stub(control));
        text.push_str(&stamp_version(control.version.as_ref(), &body));
        text.push_str(&control.boot_text);
        text
    }

    /// Raw text for `layer`, or `None` for discard layers.
    pub fn text(&self, layer: &LayerSpec, diagnostics: &Diagnostics) -> Option<String> {
        if layer.discard {
            return None;
        }
        if layer.module_id == self.control.bootstrap {
            return Some(self.bootstrap_text());
        }

        let body = layer_body(self.resolution.modules(&layer.module_id), &self.resolution.graph);
        if !layer.boot {
            return Some(body);
        }
        if self.loader.is_none() {
            diagnostics.log("inputNoLoaderForBoot", ["layer", layer.module_id.as_str()]);
        }
        Some(format!("{}\n{body}\n{}", self.bootstrap_text(), boot_suffix(layer)))
    }
}
