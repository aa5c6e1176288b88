//! Profile normalization.
//!
//! [`normalize`] turns a [`BuildProfile`] into a [`BuildControl`]: every
//! package has one absolute location, every layer is keyed by one canonical
//! module id, option strings are parsed into typed values, and the bootstrap
//! layer `<base>/<base>` always exists. Problems in the profile are logged
//! to the [`Diagnostics`] registry and normalization carries on with
//! best-effort defaults.

mod runtime_config;
mod version;

pub use runtime_config::{RuntimeConfig, merge_default_config};
pub use version::{Version, stamp_version};

use std::path::PathBuf;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde_json::{Map, Value};

use strata_config::{
    BuildProfile, CssOptimize, LayerDecl, OptimizeSetting, StripConsole, StripConsoleParse,
    ThemeConfig, default_boot_text,
};
use strata_graph::paths::{cat_path, compute_path, get_absolute_path, is_absolute_path};
use strata_graph::{ModuleId, PackageMap};

use crate::diagnostics::Diagnostics;
use crate::{Error, Result};

/// Legacy switches that are accepted and ignored.
static DEPRECATED_KEYS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:loader|xdDojoPath|symbol|scopeDjConfig|xdScopeArgs|xdDojoScopeName|expandProvide|buildLayers|query|removeDefaultNameSpaces|addGuards)$",
    )
    .expect("valid regex")
});

/// A top-level package with its resolved location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    /// Absolute, slash-separated.
    pub location: String,
    pub copyright: Option<String>,
    pub runtime: Option<String>,
    /// `false` when the location was defaulted.
    pub declared: bool,
}

/// Canonical description of one output layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub module_id: ModuleId,
    /// Name as written in the profile.
    pub name: String,
    pub include: IndexSet<ModuleId>,
    /// Layer ids (whose contents are excluded) or plain modules (whose
    /// transitive closure is excluded).
    pub exclude: IndexSet<ModuleId>,
    pub boot: bool,
    pub boot_text: Option<String>,
    pub discard: bool,
    pub custom_base: bool,
    pub copyright: String,
}

impl LayerSpec {
    fn new(module_id: ModuleId, name: impl Into<String>) -> Self {
        Self {
            module_id,
            name: name.into(),
            include: IndexSet::new(),
            exclude: IndexSet::new(),
            boot: false,
            boot_text: None,
            discard: false,
            custom_base: false,
            copyright: String::new(),
        }
    }

    /// Output path relative to the destination root.
    pub fn filename(&self) -> String {
        format!("{}.js", self.module_id)
    }
}

/// Normalized, read-only build description.
#[derive(Debug, Clone)]
pub struct BuildControl {
    pub base_package: String,
    /// Absolute directory relative paths in the profile are resolved against.
    pub base_path: String,
    pub packages: IndexMap<String, PackageInfo>,
    /// Layers in processing order; the bootstrap layer is always first.
    pub layers: IndexMap<ModuleId, LayerSpec>,
    pub bootstrap: ModuleId,
    pub locales: Vec<String>,
    /// Absolute release destination.
    pub dest_base_path: String,
    pub version: Option<Version>,
    pub layer_optimize: OptimizeSetting,
    pub css_optimize: CssOptimize,
    pub strip_console: StripConsole,
    pub intern_strings: bool,
    pub intern_skip_list: Vec<String>,
    pub static_has: IndexMap<String, Value>,
    pub runtime_config: RuntimeConfig,
    pub user_config: Map<String, Value>,
    pub theme: Option<ThemeConfig>,
    /// Appended to the bootstrap layer after its body.
    pub boot_text: String,
    /// Unrecognized profile keys, carried along untouched.
    pub extra: IndexMap<String, Value>,
}

impl BuildControl {
    pub fn package_map(&self) -> PackageMap {
        self.packages
            .iter()
            .map(|(name, info)| (name.clone(), PathBuf::from(&info.location)))
            .collect()
    }

    pub fn layer(&self, id: &ModuleId) -> Option<&LayerSpec> {
        self.layers.get(id)
    }

    pub fn is_layer(&self, id: &ModuleId) -> bool {
        self.layers.contains_key(id)
    }

    /// Location of the base package.
    pub fn base_location(&self) -> &str {
        self.packages
            .get(&self.base_package)
            .map_or(self.base_path.as_str(), |p| p.location.as_str())
    }
}

/// Normalize `profile`, resolving relative paths against `cwd`.
///
/// Only an unusable base package is a hard error; everything else is
/// reported through `diagnostics`.
pub fn normalize(profile: &BuildProfile, cwd: &str, diagnostics: &Diagnostics) -> Result<BuildControl> {
    let base = profile.base_package.as_str();
    let bootstrap = ModuleId::new(format!("{base}/{base}"))
        .map_err(|e| Error::InvalidConfig(format!("base package '{base}': {e}")))?;
    let base_main = ModuleId::new(format!("{base}/main"))
        .map_err(|e| Error::InvalidConfig(format!("base package '{base}': {e}")))?;

    let base_path = get_absolute_path(profile.base_path.as_deref().unwrap_or("."), cwd);
    if !is_absolute_path(&base_path) {
        diagnostics.log("inputInvalidPath", ["path", base_path.as_str(), "cwd", cwd]);
    }
    if profile.base_path.is_none()
        && profile
            .prefix(base)
            .is_some_and(|p| !is_absolute_path(&p.location))
    {
        diagnostics.pacify(&format!(
            "no base_path given; relative location of package '{base}' resolves against {base_path}"
        ));
    }

    for key in profile.extra.keys() {
        if DEPRECATED_KEYS.is_match(key) {
            diagnostics.log("inputDeprecated", ["switch", key.as_str()]);
        }
    }

    let packages = resolve_packages(profile, &base_path, diagnostics);
    let base_location = packages
        .get(base)
        .map_or_else(|| base_path.clone(), |p| p.location.clone());

    let default_copyright = format!(
        "{}{}",
        profile.copyright.as_deref().unwrap_or_default(),
        profile.build_notice.as_deref().unwrap_or_default()
    );
    let copyright_for = |decl: Option<&LayerDecl>, id: &ModuleId| -> String {
        decl.and_then(|d| d.copyright.clone())
            .or_else(|| packages.get(id.top_level()).and_then(|p| p.copyright.clone()))
            .unwrap_or_else(|| default_copyright.clone())
    };

    let mut layers: IndexMap<ModuleId, LayerSpec> = IndexMap::new();
    let mut boot_layer = LayerSpec::new(bootstrap.clone(), bootstrap.as_str());
    boot_layer.include.insert(base_main.clone());
    boot_layer.copyright = copyright_for(None, &bootstrap);
    layers.insert(bootstrap.clone(), boot_layer);

    let mut names: IndexMap<String, ModuleId> = IndexMap::new();
    let mut accepted: Vec<(&LayerDecl, ModuleId)> = Vec::new();

    for decl in &profile.layers {
        let Some(id) = layer_mid(&decl.name, &base_location, &packages) else {
            diagnostics.log("layerToMidFailed", ["layer", decl.name.as_str()]);
            continue;
        };

        let mut include = IndexSet::new();
        for dep in &decl.dependencies {
            match dependency_mid(dep, &packages) {
                Some(mid) => {
                    include.insert(mid);
                }
                None => diagnostics.log(
                    "amdMissingLayerIncludeModule",
                    ["layer", decl.name.as_str(), "module", dep.as_str()],
                ),
            }
        }

        if id == bootstrap {
            if let Some(layer) = layers.get_mut(&bootstrap) {
                if decl.custom_base {
                    layer.include = include;
                    layer.custom_base = true;
                } else {
                    layer.include.extend(include);
                }
                layer.name = decl.name.clone();
                layer.boot |= decl.boot;
                layer.discard |= decl.discard;
                if decl.boot_text.is_some() {
                    layer.boot_text = decl.boot_text.clone();
                }
                if let Some(copyright) = &decl.copyright {
                    layer.copyright = copyright.clone();
                }
            }
        } else if layers.contains_key(&id) {
            diagnostics.log(
                "outputCollide",
                ["layer", decl.name.as_str(), "module", id.as_str()],
            );
            continue;
        } else {
            let mut layer = LayerSpec::new(id.clone(), decl.name.as_str());
            layer.include = include;
            layer.boot = decl.boot;
            layer.boot_text = decl.boot_text.clone();
            layer.discard = decl.discard;
            layer.custom_base = decl.custom_base;
            layer.copyright = copyright_for(Some(decl), &id);
            if !decl.custom_base {
                layer.exclude.insert(bootstrap.clone());
            }
            layers.insert(id.clone(), layer);
        }

        names.insert(decl.name.clone(), id.clone());
        accepted.push((decl, id));
    }

    for (decl, id) in &accepted {
        for dep in &decl.layer_dependencies {
            let target = names.get(dep).cloned().or_else(|| {
                layer_mid(dep, &base_location, &packages).filter(|mid| layers.contains_key(mid))
            });
            match target {
                Some(target) => {
                    if let Some(layer) = layers.get_mut(id) {
                        layer.exclude.insert(target);
                    }
                }
                None => diagnostics.log(
                    "layerMissingDependency",
                    ["layer", decl.name.as_str(), "dependency", dep.as_str()],
                ),
            }
        }
    }

    let dest_base_path = match &profile.dest_base_path {
        Some(dest) => {
            if profile.release_dir.is_some() || profile.release_name.is_some() {
                diagnostics.log("ignoringReleaseDirName", ["destBasePath", dest.as_str()]);
            }
            compute_path(dest, &base_path)
        }
        None => compute_path(
            &cat_path(profile.release_dir(), profile.release_name()),
            &base_path,
        ),
    };

    let layer_optimize = OptimizeSetting::parse(&profile.layer_optimize).unwrap_or_else(|| {
        diagnostics.log(
            "inputUnknownLayerOptimize",
            ["layerOptimize", profile.layer_optimize.as_str()],
        );
        OptimizeSetting::default()
    });
    let css_optimize = CssOptimize::parse(&profile.css_optimize).unwrap_or_else(|| {
        diagnostics.log("inputUnknownOptimize", ["cssOptimize", profile.css_optimize.as_str()]);
        CssOptimize::default()
    });
    let strip_console = match StripConsole::parse(&profile.strip_console) {
        StripConsoleParse::Known(level) => level,
        StripConsoleParse::Deprecated(level) => {
            diagnostics.log(
                "inputDeprecatedStripConsole",
                ["stripConsole", profile.strip_console.as_str()],
            );
            level
        }
        StripConsoleParse::Unknown => {
            diagnostics.log(
                "inputUnknownStripConsole",
                ["stripConsole", profile.strip_console.as_str()],
            );
            StripConsole::default()
        }
    };

    let version = profile.version.as_deref().map(|v| {
        diagnostics.log("packageVersion", [v]);
        Version::parse(v)
    });

    let runtime_config = merge_default_config(&profile.default_config, diagnostics);

    tracing::debug!(
        packages = packages.len(),
        layers = layers.len(),
        dest = %dest_base_path,
        "normalized build profile"
    );

    Ok(BuildControl {
        base_package: profile.base_package.clone(),
        base_path,
        packages,
        layers,
        bootstrap,
        locales: profile.locales.clone(),
        dest_base_path,
        version,
        layer_optimize,
        css_optimize,
        strip_console,
        intern_strings: profile.intern_strings,
        intern_skip_list: profile.intern_skip_list.clone(),
        static_has: profile.static_has_features.clone(),
        runtime_config,
        user_config: profile.user_config.clone(),
        theme: profile.theme.clone(),
        boot_text: profile
            .boot_text
            .clone()
            .unwrap_or_else(|| default_boot_text(base)),
        extra: profile.extra.clone(),
    })
}

/// Base package first, then declared prefixes, then packages referenced by a
/// layer but never declared (sibling directories of the base package).
fn resolve_packages(
    profile: &BuildProfile,
    base_path: &str,
    diagnostics: &Diagnostics,
) -> IndexMap<String, PackageInfo> {
    let base = profile.base_package.as_str();
    let base_prefix = profile.prefix(base);
    let base_location = match base_prefix {
        Some(p) => compute_path(&p.location, base_path),
        None => compute_path(base, base_path),
    };

    let mut packages = IndexMap::new();
    packages.insert(
        base.to_string(),
        PackageInfo {
            name: base.to_string(),
            location: base_location.clone(),
            copyright: base_prefix.and_then(|p| p.copyright.clone()),
            runtime: base_prefix.and_then(|p| p.runtime.clone()),
            declared: true,
        },
    );

    for prefix in &profile.prefixes {
        if prefix.name == base {
            continue;
        }
        packages.insert(
            prefix.name.clone(),
            PackageInfo {
                name: prefix.name.clone(),
                location: compute_path(&prefix.location, &base_location),
                copyright: prefix.copyright.clone(),
                runtime: prefix.runtime.clone(),
                declared: true,
            },
        );
    }

    for layer in &profile.layers {
        for dep in &layer.dependencies {
            let Ok(id) = ModuleId::new(dep) else {
                continue;
            };
            let top = id.top_level();
            if packages.contains_key(top) {
                continue;
            }
            diagnostics.log(
                "configUndeclaredPackage",
                ["package", top, "layer", layer.name.as_str()],
            );
            packages.insert(
                top.to_string(),
                PackageInfo {
                    name: top.to_string(),
                    location: compute_path(&format!("../{top}"), &base_location),
                    copyright: None,
                    runtime: None,
                    declared: false,
                },
            );
        }
    }

    packages
}

/// Canonical module id for a layer name.
///
/// Names ending in `.js` are filenames relative to the base package and are
/// mapped back through the package table (longest location wins, matched on
/// a directory boundary). Anything else is a module id in slashed or dotted
/// form.
fn layer_mid(
    name: &str,
    base_location: &str,
    packages: &IndexMap<String, PackageInfo>,
) -> Option<ModuleId> {
    if !name.ends_with(".js") {
        return ModuleId::new(name).ok();
    }
    let filename = compute_path(name, base_location);
    let (package, info) = packages
        .iter()
        .filter(|(_, p)| {
            filename.len() > p.location.len()
                && filename.starts_with(p.location.as_str())
                && filename.as_bytes()[p.location.len()] == b'/'
        })
        .max_by_key(|(_, p)| p.location.len())?;
    let rest = filename[info.location.len() + 1..].trim_end_matches(".js");
    ModuleId::new(format!("{package}/{rest}")).ok()
}

/// A layer dependency as a module id; a bare package name means its `main`.
fn dependency_mid(dep: &str, packages: &IndexMap<String, PackageInfo>) -> Option<ModuleId> {
    let id = ModuleId::new(dep).ok()?;
    if id.rest().is_none() && packages.contains_key(id.as_str()) {
        return id.join("main").ok();
    }
    Some(id)
}
