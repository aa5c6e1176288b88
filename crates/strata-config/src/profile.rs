//! Typed build profile schema.
//!
//! A profile is plain data: package prefixes, layer declarations and scalar
//! build switches. It is never evaluated as code. Keys written in the older
//! camelCase spelling (`layerDependencies`, `localeList`, ...) are accepted as
//! aliases so existing profiles keep loading, and unknown keys are captured in
//! [`BuildProfile::extra`] so the normalizer can report them.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ConfigError;

/// Locales built when a profile does not name its own.
pub const DEFAULT_LOCALES: &str = "ar,ca,cs,da,de-de,el,en-gb,en-us,es-es,fi-fi,fr-fr,he-il,hu,it-it,ja-jp,ko-kr,nl-nl,nb,pl,pt-br,pt-pt,ru,sk,sl,sv,th,tr,zh-tw,zh-cn";

pub const DEFAULT_RELEASE_NAME: &str = "dojo";
pub const DEFAULT_RELEASE_DIR: &str = "../../release/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildProfile {
    #[serde(alias = "packagePrefixes")]
    pub prefixes: Vec<PackagePrefix>,

    pub layers: Vec<LayerDecl>,

    /// Top-level package that carries the loader and `<base>/main`.
    #[serde(alias = "basePackage")]
    pub base_package: String,

    /// Directory of the base package, relative to the build's working directory.
    #[serde(alias = "basePath", skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    #[serde(alias = "localeList", with = "locale_list")]
    pub locales: Vec<String>,

    #[serde(alias = "releaseName", skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,

    #[serde(alias = "releaseDir", skip_serializing_if = "Option::is_none")]
    pub release_dir: Option<String>,

    #[serde(alias = "destBasePath", skip_serializing_if = "Option::is_none")]
    pub dest_base_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(alias = "layerOptimize")]
    pub layer_optimize: String,

    #[serde(alias = "cssOptimize")]
    pub css_optimize: String,

    #[serde(alias = "stripConsole")]
    pub strip_console: String,

    #[serde(alias = "internStrings")]
    pub intern_strings: bool,

    #[serde(alias = "internSkipList")]
    pub intern_skip_list: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,

    #[serde(alias = "buildNotice", skip_serializing_if = "Option::is_none")]
    pub build_notice: Option<String>,

    #[serde(alias = "staticHasFeatures")]
    pub static_has_features: IndexMap<String, Value>,

    /// Runtime configuration baked into the bootstrap layer.
    #[serde(alias = "defaultConfig")]
    pub default_config: Map<String, Value>,

    /// Caller configuration placed ahead of `default_config` in the bootstrap stub.
    #[serde(alias = "userConfig")]
    pub user_config: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeConfig>,

    /// Appended to the bootstrap layer; [`default_boot_text`] when absent.
    #[serde(alias = "dojoBootText", skip_serializing_if = "Option::is_none")]
    pub boot_text: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Default for BuildProfile {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            layers: Vec::new(),
            base_package: "dojo".to_string(),
            base_path: None,
            locales: split_locales(DEFAULT_LOCALES),
            release_name: None,
            release_dir: None,
            dest_base_path: None,
            version: None,
            layer_optimize: "shrinksafe".to_string(),
            css_optimize: String::new(),
            strip_console: "normal".to_string(),
            intern_strings: true,
            intern_skip_list: Vec::new(),
            copyright: None,
            build_notice: None,
            static_has_features: default_static_has_features(),
            default_config: default_runtime_config(),
            user_config: Map::new(),
            theme: None,
            boot_text: None,
            extra: IndexMap::new(),
        }
    }
}

impl BuildProfile {
    /// Release name, falling back to the conventional default.
    pub fn release_name(&self) -> &str {
        self.release_name.as_deref().unwrap_or(DEFAULT_RELEASE_NAME)
    }

    pub fn release_dir(&self) -> &str {
        self.release_dir.as_deref().unwrap_or(DEFAULT_RELEASE_DIR)
    }

    /// Look up a declared prefix by its top-level id.
    pub fn prefix(&self, name: &str) -> Option<&PackagePrefix> {
        self.prefixes.iter().find(|p| p.name == name)
    }
}

/// One `[topLevelId, location, copyright?, runtime?]` declaration.
///
/// Accepted either as a two to four element array or as a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPrefix")]
pub struct PackagePrefix {
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl PackagePrefix {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            copyright: None,
            runtime: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrefix {
    Tuple(Vec<String>),
    Table {
        name: String,
        location: String,
        #[serde(default)]
        copyright: Option<String>,
        #[serde(default)]
        runtime: Option<String>,
    },
}

impl TryFrom<RawPrefix> for PackagePrefix {
    type Error = ConfigError;

    fn try_from(raw: RawPrefix) -> Result<Self, Self::Error> {
        let prefix = match raw {
            RawPrefix::Tuple(parts) => {
                if !(2..=4).contains(&parts.len()) {
                    return Err(ConfigError::InvalidPrefix {
                        message: format!(
                            "expected [name, location, copyright?, runtime?], got {} element(s)",
                            parts.len()
                        ),
                    });
                }
                let mut parts = parts.into_iter();
                PackagePrefix {
                    name: parts.next().unwrap_or_default(),
                    location: parts.next().unwrap_or_default(),
                    copyright: parts.next(),
                    runtime: parts.next(),
                }
            }
            RawPrefix::Table {
                name,
                location,
                copyright,
                runtime,
            } => PackagePrefix {
                name,
                location,
                copyright,
                runtime,
            },
        };

        if prefix.name.trim().is_empty() {
            return Err(ConfigError::InvalidPrefix {
                message: "package name cannot be empty".to_string(),
            });
        }
        if prefix.name.contains('/') || prefix.name.contains('.') {
            return Err(ConfigError::InvalidPrefix {
                message: format!("'{}' is not a top-level package name", prefix.name),
            });
        }
        Ok(prefix)
    }
}

/// A declared output bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDecl {
    /// Output filename (`../app/layer.js`) or module id (`app.layer`, `app/layer`).
    pub name: String,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default, alias = "layerDependencies")]
    pub layer_dependencies: Vec<String>,

    /// Also emit a standalone variant carrying the loader.
    #[serde(default)]
    pub boot: bool,

    #[serde(default, alias = "bootText", skip_serializing_if = "Option::is_none")]
    pub boot_text: Option<String>,

    /// Resolve the layer for exclusion purposes but do not write it.
    #[serde(default)]
    pub discard: bool,

    /// Do not implicitly exclude the bootstrap layer.
    #[serde(default, alias = "customBase")]
    pub custom_base: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl LayerDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn layer_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layer_dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Theme stylesheet collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Theme directory name under `root`, e.g. `claro`.
    pub name: String,

    /// Module-id style directory holding themes, e.g. `dijit/themes`.
    #[serde(default = "default_theme_root")]
    pub root: String,

    /// Extra module-id style directories copied verbatim (icons, images).
    #[serde(default, alias = "extraDirs")]
    pub extra_dirs: Vec<String>,
}

fn default_theme_root() -> String {
    "dijit/themes".to_string()
}

pub fn split_locales(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_static_has_features() -> IndexMap<String, Value> {
    [
        ("dojo-1x-base", 1),
        ("dojo-built", 1),
        ("dojo-combo-api", 0),
        ("dojo-log-api", 1),
        ("dojo-test-sniff", 0),
        ("dojo-loader", 1),
        ("dojo-publish-privates", 0),
        ("dojo-requirejs-api", 0),
        ("dojo-sync-loader", 1),
        ("dojo-trace-api", 0),
        ("dojo-undef-api", 0),
        ("dom", 1),
        ("host-browser", 1),
        ("host-node", 0),
        ("host-rhino", 0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), json!(v)))
    .collect()
}

/// Tail of the bootstrap layer: starts the loader on `<base>` once the
/// configuration stub has run.
pub fn default_boot_text(base_package: &str) -> String {
    format!(
        "\n(function(){{ require({{cache:{{}}}}); !require.async && require([\"{base_package}\"]); require.boot && require.apply(null, require.boot); }})();\n"
    )
}

/// Runtime configuration every bootstrap layer starts from.
pub fn default_runtime_config() -> Map<String, Value> {
    let value = json!({
        "hasCache": {
            "dojo-built": 1,
            "dojo-loader": 1,
            "dom": 1,
            "host-browser": 1,
            "config-selectorEngine": "acme"
        },
        "async": 0
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Locale lists arrive either as `"en-us,fr"` or `["en-us", "fr"]`.
mod locale_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
    }

    pub fn serialize<S: Serializer>(locales: &[String], ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_seq(locales)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
        Ok(match Raw::deserialize(de)? {
            Raw::Joined(s) => super::split_locales(&s),
            Raw::List(v) => v
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}
