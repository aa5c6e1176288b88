//! Runtime configuration written into the bootstrap layer.
//!
//! The caller-supplied `default_config` is merged over the built-in
//! defaults: `hasCache` is mixed key by key, `packages` is held apart as
//! per-package overrides, every other key replaces the default.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use strata_config::default_runtime_config;

use crate::diagnostics::Diagnostics;

/// Keys a per-package override may not touch.
const RESERVED_PACKAGE_KEYS: &[&str] = &["name", "location"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    /// Merged default configuration without `packages`.
    pub defaults: Map<String, Value>,
    /// Extra fields mixed into each package's entry, keyed by package name.
    pub package_overrides: IndexMap<String, Map<String, Value>>,
}

pub fn merge_default_config(supplied: &Map<String, Value>, diagnostics: &Diagnostics) -> RuntimeConfig {
    let mut defaults = default_runtime_config();
    let mut package_overrides = IndexMap::new();

    for (key, value) in supplied {
        match key.as_str() {
            "hasCache" => {
                let Value::Object(features) = value else {
                    defaults.insert(key.clone(), value.clone());
                    continue;
                };
                let cache = defaults
                    .entry("hasCache")
                    .or_insert_with(|| Value::Object(Map::new()));
                match cache {
                    Value::Object(cache) => {
                        for (feature, v) in features {
                            cache.insert(feature.clone(), v.clone());
                        }
                    }
                    other => *other = value.clone(),
                }
            }
            "packages" => collect_overrides(value, &mut package_overrides, diagnostics),
            _ => {
                defaults.insert(key.clone(), value.clone());
            }
        }
    }

    RuntimeConfig {
        defaults,
        package_overrides,
    }
}

/// Accepts `[{ name, ...overrides }]` or `{ name: { ...overrides } }`.
fn collect_overrides(
    value: &Value,
    out: &mut IndexMap<String, Map<String, Value>>,
    diagnostics: &Diagnostics,
) {
    let entries: Vec<(String, &Map<String, Value>)> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let name = obj.get("name")?.as_str()?;
                Some((name.to_string(), obj))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(name, v)| Some((name.clone(), v.as_object()?)))
            .collect(),
        _ => Vec::new(),
    };

    for (name, fields) in entries {
        let mut accepted = Map::new();
        for (key, v) in fields {
            if key == "name" && v.as_str() == Some(name.as_str()) {
                continue;
            }
            if RESERVED_PACKAGE_KEYS.contains(&key.as_str()) {
                diagnostics.log("configInvalidPackageOverride", ["package", name.as_str(), "key", key.as_str()]);
                continue;
            }
            accepted.insert(key.clone(), v.clone());
        }
        if !accepted.is_empty() {
            out.entry(name).or_default().extend(accepted);
        }
    }
}
