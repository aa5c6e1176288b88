//! Resource-bundle flattening.
//!
//! A layer's localization references are collected from legacy
//! `dojo.requireLocalization(...)` statements and from `i18n!` plugin
//! dependencies. Every referenced bundle is loaded once per build locale
//! through a [`BundleEvaluator`], and the translations that exist are
//! written into one artifact per locale that the layer preloads.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Expression, ObjectPropertyKind, PropertyKey, Statement, UnaryOperator,
};
use oxc_parser::Parser;
use oxc_span::SourceType;
use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use strata_graph::{ModuleId, PackageMap, SourceProvider};

use crate::diagnostics::Diagnostics;

/// Where the preload call goes when the localization runtime is in the layer.
pub const PRELOAD_MARKER: &str = "//INSERT dojo.i18n._preloadLocalizations HERE";

static REQUIRE_LOCALIZATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"dojo\.requireLocalization\(\s*["']([^"']+)["']\s*,\s*["']([^"']+)["']\s*(?:,\s*["']([^"']*)["']\s*)?\)\s*;?"#,
    )
    .expect("valid regex")
});

/// Loads translation tables.
#[async_trait]
pub trait BundleEvaluator: Send + Sync + fmt::Debug {
    /// Forget everything cached by a previous build.
    fn reset(&self);

    /// The translations `module/nls/<locale>/<bundle>` defines, or `None`
    /// when that locale has no file.
    async fn load_bundle(
        &self,
        module: &ModuleId,
        bundle: &str,
        locale: &str,
    ) -> anyhow::Result<Option<Map<String, Value>>>;
}

/// A `(module, bundle)` pair, optionally pinned to one locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleRef {
    pub module: ModuleId,
    pub bundle: String,
    pub locale: Option<String>,
}

impl BundleRef {
    /// Parse an `i18n!` resource id such as `dijit/form/nls/validate`.
    pub fn from_resource(resource: &ModuleId) -> Option<Self> {
        let (module, bundle) = resource.as_str().split_once("/nls/")?;
        if bundle.is_empty() {
            return None;
        }
        Some(Self {
            module: ModuleId::new(module).ok()?,
            bundle: bundle.to_string(),
            locale: None,
        })
    }

    fn package_name(&self) -> String {
        format!("{}.nls.{}", self.module.to_dotted(), self.bundle.replace('/', "."))
    }
}

/// Legacy references in `text`, in order of appearance.
pub fn text_references(text: &str) -> Vec<BundleRef> {
    REQUIRE_LOCALIZATION
        .captures_iter(text)
        .filter_map(|caps| {
            Some(BundleRef {
                module: ModuleId::new(&caps[1]).ok()?,
                bundle: caps[2].to_string(),
                locale: caps
                    .get(3)
                    .map(|m| m.as_str().to_string())
                    .filter(|l| !l.is_empty()),
            })
        })
        .collect()
}

/// Flattener output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
    pub text: String,
    /// `(output path, text)` per locale with at least one translation.
    pub locale_artifacts: Vec<(String, String)>,
}

pub struct NlsFlattener<'a> {
    pub evaluator: &'a dyn BundleEvaluator,
    pub locales: &'a [String],
    pub diagnostics: &'a Diagnostics,
}

impl NlsFlattener<'_> {
    /// Flatten the bundles `layer` references. `plugin_refs` are the
    /// references found in the layer modules' `i18n!` dependencies.
    pub async fn flatten(&self, layer: &ModuleId, text: &str, plugin_refs: &[BundleRef]) -> Flattened {
        let unchanged = || Flattened {
            text: text.to_string(),
            locale_artifacts: Vec::new(),
        };

        let mut refs: IndexSet<BundleRef> = text_references(text).into_iter().collect();
        refs.extend(plugin_refs.iter().cloned());
        if refs.is_empty() {
            return unchanged();
        }
        self.diagnostics.log("flattenResources", ["layer", layer.as_str()]);

        let mut by_locale: IndexMap<&str, Vec<(&BundleRef, Map<String, Value>)>> = IndexMap::new();
        let mut loaded: IndexSet<(&ModuleId, &str, &str)> = IndexSet::new();
        for r in &refs {
            let locales: Vec<&str> = match &r.locale {
                Some(locale) => vec![locale.as_str()],
                None => self.locales.iter().map(String::as_str).collect(),
            };
            for locale in locales {
                if !loaded.insert((&r.module, r.bundle.as_str(), locale)) {
                    continue;
                }
                match self.evaluator.load_bundle(&r.module, &r.bundle, locale).await {
                    Ok(Some(translations)) => by_locale.entry(locale).or_default().push((r, translations)),
                    Ok(None) => {}
                    Err(e) => {
                        let message = format!("{e:#}");
                        let bundle = r.package_name();
                        self.diagnostics.log(
                            "transformFailed",
                            ["layer", layer.as_str(), "bundle", bundle.as_str(), "error", message.as_str()],
                        );
                        return unchanged();
                    }
                }
            }
        }
        if by_locale.is_empty() {
            tracing::debug!(layer = %layer, "no translations for any build locale");
            return unchanged();
        }

        let top = layer.top_level();
        let rest = layer.rest().unwrap_or("main");
        let flat_name = format!("{top}.nls.{}", rest.replace('/', "."));

        let mut locale_artifacts = Vec::with_capacity(by_locale.len());
        for (locale, entries) in &by_locale {
            let mut out = format!("dojo.provide(\"{flat_name}_{locale}\");");
            let var_locale = locale.replace('-', "_");
            for (r, translations) in entries {
                let pkg = r.package_name();
                let json = Value::Object(translations.clone()).to_string();
                out.push_str(&format!(
                    "dojo.provide(\"{pkg}\");{pkg}._built=true;dojo.provide(\"{pkg}.{var_locale}\");{pkg}.{var_locale}={json};"
                ));
            }
            locale_artifacts.push((format!("{top}/nls/{rest}_{locale}.js"), out));
        }

        let mut locales: Vec<&str> = by_locale.keys().copied().collect();
        locales.sort_unstable();
        let list = locales
            .iter()
            .map(|l| format!("\"{l}\""))
            .collect::<Vec<_>>()
            .join(",");
        let preload = format!("\ndojo.i18n._preloadLocalizations(\"{flat_name}\", [{list}]);\n");

        let stripped = REQUIRE_LOCALIZATION.replace_all(text, "");
        let text = match stripped.find(PRELOAD_MARKER) {
            Some(at) => {
                let mut text = stripped.into_owned();
                text.replace_range(at..at + PRELOAD_MARKER.len(), &preload);
                text
            }
            None => format!("{stripped}{preload}"),
        };

        Flattened {
            text,
            locale_artifacts,
        }
    }
}

/// Reads bundle files through a [`SourceProvider`].
///
/// Both `define({ ... })` and the legacy bare `({ ... })` forms are
/// accepted; the object literal is converted to JSON without evaluating
/// anything.
#[derive(Debug)]
pub struct SourceBundleEvaluator {
    source: Arc<dyn SourceProvider>,
    packages: PackageMap,
    cache: Mutex<FxHashMap<PathBuf, Option<Map<String, Value>>>>,
}

impl SourceBundleEvaluator {
    pub fn new(source: Arc<dyn SourceProvider>, packages: PackageMap) -> Self {
        Self {
            source,
            packages,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    fn bundle_path(&self, module: &ModuleId, bundle: &str, locale: &str) -> Option<PathBuf> {
        let mut path = self.packages.get(module.top_level())?.to_path_buf();
        if let Some(rest) = module.rest() {
            path.push(rest);
        }
        path.push("nls");
        path.push(locale);
        path.push(format!("{bundle}.js"));
        Some(path)
    }
}

#[async_trait]
impl BundleEvaluator for SourceBundleEvaluator {
    fn reset(&self) {
        self.cache.lock().clear();
    }

    async fn load_bundle(
        &self,
        module: &ModuleId,
        bundle: &str,
        locale: &str,
    ) -> anyhow::Result<Option<Map<String, Value>>> {
        let Some(path) = self.bundle_path(module, bundle, locale) else {
            return Ok(None);
        };
        if let Some(cached) = self.cache.lock().get(&path) {
            return Ok(cached.clone());
        }

        let translations = if self.source.exists(&path) {
            let text = self.source.read_to_string(&path)?;
            Some(parse_bundle(&text, &path.to_string_lossy())?)
        } else {
            None
        };
        self.cache.lock().insert(path, translations.clone());
        Ok(translations)
    }
}

/// Extract the object literal a bundle file defines.
pub fn parse_bundle(source: &str, filename: &str) -> anyhow::Result<Map<String, Value>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Failed to parse bundle {}: {}", filename, messages.join("; "));
    }

    for stmt in &ret.program.body {
        let Statement::ExpressionStatement(expr) = stmt else {
            continue;
        };
        let object = match &expr.expression {
            Expression::CallExpression(call)
                if matches!(&call.callee, Expression::Identifier(id) if id.name.as_str() == "define") =>
            {
                call.arguments
                    .iter()
                    .filter_map(|arg| arg.as_expression())
                    .rev()
                    .find_map(expression_to_json)
            }
            other => expression_to_json(other),
        };
        if let Some(Value::Object(map)) = object {
            return Ok(map);
        }
    }
    anyhow::bail!("{} does not define an object literal", filename)
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn property_key(key: &PropertyKey<'_>) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        PropertyKey::NumericLiteral(n) => Some(n.value.to_string()),
        _ => None,
    }
}

fn expression_to_json(expr: &Expression<'_>) -> Option<Value> {
    match expr {
        Expression::StringLiteral(s) => Some(Value::String(s.value.to_string())),
        Expression::NumericLiteral(n) => Some(number(n.value)),
        Expression::BooleanLiteral(b) => Some(Value::Bool(b.value)),
        Expression::NullLiteral(_) => Some(Value::Null),
        Expression::ParenthesizedExpression(p) => expression_to_json(&p.expression),
        Expression::UnaryExpression(u) if u.operator == UnaryOperator::UnaryNegation => {
            match expression_to_json(&u.argument)? {
                Value::Number(n) => n.as_f64().map(|f| number(-f)),
                _ => None,
            }
        }
        Expression::TemplateLiteral(t) if t.expressions.is_empty() => t
            .quasis
            .first()
            .and_then(|q| q.value.cooked.as_ref())
            .map(|cooked| Value::String(cooked.to_string())),
        Expression::ArrayExpression(arr) => arr
            .elements
            .iter()
            .map(|el| el.as_expression().and_then(expression_to_json))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Expression::ObjectExpression(obj) => {
            let mut map = Map::new();
            for prop in &obj.properties {
                let ObjectPropertyKind::ObjectProperty(p) = prop else {
                    return None;
                };
                map.insert(property_key(&p.key)?, expression_to_json(&p.value)?);
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}
