//! Static feature detection.
//!
//! `has("feature")` calls whose feature has a build-time value are replaced
//! by that value, and `<base>/has!feature?a:b` dependencies are decided
//! before the closure walk.

use std::borrow::Cow;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::diagnostics::Diagnostics;

static HAS_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[^.\w$])has\(\s*["']([^"']+)["']\s*\)"#).expect("valid regex")
});

/// Outcome of a `has!` plugin resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HasResolution {
    /// The expression selected this (possibly relative) module id.
    Module(String),
    /// The selected branch is empty.
    Empty,
    /// A feature on the taken path has no static value.
    Unresolved(String),
}

/// Truthiness of a static feature value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Term(&'a str),
    Question,
    Colon,
}

fn tokenize(expr: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in expr.char_indices() {
        if c == '?' || c == ':' {
            if start < i {
                tokens.push(Token::Term(expr[start..i].trim()));
            }
            tokens.push(if c == '?' { Token::Question } else { Token::Colon });
            start = i + 1;
        }
    }
    if start < expr.len() {
        tokens.push(Token::Term(expr[start..].trim()));
    }
    tokens
}

struct Evaluator<'a, 't> {
    tokens: &'t [Token<'a>],
    pos: usize,
    features: &'t IndexMap<String, Value>,
}

impl<'a> Evaluator<'a, '_> {
    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    /// One branch. When `skip` is set the branch is consumed without
    /// consulting any feature.
    fn branch(&mut self, skip: bool) -> Result<Option<&'a str>, String> {
        let term = match self.next() {
            None | Some(Token::Colon) => return Ok(None),
            Some(Token::Question) => "",
            Some(Token::Term(t)) => t,
        };
        if term.is_empty() {
            return Ok(None);
        }
        if self.next() != Some(Token::Question) {
            return Ok(Some(term));
        }
        if !skip {
            let value = self
                .features
                .get(term)
                .ok_or_else(|| term.to_string())?;
            if is_truthy(value) {
                return self.branch(false);
            }
        }
        self.branch(true)?;
        self.branch(skip)
    }
}

/// Decide a `has!` resource such as `dom?./dom:./node` or the nested
/// `a?x:b?y:z` against the static feature table.
pub fn resolve_has_expression(expr: &str, features: &IndexMap<String, Value>) -> HasResolution {
    let tokens = tokenize(expr);
    let mut eval = Evaluator {
        tokens: &tokens,
        pos: 0,
        features,
    };
    match eval.branch(false) {
        Ok(Some(module)) => HasResolution::Module(module.to_string()),
        Ok(None) => HasResolution::Empty,
        Err(feature) => HasResolution::Unresolved(feature),
    }
}

/// Replace statically known `has("x")` calls.
///
/// Returns the rewritten text and every feature name the text tests, known
/// or not, in first-seen order.
pub fn apply_static_has<'t>(
    text: &'t str,
    features: &IndexMap<String, Value>,
) -> (Cow<'t, str>, IndexSet<String>) {
    let mut detected = IndexSet::new();
    if !text.contains("has(") {
        return (Cow::Borrowed(text), detected);
    }
    let replaced = HAS_CALL.replace_all(text, |caps: &Captures| {
        let feature = &caps[2];
        detected.insert(feature.to_string());
        match features.get(feature) {
            Some(value) => format!("{}{}", &caps[1], value),
            None => caps[0].to_string(),
        }
    });
    (replaced, detected)
}

/// Log the features a layer tests.
pub fn report_features(layer: &str, detected: &IndexSet<String>, diagnostics: &Diagnostics) {
    if detected.is_empty() {
        return;
    }
    let names: Vec<&str> = detected.iter().map(String::as_str).collect();
    diagnostics.log("hasReport", ["layer", layer, "features", names.join(", ").as_str()]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn features() -> IndexMap<String, Value> {
        [
            ("dom", json!(1)),
            ("host-node", json!(0)),
            ("config-mode", json!("fast")),
            ("off", json!(false)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn simple_ternaries() {
        let f = features();
        assert_eq!(
            resolve_has_expression("dom?./dom:./node", &f),
            HasResolution::Module("./dom".into())
        );
        assert_eq!(
            resolve_has_expression("host-node?./node:./browser", &f),
            HasResolution::Module("./browser".into())
        );
        assert_eq!(resolve_has_expression("host-node?./node", &f), HasResolution::Empty);
        assert_eq!(resolve_has_expression("dom?:./node", &f), HasResolution::Empty);
        assert_eq!(
            resolve_has_expression("off?:./fallback", &f),
            HasResolution::Module("./fallback".into())
        );
    }

    #[test]
    fn nested_ternaries() {
        let f = features();
        assert_eq!(
            resolve_has_expression("host-node?./node:dom?./dom:./other", &f),
            HasResolution::Module("./dom".into())
        );
        assert_eq!(
            resolve_has_expression("dom?off?a:b:c", &f),
            HasResolution::Module("b".into())
        );
    }

    #[test]
    fn unknown_feature_on_taken_path() {
        let f = features();
        assert_eq!(
            resolve_has_expression("touch?./touch:./mouse", &f),
            HasResolution::Unresolved("touch".into())
        );
        // only reached when the first feature is false
        assert_eq!(
            resolve_has_expression("dom?./dom:touch?a:b", &f),
            HasResolution::Module("./dom".into())
        );
    }

    #[test]
    fn replaces_known_has_calls() {
        let f = features();
        let src = r#"if(has("dom") && !has('host-node')){ x = has("config-mode"); y = has("touch"); z = my.has("dom"); }"#;
        let (out, detected) = apply_static_has(src, &f);
        assert_eq!(
            out,
            r#"if(1 && !0){ x = "fast"; y = has("touch"); z = my.has("dom"); }"#
        );
        let detected: Vec<&str> = detected.iter().map(String::as_str).collect();
        assert_eq!(detected, ["dom", "host-node", "config-mode", "touch"]);
    }

    #[test]
    fn text_without_calls_is_borrowed() {
        let (out, detected) = apply_static_has("var a = 1;", &features());
        assert!(matches!(out, Cow::Borrowed(_)));
        assert!(detected.is_empty());
    }

    #[test]
    fn reports_detected_features() {
        let d = Diagnostics::new();
        let detected: IndexSet<String> = ["dom".to_string(), "touch".to_string()].into_iter().collect();
        report_features("app/main", &detected, &d);
        report_features("app/empty", &IndexSet::new(), &d);
        assert_eq!(d.occurrences("hasReport"), vec![vec![
            "layer".to_string(),
            "app/main".into(),
            "features".into(),
            "dom, touch".into()
        ]]);
    }
}
