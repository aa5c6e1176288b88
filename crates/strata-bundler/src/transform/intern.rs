//! String interning: inline `dojo.cache` and `templatePath` resources so a
//! built layer never fetches its templates at runtime.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::LazyLock;

use path_clean::PathClean;
use regex::{Captures, Regex};

use strata_graph::{ModuleId, PackageMap, SourceProvider};

use crate::diagnostics::Diagnostics;

static CACHE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"dojo\.cache\(\s*["']([^"']+)["']\s*,\s*["']([^"']+)["']\s*\)"#)
        .expect("valid regex")
});

static TEMPLATE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"templatePath\s*:\s*dojo\.moduleUrl\(\s*["']([^"']+)["']\s*,\s*["']([^"']+)["']\s*\)"#,
    )
    .expect("valid regex")
});

/// Inputs shared by every layer.
pub struct Interner<'a> {
    pub packages: &'a PackageMap,
    pub source: &'a dyn SourceProvider,
    /// Module-path prefixes (`dijit/templates`) that are never inlined.
    pub skip_list: &'a [String],
    pub diagnostics: &'a Diagnostics,
}

/// Encode resource text as a JavaScript string literal.
///
/// JSON escaping covers everything except the two line separators, which
/// JSON allows inside strings but older engines reject.
pub fn js_string_literal(text: &str) -> String {
    let json = serde_json::Value::String(text.to_string()).to_string();
    json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029")
}

impl Interner<'_> {
    fn resource_path(&self, module: &str, file: &str) -> Option<(String, PathBuf)> {
        let id = ModuleId::new(module).ok()?;
        let mut path = self.packages.get(id.top_level())?.to_path_buf();
        if let Some(rest) = id.rest() {
            path.push(rest);
        }
        path.push(file);
        Some((format!("{id}/{file}"), path.clean()))
    }

    /// Skip entries match whole path segments: `dijit/templates` covers
    /// `dijit/templates/x.html` but not `dijit/templatesX/x.html`.
    fn skipped(&self, module_path: &str) -> bool {
        self.skip_list.iter().any(|prefix| {
            let prefix = prefix.replace('.', "/");
            let prefix = prefix.trim_end_matches('/');
            module_path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    fn load(&self, layer: &str, module: &str, file: &str) -> Option<String> {
        let (module_path, path) = self.resource_path(module, file)?;
        if self.skipped(&module_path) {
            return None;
        }
        match self.source.read_to_string(&path) {
            Ok(text) => Some(js_string_literal(&text)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot intern resource");
                self.diagnostics.log(
                    "internMissingResource",
                    ["layer", layer, "resource", module_path.as_str()],
                );
                None
            }
        }
    }

    /// Inline resources referenced by `text`. Returns the rewritten text and
    /// the number of resources inlined.
    pub fn intern<'t>(&self, layer: &str, text: &'t str) -> (Cow<'t, str>, usize) {
        if !text.contains("dojo.cache") && !text.contains("templatePath") {
            return (Cow::Borrowed(text), 0);
        }
        let mut count = 0;

        let cached = CACHE_CALL.replace_all(text, |caps: &Captures| {
            match self.load(layer, &caps[1], &caps[2]) {
                Some(literal) => {
                    count += 1;
                    format!("dojo.cache(\"{}\", \"{}\", {literal})", &caps[1], &caps[2])
                }
                None => caps[0].to_string(),
            }
        });
        let templated = match TEMPLATE_PATH.replace_all(&cached, |caps: &Captures| {
            match self.load(layer, &caps[1], &caps[2]) {
                Some(literal) => {
                    count += 1;
                    format!("templateString: {literal}")
                }
                None => caps[0].to_string(),
            }
        }) {
            Cow::Owned(s) => Some(s),
            Cow::Borrowed(_) => None,
        };

        let out = match templated {
            Some(s) => Cow::Owned(s),
            None => cached,
        };
        if count > 0 {
            self.diagnostics
                .log("internStrings", ["layer", layer, "count", count.to_string().as_str()]);
        }
        (out, count)
    }
}

#[cfg(test)]
mod tests {
    use strata_graph::MemorySource;

    use super::*;

    fn setup() -> (PackageMap, MemorySource) {
        let packages: PackageMap = [("dijit", "/s/dijit"), ("app", "/s/app")].into_iter().collect();
        let src = MemorySource::new()
            .file("/s/dijit/templates/Button.html", "<span class=\"b\">\n</span>")
            .file("/s/app/views/row.html", "<tr>\u{2028}</tr>");
        (packages, src)
    }

    #[test]
    fn inlines_cache_calls_and_template_paths() {
        let (packages, src) = setup();
        let d = Diagnostics::new();
        let interner = Interner {
            packages: &packages,
            source: &src,
            skip_list: &[],
            diagnostics: &d,
        };
        let text = r#"var t = dojo.cache("dijit", "templates/Button.html");
declare({ templatePath: dojo.moduleUrl("app.views", "row.html") });"#;
        let (out, count) = interner.intern("app/main", text);
        assert_eq!(count, 2);
        assert_eq!(
            out,
            "var t = dojo.cache(\"dijit\", \"templates/Button.html\", \"<span class=\\\"b\\\">\\n</span>\");\n\
             declare({ templateString: \"<tr>\\u2028</tr>\" });"
        );
        assert_eq!(d.count("internStrings"), 1);
    }

    #[test]
    fn skip_list_and_missing_resources() {
        let (packages, src) = setup();
        let d = Diagnostics::new();
        let skip = vec!["dijit.templates".to_string()];
        let interner = Interner {
            packages: &packages,
            source: &src,
            skip_list: &skip,
            diagnostics: &d,
        };
        let text = r#"dojo.cache("dijit", "templates/Button.html"); dojo.cache("app", "gone.html");"#;
        let (out, count) = interner.intern("app/main", text);
        assert_eq!(count, 0);
        assert_eq!(out, text);
        assert_eq!(d.count("internMissingResource"), 1);
        assert_eq!(d.count("internStrings"), 0);
    }

    #[test]
    fn skip_list_matches_whole_segments() {
        let packages: PackageMap = [("dijit", "/s/dijit")].into_iter().collect();
        let src = MemorySource::new()
            .file("/s/dijit/templates/Button.html", "<b></b>")
            .file("/s/dijit/templatesX/Menu.html", "<m></m>");
        let d = Diagnostics::new();
        let skip = vec!["dijit/templates".to_string()];
        let interner = Interner {
            packages: &packages,
            source: &src,
            skip_list: &skip,
            diagnostics: &d,
        };
        let text = r#"dojo.cache("dijit", "templates/Button.html"); dojo.cache("dijit", "templatesX/Menu.html");"#;
        let (out, count) = interner.intern("app/main", text);
        assert_eq!(count, 1);
        assert_eq!(
            out,
            r#"dojo.cache("dijit", "templates/Button.html"); dojo.cache("dijit", "templatesX/Menu.html", "<m></m>");"#
        );
    }

    #[test]
    fn literal_escapes_line_separators() {
        assert_eq!(js_string_literal("a\u{2029}'b\""), "\"a\\u2029'b\\\"\"");
    }
}
