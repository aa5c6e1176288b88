//! Stylesheet inlining and the theme stage.
//!
//! [`flatten`] replaces unconditional `@import`s with the imported sheet,
//! rewriting relative `url(...)` references of imported sheets so they stay
//! valid relative to the root sheet. [`optimize_css`] minifies the result
//! with lightningcss.

use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
};
use regex::{Captures, Regex};

use strata_config::{CssOptimize, ThemeConfig};
use strata_graph::paths::{cat_path, compact_path, get_filename, get_filepath, relative_path, to_slash};
use strata_graph::{ModuleId, PackageMap, SourceProvider};

use crate::diagnostics::Diagnostics;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?\s*([^;]*);"#)
        .expect("valid regex")
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')]+?)["']?\s*\)"#).expect("valid regex")
});

/// Stylesheets and theme assets keyed by absolute slash path.
#[derive(Debug, Clone, Default)]
pub struct FileCache {
    files: IndexMap<String, Vec<u8>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn text(&self, path: &str) -> Option<&str> {
        std::str::from_utf8(self.get(path)?).ok()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CssError {
    #[error("stylesheet not found: {0}")]
    NotFound(String),

    #[error("Failed to parse CSS from {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to print CSS for {path}: {message}")]
    Print { path: String, message: String },
}

fn is_untouchable(url: &str) -> bool {
    url.starts_with('/') || url.starts_with('#') || url.contains(':')
}

fn rebase_urls(text: &str, dir: &str, root_dir: &str) -> String {
    URL.replace_all(text, |caps: &Captures| {
        let url = caps[1].trim();
        if is_untouchable(url) {
            return caps[0].to_string();
        }
        let absolute = compact_path(&cat_path(dir, url));
        format!("url('{}')", relative_path(root_dir, &absolute))
    })
    .into_owned()
}

struct Flattener<'c> {
    cache: &'c FileCache,
    root_dir: String,
    stack: Vec<String>,
}

impl Flattener<'_> {
    fn sheet(&mut self, path: &str, depth: usize) -> Result<String, CssError> {
        let text = self
            .cache
            .text(path)
            .ok_or_else(|| CssError::NotFound(path.to_string()))?;
        let dir = get_filepath(path);
        self.stack.push(path.to_string());

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in IMPORT.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            self.push_segment(&mut out, &text[last..whole.start()], &dir, depth);
            last = whole.end();

            let url = &caps[1];
            let media = caps[2].trim();
            let target = compact_path(&cat_path(&dir, url));
            let inline = (media.is_empty() || media.eq_ignore_ascii_case("all"))
                && !is_untouchable(url)
                && self.cache.contains(&target);

            if !inline {
                if depth > 0 && !is_untouchable(url) {
                    out.push_str(&self.rebase_kept_import(whole.as_str(), caps.get(1), whole.start(), &target));
                } else {
                    self.push_segment(&mut out, whole.as_str(), &dir, depth);
                }
            } else if self.stack.contains(&target) {
                tracing::debug!(sheet = %path, import = %target, "skipping circular @import");
            } else {
                out.push_str(&self.sheet(&target, depth + 1)?);
            }
        }
        self.push_segment(&mut out, &text[last..], &dir, depth);

        self.stack.pop();
        Ok(out)
    }

    /// A conditional `@import` left in a nested sheet, its target re-expressed
    /// relative to the root sheet.
    fn rebase_kept_import(
        &self,
        import: &str,
        url: Option<regex::Match<'_>>,
        offset: usize,
        target: &str,
    ) -> String {
        let Some(url) = url else {
            return import.to_string();
        };
        let (start, end) = (url.start() - offset, url.end() - offset);
        format!(
            "{}{}{}",
            &import[..start],
            relative_path(&self.root_dir, target),
            &import[end..]
        )
    }

    fn push_segment(&self, out: &mut String, segment: &str, dir: &str, depth: usize) {
        if depth == 0 {
            out.push_str(segment);
        } else {
            out.push_str(&rebase_urls(segment, dir, &self.root_dir));
        }
    }
}

/// Inline every unconditional `@import` of the sheet at `path`.
pub fn flatten(path: &str, cache: &FileCache) -> Result<String, CssError> {
    let mut flattener = Flattener {
        cache,
        root_dir: get_filepath(path),
        stack: Vec::new(),
    };
    flattener.sheet(path, 0)
}

/// Minify a stylesheet. With `keep_lines` the output is pretty-printed.
pub fn optimize_css(text: &str, filename: &str, keep_lines: bool) -> Result<String, CssError> {
    let mut stylesheet = StyleSheet::parse(
        text,
        ParserOptions {
            filename: filename.to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| CssError::Parse {
        path: filename.to_string(),
        message: format!("{e:?}"),
    })?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| CssError::Parse {
            path: filename.to_string(),
            message: e.to_string(),
        })?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify: !keep_lines,
            ..Default::default()
        })
        .map_err(|e| CssError::Print {
            path: filename.to_string(),
            message: e.to_string(),
        })?;
    Ok(result.code)
}

fn module_dir(dir: &str, packages: &PackageMap) -> Option<String> {
    let id = ModuleId::new(dir).ok()?;
    let location = to_slash(packages.get(id.top_level())?);
    Some(match id.rest() {
        Some(rest) => cat_path(&location, rest),
        None => location,
    })
}

/// Collect the theme directories into a cache, remembering each file's
/// output path (`dijit/themes/claro/claro.css`).
fn collect_theme(
    theme: &ThemeConfig,
    packages: &PackageMap,
    source: &dyn SourceProvider,
    diagnostics: &Diagnostics,
) -> (FileCache, Vec<(String, String)>) {
    let mut cache = FileCache::new();
    let mut outputs = Vec::new();
    let dirs = std::iter::once(cat_path(&theme.root, &theme.name)).chain(theme.extra_dirs.iter().cloned());

    for dir in dirs {
        let Some(location) = module_dir(&dir, packages) else {
            diagnostics.log("transformFailed", ["resource", dir.as_str(), "error", "unknown package"]);
            continue;
        };
        let files = match source.list_files(Path::new(&location)) {
            Ok(files) => files,
            Err(e) => {
                let message = e.to_string();
                diagnostics.log("transformFailed", ["resource", dir.as_str(), "error", message.as_str()]);
                continue;
            }
        };
        for file in files {
            let absolute = to_slash(&file);
            let Some(relative) = absolute.strip_prefix(&location) else {
                continue;
            };
            match source.read(&file) {
                Ok(bytes) => {
                    outputs.push((absolute.clone(), cat_path(&dir, relative)));
                    cache.insert(absolute, bytes);
                }
                Err(e) => tracing::debug!(path = %absolute, error = %e, "unreadable theme file"),
            }
        }
    }
    (cache, outputs)
}

/// Theme stage: returns `(output path, bytes)` for every emitted file.
pub fn process_theme(
    theme: &ThemeConfig,
    packages: &PackageMap,
    source: &dyn SourceProvider,
    mode: CssOptimize,
    diagnostics: &Diagnostics,
) -> Vec<(String, Vec<u8>)> {
    let (cache, outputs) = collect_theme(theme, packages, source, diagnostics);
    let entry_sheets = [format!("{}.css", theme.name), format!("{}_rtl.css", theme.name)];

    let mut emitted = Vec::with_capacity(outputs.len());
    for (absolute, output) in outputs {
        let Some(bytes) = cache.get(&absolute) else {
            continue;
        };
        if mode == CssOptimize::None {
            emitted.push((output, bytes.to_vec()));
            continue;
        }
        if !absolute.ends_with(".css") {
            emitted.push((output, bytes.to_vec()));
            continue;
        }
        if !entry_sheets.iter().any(|s| s == get_filename(&absolute)) {
            continue;
        }

        diagnostics.log("cssOptimize", ["file", output.as_str()]);
        let optimized = flatten(&absolute, &cache)
            .and_then(|flat| optimize_css(&flat, &absolute, mode.keep_lines()));
        match optimized {
            Ok(text) => emitted.push((output, text.into_bytes())),
            Err(e) => {
                let message = e.to_string();
                diagnostics.log("cssOptimizeFailed", ["file", output.as_str(), "error", message.as_str()]);
                emitted.push((output, bytes.to_vec()));
            }
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use strata_graph::MemorySource;

    use super::*;

    fn cache(files: &[(&str, &str)]) -> FileCache {
        let mut cache = FileCache::new();
        for (path, text) in files {
            cache.insert(*path, *text);
        }
        cache
    }

    #[test]
    fn inlines_imports_and_rebases_urls() {
        let c = cache(&[
            ("/t/claro/claro.css", "@import url(\"form/Button.css\");\n@import \"print.css\" print;\nbody { color: red; }\n"),
            ("/t/claro/form/Button.css", ".b { background: url(images/b.png); }\n.c { background: url(/abs.png); }\n.d { background: url(data:image/png;base64,AA); }\n"),
        ]);
        let out = flatten("/t/claro/claro.css", &c).unwrap();
        assert_eq!(
            out,
            ".b { background: url('form/images/b.png'); }\n.c { background: url(/abs.png); }\n.d { background: url(data:image/png;base64,AA); }\n\n\
             @import \"print.css\" print;\nbody { color: red; }\n"
        );
    }

    #[test]
    fn nested_imports_rebase_against_root() {
        let c = cache(&[
            ("/t/a/root.css", "@import 'x/one.css';"),
            ("/t/a/x/one.css", "@import '../y/two.css';.one{background:url(../img/1.png)}"),
            ("/t/a/y/two.css", ".two{background:url(./2.png)}"),
        ]);
        let out = flatten("/t/a/root.css", &c).unwrap();
        assert_eq!(
            out,
            ".two{background:url('y/2.png')}.one{background:url('img/1.png')}"
        );
    }

    #[test]
    fn conditional_imports_in_nested_sheets_point_from_root() {
        let c = cache(&[
            ("/t/root.css", "@import \"sub/one.css\";\n.root{}"),
            ("/t/sub/one.css", "@import \"print.css\" print;\n@import url(wide.css) screen;\n@import \"http://cdn/x.css\" print;\n.one{}\n"),
        ]);
        let out = flatten("/t/root.css", &c).unwrap();
        assert_eq!(
            out,
            "@import \"sub/print.css\" print;\n@import url(sub/wide.css) screen;\n@import \"http://cdn/x.css\" print;\n.one{}\n\n.root{}"
        );
    }

    #[test]
    fn flatten_is_idempotent_without_imports() {
        let text = ".a { background: url(../img/a.png); }\n";
        let c = cache(&[("/t/a.css", text)]);
        let once = flatten("/t/a.css", &c).unwrap();
        assert_eq!(once, text);
        let again = flatten("/t/a.css", &cache(&[("/t/a.css", once.as_str())])).unwrap();
        assert_eq!(again, once);
    }

    #[test]
    fn circular_imports_are_cut() {
        let c = cache(&[
            ("/t/a.css", "@import 'b.css';.a{}"),
            ("/t/b.css", "@import 'a.css';.b{}"),
        ]);
        assert_eq!(flatten("/t/a.css", &c).unwrap(), ".b{}.a{}");
    }

    #[test]
    fn optimize_minifies() {
        let out = optimize_css(".a {\n  color: #ff0000;\n}\n", "a.css", false).unwrap();
        assert_eq!(out, ".a{color:red}");
    }

    fn theme_source() -> (PackageMap, MemorySource) {
        let packages: PackageMap = [("dijit", "/s/dijit")].into_iter().collect();
        let src = MemorySource::new()
            .file("/s/dijit/themes/claro/claro.css", "@import \"form/Button.css\";\n.claro { margin: 0px; }\n")
            .file("/s/dijit/themes/claro/form/Button.css", ".dijitButton { background: url(images/button.png); }\n")
            .file("/s/dijit/themes/claro/form/images/button.png", vec![0x89u8, b'P', b'N', b'G']);
        (packages, src)
    }

    #[test]
    fn theme_stage_flattens_entry_sheets() {
        let (packages, src) = theme_source();
        let d = Diagnostics::new();
        let theme = ThemeConfig {
            name: "claro".into(),
            root: "dijit/themes".into(),
            extra_dirs: vec![],
        };
        let out = process_theme(&theme, &packages, &src, CssOptimize::Comments, &d);
        let paths: Vec<&str> = out.iter().map(|(p, _)| p.as_str()).collect();
        assert!(paths.contains(&"dijit/themes/claro/claro.css"));
        assert!(paths.contains(&"dijit/themes/claro/form/images/button.png"));
        assert!(!paths.contains(&"dijit/themes/claro/form/Button.css"));

        let (_, css) = out.iter().find(|(p, _)| p.ends_with("claro.css")).unwrap();
        let css = std::str::from_utf8(css).unwrap();
        assert!(css.contains("form/images/button.png"));
        assert!(css.contains(".claro{margin:0}"));
        assert_eq!(d.count("cssOptimize"), 1);
        assert_eq!(d.error_count(), 0);
    }

    #[test]
    fn theme_stage_without_mode_copies_everything() {
        let (packages, src) = theme_source();
        let d = Diagnostics::new();
        let theme = ThemeConfig {
            name: "claro".into(),
            root: "dijit/themes".into(),
            extra_dirs: vec![],
        };
        let out = process_theme(&theme, &packages, &src, CssOptimize::None, &d);
        assert_eq!(out.len(), 3);
        assert_eq!(d.count("cssOptimize"), 0);
    }
}
