//! Dependency scanner for AMD and legacy module sources.
//!
//! The scanner is regex based and never evaluates code. Comments are blanked
//! out first (string literals preserved) so commented-out requires are not
//! picked up.

use std::borrow::Cow;
use std::sync::LazyLock;

use memchr::memmem;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DEFINE_DEPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bdefine\s*\(\s*(?:(?:"[^"]*"|'[^']*')\s*,\s*)?\[([^\]]*)\]"#)
        .expect("valid regex")
});

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).expect("valid regex"));

static LEGACY_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bdojo\.require\s*\(\s*["']([\w.$-]+)["']\s*\)"#).expect("valid regex")
});

static ANONYMOUS_DEFINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bdefine\s*\(\s*([\[{(]|function\b)"#).expect("valid regex"));

/// Specifiers that name loader-provided values rather than modules.
pub const PSEUDO_DEPENDENCIES: &[&str] = &["require", "exports", "module"];

/// Declaration style detected in a module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    /// `define([...], factory)`
    Amd,
    /// `dojo.provide` / `dojo.require`
    Legacy,
    /// No recognizable declaration.
    Plain,
}

/// Result of scanning one module source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub kind: ModuleKind,
    /// Dependency specifiers in declaration order, as written.
    pub dependencies: Vec<String>,
}

/// Scan a module source for its direct dependency specifiers.
///
/// Pseudo dependencies are dropped; relative, plugin and dotted specifiers
/// are returned verbatim for the caller to normalize.
pub fn scan_dependencies(source: &str) -> ScanResult {
    let text = strip_comments(source);
    let mut dependencies = Vec::new();
    let mut kind = ModuleKind::Plain;

    if memmem::find(text.as_bytes(), b"define").is_some() {
        for caps in DEFINE_DEPS.captures_iter(&text) {
            kind = ModuleKind::Amd;
            let list = caps.get(1).map_or("", |m| m.as_str());
            for lit in STRING_LITERAL.captures_iter(list) {
                let spec = lit
                    .get(1)
                    .or_else(|| lit.get(2))
                    .map_or("", |m| m.as_str())
                    .trim();
                if !spec.is_empty() && !PSEUDO_DEPENDENCIES.contains(&spec) {
                    push_unique(&mut dependencies, spec);
                }
            }
        }
        if kind == ModuleKind::Plain && ANONYMOUS_DEFINE.is_match(&text) {
            kind = ModuleKind::Amd;
        }
    }

    if memmem::find(text.as_bytes(), b"dojo.").is_some() {
        for caps in LEGACY_REQUIRE.captures_iter(&text) {
            if kind == ModuleKind::Plain {
                kind = ModuleKind::Legacy;
            }
            if let Some(m) = caps.get(1) {
                push_unique(&mut dependencies, m.as_str());
            }
        }
        if kind == ModuleKind::Plain && text.contains("dojo.provide(") {
            kind = ModuleKind::Legacy;
        }
    }

    ScanResult { kind, dependencies }
}

fn push_unique(deps: &mut Vec<String>, spec: &str) {
    if !deps.iter().any(|d| d == spec) {
        deps.push(spec.to_string());
    }
}

/// Split `plugin!resource` into its parts.
pub fn split_plugin(specifier: &str) -> (&str, Option<&str>) {
    match specifier.split_once('!') {
        Some((plugin, resource)) => (plugin, Some(resource)),
        None => (specifier, None),
    }
}

/// Give the first anonymous `define(` call an explicit module id.
///
/// Concatenated layers need every module named, otherwise the loader cannot
/// tell them apart. `define(` inside comments is never a candidate.
pub fn name_anonymous_define<'a>(source: &'a str, id: &str) -> Cow<'a, str> {
    let blanked = blank_comments(source);
    let Some(m) = ANONYMOUS_DEFINE.find(&blanked) else {
        return Cow::Borrowed(source);
    };
    let open = match blanked[m.start()..m.end()].find('(') {
        Some(idx) => m.start() + idx + 1,
        None => return Cow::Borrowed(source),
    };
    let mut out = String::with_capacity(source.len() + id.len() + 4);
    out.push_str(&source[..open]);
    out.push_str(&format!("\"{id}\","));
    out.push_str(&source[open..]);
    Cow::Owned(out)
}

/// Byte ranges of every comment in `source`, string and template literals
/// skipped.
fn comment_spans(source: &str) -> Vec<(usize, usize)> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                spans.push((start, i));
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                spans.push((start, i));
            }
            _ => i += 1,
        }
    }
    spans
}

fn has_comment_marker(source: &str) -> bool {
    memmem::find(source.as_bytes(), b"//").is_some() || memmem::find(source.as_bytes(), b"/*").is_some()
}

/// Replace comments with whitespace, leaving string and template literals intact.
///
/// Newlines inside block comments are kept so line numbers stay stable.
pub fn strip_comments(source: &str) -> Cow<'_, str> {
    if !has_comment_marker(source) {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut copied_to = 0;
    for (start, end) in comment_spans(source) {
        out.push_str(&source[copied_to..start]);
        let comment = &source[start..end];
        if comment.starts_with("/*") {
            let newlines = comment.matches('\n').count();
            if newlines == 0 {
                out.push(' ');
            } else {
                out.extend(std::iter::repeat_n('\n', newlines));
            }
        }
        copied_to = end;
    }
    out.push_str(&source[copied_to..]);
    Cow::Owned(out)
}

/// Like [`strip_comments`], but every comment byte becomes a space (newlines
/// kept), so offsets into the result are valid offsets into `source`.
pub fn blank_comments(source: &str) -> Cow<'_, str> {
    if !has_comment_marker(source) {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut copied_to = 0;
    for (start, end) in comment_spans(source) {
        out.push_str(&source[copied_to..start]);
        for ch in source[start..end].chars() {
            if ch == '\n' {
                out.push('\n');
            } else {
                out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
            }
        }
        copied_to = end;
    }
    out.push_str(&source[copied_to..]);
    Cow::Owned(out)
}
