//! Shared fixtures for strata-bundler integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use strata_config::{BuildProfile, LayerDecl, PackagePrefix};
use tempfile::TempDir;

/// Write `files` (relative path, content) under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, content).expect("write fixture");
    }
}

/// A small application on disk:
///
/// - `js/dojo`: loader, `main`, `_base/lang`, `i18n`
/// - `js/app`: `main` (uses `util` and an `i18n!` bundle), `sub` (uses
///   `util` and `extra`), a root bundle and its German translation
pub fn app_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    write_tree(
        dir.path(),
        &[
            ("js/dojo/dojo.js", "var require = {};\n"),
            ("js/dojo/main.js", r#"define(["./_base/lang"], function(lang){ return lang; });"#),
            ("js/dojo/_base/lang.js", "define({ mixin: function(){} });"),
            ("js/dojo/i18n.js", "define({ load: function(){} });"),
            (
                "js/app/main.js",
                r#"define(["./util", "dojo/i18n!./nls/strings"], function(util, strings){ return util; });"#,
            ),
            ("js/app/util.js", r#"define(["dojo/_base/lang"], function(lang){ return {}; });"#),
            ("js/app/sub.js", r#"define(["./util", "./extra"], function(util, extra){ return extra; });"#),
            ("js/app/extra.js", "define({ extra: true });"),
            ("js/app/nls/strings.js", r#"define({ root: { hello: "Hello" }, de: true });"#),
            ("js/app/nls/de/strings.js", r#"define({ hello: "Hallo" });"#),
        ],
    );
    dir
}

/// Profile for [`app_project`]: a root layer `app/main` and a sub layer
/// `app/sub` that excludes it. Compression off unless the test enables it.
pub fn app_profile() -> BuildProfile {
    BuildProfile {
        base_path: Some("js".into()),
        prefixes: vec![PackagePrefix::new("app", "../app")],
        layers: vec![
            LayerDecl::new("app/main").dependencies(["app/main"]),
            LayerDecl::new("app/sub")
                .dependencies(["app/sub"])
                .layer_dependencies(["app/main"]),
        ],
        locales: vec!["de".into(), "fr".into()],
        layer_optimize: String::new(),
        ..Default::default()
    }
}
