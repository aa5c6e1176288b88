//! End-to-end builds of a small application on disk.

mod helpers;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use helpers::{app_profile, app_project};
use strata_bundler::{BuildOptions, CompressOptions, CompressorBackend, Diagnostics, Error};
use strata_graph::ModuleId;

fn id(s: &str) -> ModuleId {
    ModuleId::new(s).unwrap()
}

#[tokio::test]
async fn builds_root_and_sub_layers_to_disk() {
    let project = app_project();
    let out = project.path().join("release");

    let result = BuildOptions::new(app_profile())
        .cwd(project.path())
        .output_dir(&out)
        .build()
        .await
        .unwrap();

    assert!(result.succeeded(), "{}", result.diagnostics.non_report_messages());
    assert_eq!(
        result.artifacts.paths().collect::<Vec<_>>(),
        ["dojo/dojo.js", "app/main.js", "app/nls/main_de.js", "app/sub.js"]
    );

    let boot = fs::read_to_string(out.join("dojo/dojo.js")).unwrap();
    assert!(boot.starts_with("var require = {};\n("));
    assert!(boot.contains("define(\"dojo/_base/lang\","));
    assert!(boot.contains("define(\"dojo/main\","));
    assert!(boot.trim_end().ends_with("require.apply(null, require.boot); })();"));

    let main = fs::read_to_string(out.join("app/main.js")).unwrap();
    assert!(main.contains("define(\"app/util\","));
    assert!(main.contains("define(\"app/main\","));
    assert!(!main.contains("dojo/_base/lang\","), "bootstrap module leaked into app/main");

    let sub = fs::read_to_string(out.join("app/sub.js")).unwrap();
    assert!(sub.contains("define(\"app/extra\","));
    assert!(sub.contains("define(\"app/sub\","));
    assert!(!sub.contains("define(\"app/util\","), "root layer module leaked into app/sub");

    let report = result.write_report.as_ref().unwrap();
    assert!(report.is_success());
    assert_eq!(report.written.len(), 4);
    assert_eq!(result.diagnostics.count("signoff"), 1);
}

#[tokio::test]
async fn no_module_is_emitted_twice() {
    let project = app_project();
    let result = BuildOptions::new(app_profile())
        .cwd(project.path())
        .write(false)
        .build()
        .await
        .unwrap();

    let mut seen = std::collections::HashSet::new();
    for layer in &result.layers {
        for module in &layer.modules {
            assert!(seen.insert(module.clone()), "{module} assigned to two layers");
        }
    }

    let main = result.layer(&id("app/main")).unwrap();
    let position = |m: &str| main.modules.iter().position(|x| x == &id(m)).unwrap();
    assert!(position("app/util") < position("app/main"));
    assert!(main.modules.contains(&id("dojo/i18n")));
    assert_eq!(result.layer(&id("app/sub")).unwrap().modules, [id("app/extra"), id("app/sub")]);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let project = app_project();
    let out = project.path().join("release");
    let result = BuildOptions::new(app_profile())
        .cwd(project.path())
        .output_dir(&out)
        .write(false)
        .build()
        .await
        .unwrap();

    assert!(result.write_report.is_none());
    assert!(!result.artifacts.is_empty());
    assert!(!out.exists());
}

#[tokio::test]
async fn default_destination_comes_from_release_settings() {
    let project = app_project();
    let mut profile = app_profile();
    profile.release_dir = Some("../out".into());
    profile.release_name = Some("site".into());

    let result = BuildOptions::new(profile)
        .cwd(project.path())
        .build()
        .await
        .unwrap();

    assert!(result.output_dir.ends_with("out/site"));
    assert!(project.path().join("out/site/app/main.js").exists());
}

fn cyclic_profile() -> strata_config::BuildProfile {
    let mut profile = app_profile();
    profile.layers[0] = profile.layers[0].clone().layer_dependencies(["app/sub"]);
    profile
}

#[tokio::test]
async fn mutual_layer_exclusion_is_reported_once() {
    let project = app_project();

    let result = BuildOptions::new(cyclic_profile())
        .cwd(project.path())
        .write(false)
        .build()
        .await
        .unwrap();

    assert_eq!(result.diagnostics.count("amdCircularDependency"), 1);
    assert!(!result.succeeded());
    // Both layers are still produced.
    assert!(result.artifacts.contains("app/main.js"));
    assert!(result.artifacts.contains("app/sub.js"));
}

#[tokio::test]
async fn cyclic_layers_resolve_identically_across_builds() {
    let project = app_project();
    let shared = Diagnostics::shared();

    let mut runs = Vec::new();
    for diagnostics in [Diagnostics::shared(), Arc::clone(&shared), Diagnostics::shared(), Arc::clone(&shared)] {
        let result = BuildOptions::new(cyclic_profile())
            .cwd(project.path())
            .diagnostics(diagnostics)
            .write(false)
            .build()
            .await
            .unwrap();
        let texts: Vec<(String, String)> = result
            .artifacts
            .paths()
            .map(|p| (p.to_string(), result.artifacts.text(p).unwrap_or_default().to_string()))
            .collect();
        runs.push((result.layers.clone(), result.diagnostics.entries(), texts));
    }

    let (layers, entries, texts) = &runs[0];
    assert_eq!(entries.iter().filter(|e| e.name == "amdCircularDependency").count(), 1);
    for (other_layers, other_entries, other_texts) in &runs[1..] {
        assert_eq!(other_layers, layers);
        assert_eq!(other_entries, entries);
        assert_eq!(other_texts, texts);
    }
}

#[tokio::test]
async fn comments_backend_strips_semicolon_only_from_bundles() {
    let project = app_project();
    let mut profile = app_profile();
    profile.layer_optimize = "comments".into();

    let result = BuildOptions::new(profile)
        .cwd(project.path())
        .write(false)
        .build()
        .await
        .unwrap();

    assert!(result.succeeded(), "{}", result.diagnostics.non_report_messages());
    let layer = result.artifacts.text("app/main.js").unwrap();
    let bundle = result.artifacts.text("app/nls/main_de.js").unwrap();
    assert!(layer.trim_end().ends_with(';'));
    assert!(!bundle.trim_end().ends_with(';'));
    assert!(bundle.contains("Hallo"));
    assert!(result.diagnostics.count("optimizeDone") >= 4);
}

#[derive(Debug)]
struct RejectingBackend;

impl CompressorBackend for RejectingBackend {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    fn compress(&self, _source: &str, filename_hint: &str, _options: &CompressOptions) -> anyhow::Result<String> {
        anyhow::bail!("cannot compress {filename_hint}")
    }
}

#[tokio::test]
async fn failed_compression_keeps_source_and_reports_optimizer_output() {
    let project = app_project();
    let result = BuildOptions::new(app_profile())
        .cwd(project.path())
        .compressor(Box::new(RejectingBackend))
        .write(false)
        .build()
        .await
        .unwrap();

    assert_eq!(result.diagnostics.count("optimizeFailedWrite"), 4);
    assert!(result.artifacts.text("app/main.js").unwrap().contains("define(\"app/main\","));

    let messages = result.diagnostics.occurrences("optimizeMessages");
    assert_eq!(messages.len(), 1);
    assert!(messages[0][0].contains("app/sub.js: cannot compress app/sub.js"));
    let names: Vec<String> = result.diagnostics.entries().into_iter().map(|e| e.name).collect();
    assert_eq!(names.last().map(String::as_str), Some("signoff"));
    assert_eq!(names[names.len() - 2], "optimizeMessages");
}

#[tokio::test]
async fn copyright_is_prepended_after_compression() {
    let project = app_project();
    let mut profile = app_profile();
    profile.layer_optimize = "shrinksafe".into();
    profile.copyright = Some("/* (c) strata fixtures */\n".into());

    let result = BuildOptions::new(profile)
        .cwd(project.path())
        .write(false)
        .build()
        .await
        .unwrap();

    for path in ["dojo/dojo.js", "app/main.js", "app/sub.js"] {
        let text = result.artifacts.text(path).unwrap();
        assert!(text.starts_with("/* (c) strata fixtures */\n"), "{path}");
    }
}

#[tokio::test]
async fn missing_modules_are_logged_not_fatal() {
    let project = app_project();
    helpers::write_tree(
        project.path(),
        &[("js/app/sub.js", r#"define(["./util", "./gone"], function(){});"#)],
    );

    let diagnostics = Diagnostics::shared();
    let result = BuildOptions::new(app_profile())
        .cwd(project.path())
        .diagnostics(Arc::clone(&diagnostics))
        .write(false)
        .build()
        .await
        .unwrap();

    assert_eq!(diagnostics.count("amdMissingDependency"), 1);
    assert_eq!(diagnostics.occurrences("amdMissingDependency")[0][1], "app/gone");
    assert!(!result.succeeded());
    assert!(result.artifacts.contains("app/sub.js"));
}

#[tokio::test]
async fn raised_cancel_flag_stops_the_build() {
    let project = app_project();
    let result = BuildOptions::new(app_profile())
        .cwd(project.path())
        .cancel_flag(Arc::new(AtomicBool::new(true)))
        .build()
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn empty_build_fails_discovery() {
    let project = helpers::app_project();
    let mut profile = app_profile();
    profile.base_path = Some("nowhere".into());
    profile.layers.clear();

    let result = BuildOptions::new(profile).cwd(project.path()).write(false).build().await;
    assert!(matches!(result, Err(Error::DiscoveryFailed(_))));
}

#[test]
fn resolve_runs_without_transforms() {
    let project = app_project();
    let resolved = BuildOptions::new(app_profile())
        .cwd(project.path())
        .resolve()
        .unwrap();

    assert_eq!(resolved.control.layers.len(), 3);
    assert!(resolved.resolution.modules(&id("app/sub")).contains(&id("app/extra")));
    assert_eq!(resolved.diagnostics.error_count(), 0);
}
