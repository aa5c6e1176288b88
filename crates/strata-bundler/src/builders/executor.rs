//! The build pipeline: normalize, resolve, transform each layer, run the
//! theme stage, write.

use std::path::PathBuf;
use std::sync::Arc;

use strata_graph::ModuleId;
use strata_graph::scan::split_plugin;

use crate::control::{BuildControl, normalize};
use crate::output::{Artifacts, LayerAssembly, LayerWriter};
use crate::resolve::{Resolution, resolve_layers};
use crate::transform::has::{apply_static_has, report_features};
use crate::transform::{
    BundleEvaluator, BundleRef, CompressOptions, CompressorBackend, Interner, NlsFlattener,
    SourceBundleEvaluator, backend_for, optimize, process_theme,
};
use crate::{Error, Result};

use super::options::BuildOptions;
use super::output::{BuildResult, LayerOutput};

pub(crate) async fn execute_build(options: BuildOptions) -> Result<BuildResult> {
    let diagnostics = options.shared_diagnostics();
    diagnostics.reset();

    let control = normalize(&options.profile, &options.cwd_string()?, &diagnostics)?;
    let source = options.source_provider();
    tracing::info!(layers = control.layers.len(), "resolving layers");
    let resolution = resolve_layers(&control, Arc::clone(&source), &diagnostics)?;
    tracing::debug!(modules = resolution.total_modules(), "layers resolved");

    let evaluator: Arc<dyn BundleEvaluator> = match &options.evaluator {
        Some(evaluator) => Arc::clone(evaluator),
        None => Arc::new(SourceBundleEvaluator::new(Arc::clone(&source), control.package_map())),
    };
    evaluator.reset();

    let default_backend = backend_for(control.layer_optimize);
    let backend: Option<&dyn CompressorBackend> =
        options.compressor.as_deref().or(default_backend.as_deref());
    let compress = CompressOptions::new(control.layer_optimize.keep_lines, control.strip_console);

    let packages = control.package_map();
    let assembly = LayerAssembly::new(&control, &resolution);
    let interner = Interner {
        packages: &packages,
        source: source.as_ref(),
        skip_list: &control.intern_skip_list,
        diagnostics: &diagnostics,
    };
    let flattener = NlsFlattener {
        evaluator: evaluator.as_ref(),
        locales: &control.locales,
        diagnostics: &diagnostics,
    };
    let i18n_plugin = format!("{}/i18n", control.base_package);

    let mut artifacts = Artifacts::new();
    let mut layers = Vec::with_capacity(control.layers.len());

    for (id, layer) in &control.layers {
        if options.is_cancelled() {
            tracing::info!(layer = %id, "build cancelled");
            return Err(Error::Cancelled);
        }

        let modules = resolution.modules(id);
        layers.push(LayerOutput {
            module_id: id.clone(),
            path: layer.filename(),
            modules: modules.to_vec(),
            discard: layer.discard,
        });

        let Some(text) = assembly.text(layer, &diagnostics) else {
            tracing::debug!(layer = %id, "discarded");
            continue;
        };

        let (text, detected) = apply_static_has(&text, &control.static_has);
        report_features(id.as_str(), &detected, &diagnostics);

        let text = if control.intern_strings {
            interner.intern(id.as_str(), &text).0.into_owned()
        } else {
            text.into_owned()
        };

        let bundle_refs = plugin_bundle_refs(&resolution, modules, &i18n_plugin);
        let flattened = flattener.flatten(id, &text, &bundle_refs).await;

        let filename = layer.filename();
        let mut text = flattened.text;
        if let Some(backend) = backend {
            text = optimize(&text, &filename, backend, &compress, &diagnostics);
        }
        if !layer.copyright.is_empty() {
            text.insert_str(0, &layer.copyright);
        }
        tracing::debug!(layer = %id, bytes = text.len(), "layer assembled");
        artifacts.insert(filename, text, &diagnostics);

        for (path, locale_text) in flattened.locale_artifacts {
            let locale_text = match backend {
                Some(backend) => optimize(&locale_text, &path, backend, &compress, &diagnostics),
                None => locale_text,
            };
            artifacts.insert(path, locale_text, &diagnostics);
        }
    }

    if let Some(theme) = &control.theme {
        tracing::info!(theme = %theme.name, "processing theme");
        for (path, bytes) in process_theme(theme, &packages, source.as_ref(), control.css_optimize, &diagnostics) {
            artifacts.insert(path, bytes, &diagnostics);
        }
    }

    let output_dir = destination(&options, &control);
    let write_report = if options.write {
        if options.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut writer = LayerWriter::new(&output_dir)?;
        for (path, bytes) in artifacts.iter() {
            writer.write(path, bytes.to_vec())?;
        }
        tracing::info!(files = writer.pending(), dir = %writer.root().display(), "writing artifacts");
        Some(writer.finish(&diagnostics).await)
    } else {
        None
    };

    let optimizer_output = diagnostics.optimizer_output();
    if !optimizer_output.is_empty() {
        diagnostics.log("optimizeMessages", [optimizer_output.trim_end()]);
    }

    let errors = diagnostics.error_count().to_string();
    let warnings = diagnostics.warn_count().to_string();
    diagnostics.log("signoff", ["errors", errors.as_str(), "warnings", warnings.as_str()]);

    Ok(BuildResult {
        artifacts,
        layers,
        diagnostics,
        write_report,
        output_dir,
    })
}

fn destination(options: &BuildOptions, control: &BuildControl) -> PathBuf {
    options
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&control.dest_base_path))
}

/// Bundles a layer reaches through `<base>/i18n!` dependencies, resolved
/// relative to the module that names them.
fn plugin_bundle_refs(resolution: &Resolution, modules: &[ModuleId], i18n_plugin: &str) -> Vec<BundleRef> {
    let mut refs: Vec<BundleRef> = Vec::new();
    for module in modules {
        let Some(node) = resolution.graph.get(module) else {
            continue;
        };
        for spec in &node.dependencies {
            let (plugin, Some(resource)) = split_plugin(spec) else {
                continue;
            };
            let Ok(plugin) = module.resolve(plugin) else {
                continue;
            };
            if plugin.as_str() != i18n_plugin {
                continue;
            }
            let Some(bundle) = module
                .resolve(resource)
                .ok()
                .and_then(|resource| BundleRef::from_resource(&resource))
            else {
                continue;
            };
            if !refs.contains(&bundle) {
                refs.push(bundle);
            }
        }
    }
    refs
}
