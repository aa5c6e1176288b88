//! `strata check`: validate the profile and resolve layers, no transforms.

use strata_bundler::BuildOptions;

use crate::cli::CheckArgs;
use crate::commands::utils;
use crate::error::{CliError, Result};
use crate::ui;

/// Print each layer and the modules assigned to it on stdout.
pub fn execute(args: CheckArgs) -> Result<()> {
    let profile = utils::load(&args.profile)?;
    let cwd = utils::working_dir(args.cwd.as_deref(), &args.profile)?;
    utils::validate_paths(&profile, &cwd)?;
    ui::success("Profile is valid");

    let resolved = BuildOptions::new(profile).cwd(&cwd).resolve()?;
    for (id, layer) in &resolved.control.layers {
        let modules = resolved.resolution.modules(id);
        let note = if layer.discard { " (discard)" } else { "" };
        println!("{} ({} modules){note}", layer.filename(), modules.len());
        for module in modules {
            println!("  {module}");
        }
    }

    let diagnostics = &resolved.diagnostics;
    let messages = diagnostics.non_report_messages();
    if !messages.is_empty() {
        eprint!("{messages}");
    }
    if diagnostics.error_count() > 0 {
        return Err(CliError::BuildFailed {
            errors: diagnostics.error_count(),
            warnings: diagnostics.warn_count(),
        });
    }
    ui::success(&format!(
        "{} modules in {} layers",
        resolved.resolution.total_modules(),
        resolved.control.layers.len()
    ));
    Ok(())
}
