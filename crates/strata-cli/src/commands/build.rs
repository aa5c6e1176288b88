//! `strata build`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use strata_bundler::BuildOptions;

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::{CliError, Result};
use crate::ui;

/// Load the profile, run the build and print its findings.
///
/// Ctrl-C raises the build's cancel flag; the build stops before the next
/// layer.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let profile = utils::load(&args.profile)?;
    let cwd = utils::working_dir(args.cwd.as_deref(), &args.profile)?;
    utils::validate_paths(&profile, &cwd)?;
    ui::info(&format!("Building {}", args.profile.display()));

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let started = Instant::now();
    let mut options = BuildOptions::new(profile)
        .cwd(&cwd)
        .cancel_flag(cancel)
        .write(!args.dry_run);
    if let Some(out) = &args.out {
        options = options.output_dir(std::path::absolute(out)?);
    }
    let result = options.build().await;
    watcher.abort();
    let result = result?;

    let messages = result.diagnostics.non_report_messages();
    if !messages.is_empty() {
        eprint!("{messages}");
    }
    if let Some(path) = &args.report {
        std::fs::write(path, result.diagnostics.report_messages())?;
        ui::info(&format!("Report written to {}", path.display()));
    }

    ui::print_build_summary(&result);
    if !result.succeeded() {
        return Err(CliError::BuildFailed {
            errors: result.error_count(),
            warnings: result.warn_count(),
        });
    }

    let elapsed = ui::format_duration(started.elapsed());
    if args.dry_run {
        ui::success(&format!("Dry run finished in {elapsed}; nothing written"));
    } else {
        ui::success(&format!(
            "Built {} files into {} in {elapsed}",
            result.artifacts.len(),
            result.output_dir.display()
        ));
    }
    if result.warn_count() > 0 {
        ui::warning(&format!("{} warning(s)", result.warn_count()));
    }
    Ok(())
}
