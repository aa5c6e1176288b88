//! Tracing setup for the CLI.
//!
//! Priority: `--verbose`, then `--quiet`, then `RUST_LOG`, then info level
//! for the strata crates. Log lines go to stderr so stdout stays usable for
//! `check` output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_DIRECTIVES: &str =
    "strata_cli=debug,strata_bundler=debug,strata_graph=debug,strata_config=debug";
const QUIET_DIRECTIVES: &str = "error";
const DEFAULT_DIRECTIVES: &str = "strata_cli=info,strata_bundler=info,strata_config=warn,strata_graph=warn";

/// Fixed directives for the flags, or `None` to defer to `RUST_LOG`.
fn flag_directives(verbose: bool, quiet: bool) -> Option<&'static str> {
    if verbose {
        Some(VERBOSE_DIRECTIVES)
    } else if quiet {
        Some(QUIET_DIRECTIVES)
    } else {
        None
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = match flag_directives(verbose, quiet) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
    };
    init_logger_with_filter(filter, no_color);
}

/// Install the global subscriber with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .with_writer(std::io::stderr)
        .without_time()
        .compact();

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Colors unless `NO_COLOR` is set or stderr is not a color terminal.
/// `FORCE_COLOR` overrides detection.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
