//! Command-line definition.
//!
//! - `strata build <profile>` - resolve, transform and write every layer
//! - `strata check <profile>` - validate the profile and resolve layers only

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// strata - layered module bundler
#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Bundle AMD and legacy modules into deduplicated layers",
    long_about = "strata reads a build profile, assigns every module to exactly one layer,\n\
                  flattens localization bundles, optimizes layers and theme stylesheets\n\
                  and writes the release tree."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build all layers described by a profile
    Build(BuildArgs),

    /// Validate a profile and show each layer's modules without building
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Profile file (strata.toml, strata.json, a legacy *.profile.json or an
    /// HTML page whose scripts become layers)
    #[arg(value_name = "PROFILE", default_value = "strata.toml")]
    pub profile: PathBuf,

    /// Output directory, overriding the profile's release settings
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Directory relative profile paths resolve against (defaults to the
    /// profile's directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Produce every artifact but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Write the build report (feature usage, interned strings) to a file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Profile file
    #[arg(value_name = "PROFILE", default_value = "strata.toml")]
    pub profile: PathBuf,

    /// Directory relative profile paths resolve against
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}
