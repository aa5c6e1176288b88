use std::path::{Path, PathBuf};

use strata_config::{
    BuildProfile, ConfigValidator, FsValidator, load_profile, load_profile_from_html, validate_schema,
};

use crate::error::{CliError, Result};

/// Load and validate the profile at `path`; HTML pages derive one.
pub(crate) fn load(path: &Path) -> Result<BuildProfile> {
    if !path.is_file() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    let profile = if is_html(path) {
        load_profile_from_html(&[path])?
    } else {
        load_profile(path)?
    };
    validate_schema(&profile)?;
    Ok(profile)
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

/// Run filesystem checks against `cwd`.
pub(crate) fn validate_paths(profile: &BuildProfile, cwd: &Path) -> Result<()> {
    FsValidator::new(cwd).validate(profile)?;
    Ok(())
}

/// `--cwd` when given, otherwise the directory holding the profile.
pub(crate) fn working_dir(explicit: Option<&Path>, profile: &Path) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => match profile.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    Ok(std::path::absolute(dir)?)
}
