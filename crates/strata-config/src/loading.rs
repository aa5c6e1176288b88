//! Layered profile loading.
//!
//! Priority: environment (`STRATA_*`) > profile file > built-in defaults.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::profile::BuildProfile;

/// Scalar keys that may be overridden from the environment.
const ENV_KEYS: &[&str] = &[
    "base_package",
    "base_path",
    "release_name",
    "release_dir",
    "dest_base_path",
    "version",
    "layer_optimize",
    "css_optimize",
    "strip_console",
    "intern_strings",
];

/// Conventional profile filenames, in search order.
pub const PROFILE_FILENAMES: &[&str] = &["strata.toml", "strata.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileFormat {
    Toml,
    Json,
}

impl ProfileFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ProfileFormat::Toml),
            Some("json") => Ok(ProfileFormat::Json),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Loads a [`BuildProfile`] from a file, layering defaults and environment.
#[derive(Debug, Clone)]
pub struct ProfileLoader {
    env_prefix: String,
    use_env: bool,
}

impl Default for ProfileLoader {
    fn default() -> Self {
        Self {
            env_prefix: "STRATA_".to_string(),
            use_env: true,
        }
    }
}

impl ProfileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable environment overrides (tests, embedding).
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Build the figment chain for a profile file.
    pub fn figment(&self, path: &Path) -> Result<Figment> {
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let mut figment = Figment::new().merge(Serialized::defaults(BuildProfile::default()));
        figment = match ProfileFormat::from_path(path)? {
            ProfileFormat::Toml => figment.merge(Toml::file(path)),
            ProfileFormat::Json => figment.merge(Json::file(path)),
        };
        if self.use_env {
            figment = figment.merge(Env::prefixed(&self.env_prefix).only(ENV_KEYS));
        }
        Ok(figment)
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<BuildProfile> {
        let path = path.as_ref();
        let profile: BuildProfile = self.figment(path)?.extract()?;
        tracing::debug!(
            path = %path.display(),
            layers = profile.layers.len(),
            "loaded build profile"
        );
        Ok(profile)
    }
}

/// Load a profile with the default loader.
pub fn load_profile(path: impl AsRef<Path>) -> Result<BuildProfile> {
    ProfileLoader::new().load(path)
}

/// Find a conventionally named profile in `root`.
pub fn find_profile(root: impl AsRef<Path>) -> Option<PathBuf> {
    PROFILE_FILENAMES
        .iter()
        .map(|name| root.as_ref().join(name))
        .find(|p| p.is_file())
}

impl BuildProfile {
    /// Create from a JSON value (programmatic profiles from an API or a job queue).
    ///
    /// Defaults are applied for every missing key.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "profile".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(s).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("Invalid TOML syntax: {e}")),
        })?;
        let value = serde_json::to_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("TOML to JSON conversion failed: {e}")),
        })?;
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "profile".to_string(),
            hint: Some(e.to_string()),
        })
    }
}
