//! Pluggable profile validation strategies
//!
//! Structural checks only. Anything the normalizer can recover from (an
//! unknown layer dependency, an unparseable optimizer switch) is reported as a
//! build diagnostic instead of failing validation.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::error::{ConfigError, Result};
use crate::profile::BuildProfile;

/// Trait for pluggable profile validation strategies
pub trait ConfigValidator {
    fn validate(&self, profile: &BuildProfile) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// ```
/// use strata_config::{BuildProfile, ConfigValidator, LayerDecl, SchemaValidator};
///
/// let mut profile = BuildProfile::default();
/// profile.layers.push(LayerDecl::new("app.main").dependencies(["app.main"]));
/// SchemaValidator.validate(&profile).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, profile: &BuildProfile) -> Result<()> {
        if profile.layers.is_empty() {
            return Err(ConfigError::NoLayers);
        }

        if profile.base_package.trim().is_empty() || profile.base_package.contains('/') {
            return Err(ConfigError::SchemaValidation {
                message: format!("'{}' is not a valid base package", profile.base_package),
                hint: Some("Use a top-level package name such as \"dojo\"".to_string()),
            });
        }

        let mut names = FxHashSet::default();
        for layer in &profile.layers {
            if layer.name.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "layer name cannot be empty".to_string(),
                    hint: Some("Give every layer a filename or module id".to_string()),
                });
            }
            if !names.insert(layer.name.as_str()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("layer '{}' is declared more than once", layer.name),
                    hint: None,
                });
            }
            if layer.dependencies.iter().any(|d| d.trim().is_empty()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("layer '{}' has an empty dependency", layer.name),
                    hint: Some("Remove empty strings from 'dependencies'".to_string()),
                });
            }
        }

        let mut prefixes = FxHashSet::default();
        for prefix in &profile.prefixes {
            if !prefixes.insert(prefix.name.as_str()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("package '{}' is declared more than once", prefix.name),
                    hint: Some("Keep one prefix entry per top-level package".to_string()),
                });
            }
        }

        if profile.locales.iter().any(|l| l.contains('/')) {
            return Err(ConfigError::SchemaValidation {
                message: "locale names cannot contain '/'".to_string(),
                hint: None,
            });
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use)
///
/// Runs [`SchemaValidator`] then checks that explicitly declared package
/// locations exist under `root`.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, profile: &BuildProfile) -> Result<()> {
        SchemaValidator.validate(profile)?;

        // Prefix locations are relative to the base package's directory.
        let base = self
            .root
            .join(profile.base_path.as_deref().unwrap_or("."))
            .join(&profile.base_package);
        for prefix in &profile.prefixes {
            let location = base.join(&prefix.location);
            if !location.is_dir() && !self.root.join(&prefix.location).is_dir() {
                return Err(ConfigError::InvalidValue {
                    field: format!("prefixes.{}", prefix.name),
                    hint: Some(format!("directory '{}' does not exist", prefix.location)),
                });
            }
        }
        Ok(())
    }
}

pub fn validate_schema(profile: &BuildProfile) -> Result<()> {
    SchemaValidator.validate(profile)
}
