use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::paths::compact_path;

/// Canonical, slash-separated identifier of a module (`app/widgets/Button`).
///
/// Legacy dotted ids (`app.widgets.Button`) are converted on construction.
/// Ids are always absolute in the module namespace: they never start with
/// `.` or `/` and never contain `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    /// Parse an absolute module id in either slashed or dotted form.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ModuleIdError> {
        let raw = id.as_ref().trim();
        if raw.is_empty() {
            return Err(ModuleIdError::Empty);
        }
        if raw.starts_with('.') || raw.starts_with('/') {
            return Err(ModuleIdError::Relative(raw.to_string()));
        }

        let slashed = if raw.contains('/') {
            raw.to_string()
        } else {
            raw.replace('.', "/")
        };
        Self::validated(slashed)
    }

    fn validated(id: String) -> Result<Self, ModuleIdError> {
        let id = id.trim_end_matches(".js").to_string();
        if id.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
            || id.chars().any(|c| c.is_whitespace() || c == '!' || c == '\\')
        {
            return Err(ModuleIdError::Invalid(id));
        }
        Ok(Self(id))
    }

    /// Resolve a dependency specifier as written inside `self`.
    ///
    /// `./x` and `../x` are relative to the directory of `self`; anything else
    /// is parsed as an absolute id.
    pub fn resolve(&self, specifier: &str) -> Result<Self, ModuleIdError> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let dir = match self.0.rfind('/') {
                Some(idx) => &self.0[..idx],
                None => "",
            };
            let joined = compact_path(&format!("{dir}/{specifier}"));
            let joined = joined.trim_start_matches('/');
            if joined.starts_with("..") || joined == "." {
                return Err(ModuleIdError::EscapesNamespace {
                    specifier: specifier.to_string(),
                    referrer: self.0.clone(),
                });
            }
            Self::validated(joined.to_string())
        } else {
            Self::new(specifier)
        }
    }

    /// First segment: the package this module belongs to.
    pub fn top_level(&self) -> &str {
        match self.0.find('/') {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Everything after the package segment, if any.
    pub fn rest(&self) -> Option<&str> {
        self.0.find('/').map(|idx| &self.0[idx + 1..])
    }

    /// Last segment.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Containing "directory" in id space, `None` for a bare package id.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[..idx])
    }

    /// Dotted form used by legacy `dojo.provide` calls.
    pub fn to_dotted(&self) -> String {
        self.0.replace('/', ".")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a sub-path onto this id (`app` + `nls/strings`).
    pub fn join(&self, rest: &str) -> Result<Self, ModuleIdError> {
        Self::validated(format!("{}/{}", self.0, rest.trim_matches('/')))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ModuleId {
    type Err = ModuleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ModuleId::new(value).map_err(serde::de::Error::custom)
    }
}

/// Error type for `ModuleId` construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleIdError {
    #[error("module id is empty")]
    Empty,

    #[error("'{0}' is relative and has no referrer")]
    Relative(String),

    #[error("'{0}' is not a valid module id")]
    Invalid(String),

    #[error("'{specifier}' escapes the module namespace from '{referrer}'")]
    EscapesNamespace { specifier: String, referrer: String },
}
