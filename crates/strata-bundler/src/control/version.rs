//! Release version parsing and stamping.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)\.?(\d*)\.?(\d*)\.?(.*)$").expect("valid regex"));

static VERSION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"major:\s*\d*,\s*minor:\s*\d*,\s*patch:\s*\d*,\s*flag:\s*".*?"\s*,"#)
        .expect("valid regex")
});

/// `major.minor.patch.flag`, missing parts default to `0` / `""`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub flag: String,
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let Some(caps) = VERSION.captures(version) else {
            return Self::default();
        };
        let number = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        Self {
            major: number(1),
            minor: number(2),
            patch: number(3),
            flag: caps.get(4).map_or("", |m| m.as_str()).to_string(),
        }
    }

    /// Rewrite every `major: N, minor: N, patch: N, flag: "...",` marker.
    pub fn stamp(&self, text: &str) -> String {
        let replacement = format!(
            "major: {}, minor: {}, patch: {}, flag: \"{}\",",
            self.major,
            self.minor,
            self.patch,
            self.flag.replace('$', "$$")
        );
        VERSION_MARKER
            .replace_all(text, replacement.as_str())
            .into_owned()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.flag.is_empty() {
            write!(f, ".{}", self.flag)?;
        }
        Ok(())
    }
}

/// Stamp `text` when a version is configured, otherwise leave it untouched.
pub fn stamp_version(version: Option<&Version>, text: &str) -> String {
    match version {
        Some(v) => v.stamp(text),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_versions() {
        assert_eq!(
            Version::parse("1.7.2.dev"),
            Version {
                major: 1,
                minor: 7,
                patch: 2,
                flag: "dev".into()
            }
        );
        assert_eq!(
            Version::parse("1.6"),
            Version {
                major: 1,
                minor: 6,
                ..Default::default()
            }
        );
        assert_eq!(Version::parse(""), Version::default());
        assert_eq!(Version::parse("1.7.0rc1").flag, "rc1");
    }

    #[test]
    fn stamps_markers() {
        let src = r#"dojo.version = { major: 0, minor: 0, patch: 0, flag: "dev", revision: 1 };"#;
        let out = Version::parse("1.7.2.b1").stamp(src);
        assert_eq!(
            out,
            r#"dojo.version = { major: 1, minor: 7, patch: 2, flag: "b1", revision: 1 };"#
        );
    }

    #[test]
    fn no_version_leaves_text_untouched() {
        let src = r#"major: 0, minor: 0, patch: 0, flag: "","#;
        assert_eq!(stamp_version(None, src), src);
    }
}
