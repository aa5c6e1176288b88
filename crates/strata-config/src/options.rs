//! String switches parsed into typed build options.
//!
//! Profiles carry optimizer choices as short strings (`"shrinksafe.keepLines"`,
//! `"comments"`). They are parsed exactly once, when the profile is
//! normalized; every later stage works with the enums below.

use serde::{Deserialize, Serialize};

/// Compression backend selected for layer bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeMode {
    /// Leave layer bodies untouched.
    None,
    /// Strip comments only.
    Comments,
    /// Identifier mangling and whitespace removal.
    #[default]
    Minify,
    /// Whole-program compression and mangling.
    Optimizing,
}

/// A parsed optimizer switch: backend plus the line-preservation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptimizeSetting {
    pub mode: OptimizeMode,
    pub keep_lines: bool,
}

impl OptimizeSetting {
    pub const NONE: Self = Self {
        mode: OptimizeMode::None,
        keep_lines: false,
    };

    /// Parse an optimizer switch from a profile string.
    ///
    /// Accepts `""`, `"comments"`, `"shrinksafe"`, `"minify"`, `"closure"`
    /// (case-insensitive) with an optional `.keepLines` suffix. Returns `None`
    /// for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let (base, keep_lines) = match lower.strip_suffix(".keeplines") {
            Some(base) => (base, true),
            None => (lower.as_str(), false),
        };
        let mode = match base {
            "" | "none" | "false" => OptimizeMode::None,
            "comments" => OptimizeMode::Comments,
            "shrinksafe" | "minify" | "uglify" => OptimizeMode::Minify,
            "closure" | "optimizing" => OptimizeMode::Optimizing,
            _ => return None,
        };
        Some(Self { mode, keep_lines })
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != OptimizeMode::None
    }
}

/// Stylesheet optimization switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CssOptimize {
    #[default]
    None,
    /// Inline imports and minify.
    Comments,
    /// Inline imports, keep one rule per line.
    CommentsKeepLines,
}

impl CssOptimize {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "false" => Some(CssOptimize::None),
            "comments" => Some(CssOptimize::Comments),
            "comments.keeplines" => Some(CssOptimize::CommentsKeepLines),
            _ => None,
        }
    }

    pub fn keep_lines(&self) -> bool {
        matches!(self, CssOptimize::CommentsKeepLines)
    }
}

/// Which console calls are removed before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StripConsole {
    None,
    /// Everything except `console.warn` and `console.error`.
    #[default]
    Normal,
    /// Everything except `console.error`.
    Warn,
    All,
}

/// Outcome of parsing a strip-console switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripConsoleParse {
    Known(StripConsole),
    /// A spelling that is still honoured but should be reported.
    Deprecated(StripConsole),
    Unknown,
}

impl StripConsole {
    pub fn parse(s: &str) -> StripConsoleParse {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => StripConsoleParse::Known(StripConsole::None),
            "normal" => StripConsoleParse::Known(StripConsole::Normal),
            "warn" => StripConsoleParse::Known(StripConsole::Warn),
            "all" => StripConsoleParse::Known(StripConsole::All),
            "normal,warn" => StripConsoleParse::Deprecated(StripConsole::Warn),
            "normal,error" => StripConsoleParse::Deprecated(StripConsole::All),
            _ => StripConsoleParse::Unknown,
        }
    }

    /// Console methods this level removes.
    pub fn strips(&self, method: &str) -> bool {
        match self {
            StripConsole::None => false,
            StripConsole::Normal => !matches!(method, "warn" | "error"),
            StripConsole::Warn => method != "error",
            StripConsole::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_switches() {
        assert_eq!(OptimizeSetting::parse(""), Some(OptimizeSetting::NONE));
        assert_eq!(
            OptimizeSetting::parse("Shrinksafe.keepLines"),
            Some(OptimizeSetting {
                mode: OptimizeMode::Minify,
                keep_lines: true
            })
        );
        assert_eq!(
            OptimizeSetting::parse("closure").map(|s| s.mode),
            Some(OptimizeMode::Optimizing)
        );
        assert_eq!(
            OptimizeSetting::parse("comments").map(|s| s.mode),
            Some(OptimizeMode::Comments)
        );
        assert!(OptimizeSetting::parse("packer").is_none());
    }

    #[test]
    fn css_switches() {
        assert_eq!(CssOptimize::parse(""), Some(CssOptimize::None));
        assert_eq!(
            CssOptimize::parse("comments.keepLines"),
            Some(CssOptimize::CommentsKeepLines)
        );
        assert!(CssOptimize::parse("aggressive").is_none());
    }

    #[test]
    fn strip_console_levels() {
        assert_eq!(
            StripConsole::parse("normal,warn"),
            StripConsoleParse::Deprecated(StripConsole::Warn)
        );
        assert_eq!(StripConsole::parse("bogus"), StripConsoleParse::Unknown);
        assert!(StripConsole::Normal.strips("log"));
        assert!(!StripConsole::Normal.strips("warn"));
        assert!(StripConsole::Warn.strips("warn"));
        assert!(!StripConsole::Warn.strips("error"));
        assert!(StripConsole::All.strips("error"));
        assert!(!StripConsole::None.strips("log"));
    }
}
