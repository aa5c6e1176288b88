//! Build profile schema for the strata bundler.
//!
//! ```
//! use strata_config::BuildProfile;
//! use serde_json::json;
//!
//! let profile = BuildProfile::from_value(json!({
//!     "prefixes": [["app", "../app"]],
//!     "layers": [{ "name": "app.main", "dependencies": ["app.main"] }]
//! }))
//! .unwrap();
//! assert_eq!(profile.base_package, "dojo");
//! ```

pub mod error;
pub mod html;
pub mod loading;
pub mod options;
pub mod profile;
pub mod validation;

pub use error::*;
pub use html::{load_profile_from_html, profile_from_html};
pub use loading::{PROFILE_FILENAMES, ProfileLoader, find_profile, load_profile};
pub use options::{CssOptimize, OptimizeMode, OptimizeSetting, StripConsole, StripConsoleParse};
pub use profile::*;
pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_schema};
