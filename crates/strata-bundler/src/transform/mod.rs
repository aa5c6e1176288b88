//! Text transforms applied to assembled layers.
//!
//! Each layer passes through, in order: static feature substitution
//! ([`has`]), string interning ([`intern`]), resource-bundle flattening
//! ([`nls`]) and compression ([`optimize`]). Theme stylesheets go through
//! [`css`] separately.

pub mod css;
pub mod has;
pub mod intern;
pub mod nls;
pub mod optimize;

pub use css::{FileCache, flatten, optimize_css, process_theme};
pub use has::{HasResolution, apply_static_has, resolve_has_expression};
pub use intern::Interner;
pub use nls::{BundleEvaluator, BundleRef, Flattened, NlsFlattener, SourceBundleEvaluator};
pub use optimize::{CompressOptions, CompressorBackend, backend_for, optimize};
