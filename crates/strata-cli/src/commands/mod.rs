//! Command implementations. Each module exposes an `execute` function
//! taking its parsed arguments.

pub mod build;
pub mod check;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use check::execute as check_execute;
