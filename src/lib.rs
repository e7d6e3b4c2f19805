//! cargo-groom - Cargo cache grooming for CI
//!
//! Prunes restored `target/` directories and `$CARGO_HOME` registry and
//! git caches down to exactly what the current dependency graph needs.

pub mod clean;
pub mod cli;
pub mod config;
pub mod error;
pub mod incremental;
pub mod process;
pub mod state;
pub mod workspace;

pub use error::{GroomError, GroomResult};
