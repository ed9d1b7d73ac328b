//! Version and configuration access for the external automation runtime.
//!
//! - [`Version`] parses the loosely formatted version strings the runtime
//!   and its collections use and orders them with semver semantics.
//! - [`ConfigStore`] holds the parsed output of the configuration dump and
//!   resolves keys case-insensitively, including legacy aliases.

pub mod error;
pub mod store;
pub mod version;

pub use error::{Error, Result};
pub use store::{ConfigStore, ConfigValue};
pub use version::{Version, parse_version_output};
