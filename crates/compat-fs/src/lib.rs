//! Filesystem helpers for ansible-compat
//!
//! Provides cache directory selection, well-known project paths and
//! the YAML/JSON loaders used to read manifests and metadata.

pub mod cache;
pub mod constants;
pub mod error;
pub mod loaders;

pub use cache::{CacheDir, CacheSelection, is_writable};
pub use constants::{ProjectPath, REQUIREMENT_LOCATIONS};
pub use error::{Error, Result};
pub use loaders::{Format, load, load_json, load_yaml};
