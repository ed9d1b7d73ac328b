//! Runtime environment preparation for ansible-compat
//!
//! This crate drives the external automation runtime on behalf of a
//! project: it probes the installed version, installs the collections and
//! roles the project declares into a per-project cache, and wires search
//! path variables so later invocations find them.
//!
//! The [`Runtime`] facade owns all per-instance state. Nothing here reads
//! or writes the process environment after construction.

pub mod constants;
pub mod error;
pub mod galaxy;
pub mod installer;
pub mod options;
pub mod paths;
pub mod probe;
pub mod process;
pub mod roles;
pub mod runtime;
pub mod sink;

pub use error::{Error, Result};
pub use galaxy::{Collection, InstalledCollection};
pub use installer::{DependencyInstaller, RequirementManifest};
pub use options::RuntimeOptions;
pub use paths::PathEnvironment;
pub use probe::VersionProbe;
pub use process::{Environ, ProcessOutput, ProcessRunner, RunOptions};
pub use roles::{NameCheck, RoleIdentity};
pub use runtime::{PrepareOptions, Runtime, RuntimeBuilder};
pub use sink::{CollectingSink, TracingSink, WarningSink};

pub use compat_config::{ConfigStore, ConfigValue, Version};
pub use compat_fs::CacheDir;
