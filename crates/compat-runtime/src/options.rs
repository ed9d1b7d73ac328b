//! Tunable runtime options.
//!
//! Options are plain data with serde defaults, so a partial TOML file only
//! overrides what it names:
//!
//! ```toml
//! max_retries = 2
//! retry_delay_ms = 500
//! python = "/opt/venv/bin/python"
//! ```

use crate::constants::{ANSIBLE_COLLECTIONS_PATH, ANSIBLE_COLLECTIONS_PATHS};
use crate::error::{Error, Result};
use compat_config::Version;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the project directory when no explicit path is given.
pub const OPTIONS_FILE: &str = ".ansible-compat.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
    /// Extra attempts for retryable commands.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay_ms: u64,
    /// Runtimes at or above this version read the singular collections path
    /// variable, older ones the plural spelling.
    pub collections_path_var_threshold: Version,
    /// Runtimes below this version cannot install a collection straight
    /// from a source directory and need a build step first.
    pub build_before_install_below: Version,
    /// Directory holding the runtime executables. Searched on `PATH` when
    /// unset.
    pub bin_dir: Option<PathBuf>,
    /// Interpreter used to check the runtime's python module.
    pub python: String,
    /// Number of `-v` flags passed to installer commands.
    pub verbosity: u8,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 30_000,
            collections_path_var_threshold: Version::from(semver::Version::new(2, 10, 0)),
            build_before_install_below: Version::from(semver::Version::new(2, 11, 0)),
            bin_dir: None,
            python: "python3".to_string(),
            verbosity: 0,
        }
    }
}

impl RuntimeOptions {
    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&content).map_err(|message| Error::Options {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Load `<project>/.ansible-compat.toml`, or defaults when it is absent.
    pub fn discover(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(OPTIONS_FILE);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "Loading runtime options");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn from_toml(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Name of the collections path variable the given runtime reads.
    pub fn collections_path_var(&self, version: &Version) -> &'static str {
        if *version >= self.collections_path_var_threshold {
            ANSIBLE_COLLECTIONS_PATH
        } else {
            ANSIBLE_COLLECTIONS_PATHS
        }
    }

    /// `-v`, `-vv`, ... or `None` at verbosity zero.
    pub fn verbosity_flag(&self) -> Option<String> {
        (self.verbosity > 0).then(|| format!("-{}", "v".repeat(self.verbosity as usize)))
    }
}
