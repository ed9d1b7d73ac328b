//! Runtime version discovery.

use crate::error::{Error, Result};
use crate::process::{ProcessRunner, RunOptions};
use compat_config::{Version, parse_version_output};
use std::cell::OnceCell;

/// Runs `ansible --version` once per instance and remembers the answer.
///
/// Failures are not cached: a later call probes again.
#[derive(Debug, Default)]
pub struct VersionProbe {
    cached: OnceCell<Version>,
}

impl VersionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> Option<&Version> {
        self.cached.get()
    }

    pub fn version(&self, runner: &ProcessRunner) -> Result<Version> {
        if let Some(version) = self.cached.get() {
            return Ok(version.clone());
        }

        let output = runner.run(&["ansible", "--version"], &RunOptions::default())?;
        if !output.success() {
            return Err(Error::MissingRuntime {
                message: format!(
                    "Unable to find a working copy of ansible executable.\n{output}"
                ),
                output: Some(output),
            });
        }
        let version = parse_version_output(&output.stdout)
            .map_err(|e| Error::invalid_prerequisite(e.to_string()))?;
        tracing::debug!(%version, "Detected runtime version");
        Ok(self.cached.get_or_init(|| version).clone())
    }
}

/// `lower <= version < upper`, each bound optional.
pub fn version_in_range(version: &Version, lower: Option<&str>, upper: Option<&str>) -> Result<bool> {
    if let Some(lower) = lower {
        if *version < Version::parse(lower)? {
            return Ok(false);
        }
    }
    if let Some(upper) = upper {
        if *version >= Version::parse(upper)? {
            return Ok(false);
        }
    }
    Ok(true)
}
