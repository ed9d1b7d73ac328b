//! Error types for compat-runtime

use crate::constants::{
    ANSIBLE_MISSING_RC, GENERIC_ERROR_RC, INVALID_CONFIG_RC, INVALID_PREREQUISITES_RC,
};
use crate::process::ProcessOutput;
use std::path::PathBuf;

/// Result type for compat-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or driving the runtime.
///
/// Each variant maps to a process exit code through [`Error::code`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The runtime executable is absent, not executable, or failed.
    #[error("{message}")]
    MissingRuntime {
        message: String,
        output: Option<ProcessOutput>,
    },

    /// A declared dependency, manifest or role name is unusable.
    #[error("{message}")]
    InvalidPrerequisite { message: String },

    /// An external command returned a non-zero exit code.
    #[error("Command failed: {output}")]
    Command { output: ProcessOutput },

    /// Any other runtime inconsistency.
    #[error("{message}")]
    Runtime { message: String },

    #[error("Role metadata not found, expected {path}")]
    MissingMetadata { path: PathBuf },

    #[error("Invalid options file {path}: {message}")]
    Options { path: PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] compat_config::Error),

    #[error(transparent)]
    Fs(#[from] compat_fs::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_prerequisite(message: impl Into<String>) -> Self {
        Self::InvalidPrerequisite {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingRuntime { .. } => ANSIBLE_MISSING_RC,
            Self::InvalidPrerequisite { .. } => INVALID_PREREQUISITES_RC,
            Self::Options { .. } => INVALID_CONFIG_RC,
            _ => GENERIC_ERROR_RC,
        }
    }

    /// Captured output of the failing command, when there is one.
    pub fn output(&self) -> Option<&ProcessOutput> {
        match self {
            Self::MissingRuntime { output, .. } => output.as_ref(),
            Self::Command { output } => Some(output),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let missing = Error::MissingRuntime {
            message: "gone".into(),
            output: None,
        };
        assert_eq!(missing.code(), 4);
        assert_eq!(Error::invalid_prerequisite("x").code(), 10);
        assert_eq!(Error::runtime("x").code(), 1);
        let options = Error::Options {
            path: "x.toml".into(),
            message: "bad".into(),
        };
        assert_eq!(options.code(), 2);
    }

    #[test]
    fn command_error_carries_output() {
        let output = ProcessOutput {
            args: vec!["ansible-galaxy".into(), "role".into(), "install".into()],
            returncode: 1,
            stdout: "out".into(),
            stderr: "boom".into(),
        };
        let err = Error::Command { output };
        assert_eq!(err.code(), 1);
        assert_eq!(err.output().map(|o| o.returncode), Some(1));
        let text = err.to_string();
        assert!(text.contains("ansible-galaxy role install"));
        assert!(text.contains("boom"));
    }
}
