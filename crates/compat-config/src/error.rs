//! Error types for compat-config

/// Result type for compat-config operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Version string that cannot be mapped to semver.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// `--version` output without a recognizable version line.
    #[error(
        "Unable to parse ansible cli version: {output}\nKeep in mind that only {minimum} or newer are supported."
    )]
    UnparsableVersionOutput { output: String, minimum: String },

    /// A configuration value has the wrong shape.
    #[error("Unexpected ansible configuration: {key} should be {expected}, found {found}")]
    InvalidValue {
        key: String,
        expected: String,
        found: String,
    },
}
