//! Error types for compat-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from the runtime layer
    #[error(transparent)]
    Runtime(#[from] compat_runtime::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Runtime(e) => e.code(),
            Self::User { .. } => compat_runtime::constants::GENERIC_ERROR_RC,
        }
    }
}
