//! Error types for ksync-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from ksync-core
    #[error(transparent)]
    Core(#[from] ksync_core::Error),

    /// Error from ksync-fs
    #[error(transparent)]
    Fs(#[from] ksync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed settings file
    #[error("Invalid settings file: {0}")]
    Settings(#[from] toml::de::Error),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Interrupt handler could not be installed
    #[error("Cannot install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

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
}
