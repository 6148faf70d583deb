//! Error types for ksync-core

use crate::remote::RemoteError;

/// Result type for ksync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ksync-core operations
///
/// Only configuration problems and collection bootstrap failures escape the
/// engine. Per-file problems are recorded in the collection report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing credential, unreadable knowledge root, or malformed setting
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// An exclusion pattern that does not compile
    #[error("Invalid exclude pattern '{pattern}': {message}")]
    Glob { pattern: String, message: String },

    /// A remote call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Filesystem error from ksync-fs
    #[error(transparent)]
    Fs(#[from] ksync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
