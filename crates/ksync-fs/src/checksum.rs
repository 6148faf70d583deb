//! SHA-256 content hashing
//!
//! A [`ContentHash`] is the lowercase hex SHA-256 of a file's full byte
//! content. It is the value recorded in the sync cache and the key the
//! vector store indexes residual records under, so it carries no prefix.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Hex-encoded SHA-256 digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hash an in-memory buffer.
pub fn hash_bytes(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    ContentHash(format!("{:x}", hasher.finalize()))
}

/// Hash the full content of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(hash_bytes(&content))
}
