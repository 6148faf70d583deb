//! Filesystem primitives for knowledge-sync
//!
//! Provides the content hash used to detect changed sources and the
//! atomic, locked write used to persist the sync cache.

pub mod checksum;
pub mod error;
pub mod io;

pub use checksum::{ContentHash, hash_bytes, hash_file};
pub use error::{Error, Result};
