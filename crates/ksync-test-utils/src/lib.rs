//! Shared test utilities for the knowledge-sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`remote`]: [`FakeRemote`], an in-memory [`ksync_core::RemoteStore`]
//!   that journals every call and can be scripted to fail
//! - [`knowledge`]: [`KnowledgeFixture`] builder for a knowledge root with
//!   source files and definitions

pub mod knowledge;
pub mod remote;

pub use knowledge::KnowledgeFixture;
pub use remote::{Call, FakeRemote};
