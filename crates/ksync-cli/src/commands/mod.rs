//! Command implementations

mod sync;
mod watch;

pub use sync::run_sync;
pub use watch::run_watch;
