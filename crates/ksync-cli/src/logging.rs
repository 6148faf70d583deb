//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "ksync=info,ksync_core=info";

/// Install a stderr subscriber so stdout carries only the summary.
///
/// `RUST_LOG` wins when set; otherwise `verbose` switches the default
/// from info to debug.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "ksync=debug,ksync_core=debug,ksync_fs=debug"
        } else {
            DEFAULT_DIRECTIVES
        })
    });

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
