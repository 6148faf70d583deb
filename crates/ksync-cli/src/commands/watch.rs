//! Watch mode

use std::sync::atomic::Ordering;
use std::time::Duration;

use colored::Colorize;
use ksync_core::{SyncEngine, SyncOptions, WatchLoop};

use super::sync::print_report;
use crate::error::Result;

/// Poll for changes until interrupted, printing each pass that synced.
pub fn run_watch(
    engine: &mut SyncEngine,
    interval: Duration,
    options: SyncOptions,
    json: bool,
) -> Result<()> {
    let mut watch = WatchLoop::new(engine, interval, options);
    let stop = watch.stop_handle();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;

    if !json {
        println!(
            "{} Watching for changes every {}s (Ctrl-C to stop)",
            "=>".blue().bold(),
            interval.as_secs()
        );
    }

    watch.run(|report| {
        if let Err(e) = print_report(report, json) {
            tracing::error!("cannot print report: {}", e);
        }
    })?;

    if !json {
        println!("{} Stopped watching.", "OK".green().bold());
    }
    Ok(())
}
