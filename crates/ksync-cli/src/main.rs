//! knowledge-sync CLI
//!
//! Syncs every definition in the knowledge directory once, or keeps
//! watching with `--watch`. Logs go to stderr; stdout carries the report.

mod cli;
mod commands;
mod config;
mod error;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use ksync_core::{SyncEngine, SyncOptions};

use cli::Cli;
use error::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let resolved = config::resolve(cli)?;
    tracing::debug!(
        knowledge_dir = %resolved.settings.knowledge_dir.display(),
        cache_file = %resolved.settings.cache_file.display(),
        api_url = %resolved.settings.api_url,
        jobs = resolved.settings.jobs,
        "resolved settings"
    );

    let options = SyncOptions {
        force: cli.force,
        dry_run: cli.dry_run,
    };
    let mut engine = SyncEngine::connect(resolved.settings)?;

    let report = commands::run_sync(&mut engine, options, cli.json)?;
    if cli.watch {
        commands::run_watch(&mut engine, resolved.interval, options, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
