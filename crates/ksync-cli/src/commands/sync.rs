//! One-shot sync and report printing

use colored::Colorize;
use ksync_core::{CollectionReport, CollectionStatus, SyncEngine, SyncOptions, SyncReport};

use crate::error::Result;

/// Sync every collection once and print the report.
pub fn run_sync(engine: &mut SyncEngine, options: SyncOptions, json: bool) -> Result<SyncReport> {
    if !json {
        println!(
            "{} Syncing knowledge from {}{}",
            "=>".blue().bold(),
            engine.settings().knowledge_dir.display().to_string().cyan(),
            if options.dry_run { " (dry run)" } else { "" }
        );
    }

    let report = engine.sync_all(options)?;
    print_report(&report, json)?;
    Ok(report)
}

/// Print a report as colored text, or as pretty JSON for scripting.
pub fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for collection in &report.collections {
        print_collection(collection);
    }
    println!();
    println!("{}", summary_line(report).bold());
    Ok(())
}

fn print_collection(collection: &CollectionReport) {
    let name = collection.collection.cyan();
    match &collection.status {
        CollectionStatus::Aborted { reason } => {
            println!("   {} {}: {}", "FAILED".red().bold(), name, reason);
        }
        CollectionStatus::Unavailable => {
            let label = "SKIPPED".yellow().bold();
            println!("   {} {}: no reference resolved, left untouched", label, name);
        }
        CollectionStatus::Synced => {
            let counts = collection.counts();
            let status = if collection.failures.is_empty() {
                "OK".green().bold()
            } else {
                "PARTIAL".yellow().bold()
            };
            println!(
                "   {} {}: {} added, {} updated, {} removed, {} unchanged",
                status,
                name,
                counts.added,
                counts.updated,
                counts.removed,
                collection.skipped()
            );
            for failure in &collection.failures {
                println!("      {} {}: {}", "!".red(), failure.file_name, failure.message.dimmed());
            }
        }
    }
    for warning in &collection.warnings {
        println!("      {} {}", "-".yellow(), warning.dimmed());
    }
}

/// `Summary: N added, N updated, N removed`, prefixed in dry runs.
pub fn summary_line(report: &SyncReport) -> String {
    let totals = report.totals();
    format!(
        "{}Summary: {} added, {} updated, {} removed",
        if report.dry_run { "[DRY RUN] " } else { "" },
        totals.added,
        totals.updated,
        totals.removed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksync_core::DiffAction;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn report(dry_run: bool) -> SyncReport {
        let mut handbook = CollectionReport::new("handbook");
        handbook.record("a.md", DiffAction::Add);
        handbook.record("b.md", DiffAction::Update);
        handbook.record("c.md", DiffAction::Skip);
        handbook.record("old.md", DiffAction::Remove);
        SyncReport {
            dry_run,
            collections: vec![handbook],
        }
    }

    #[rstest]
    #[case(false, "Summary: 1 added, 1 updated, 1 removed")]
    #[case(true, "[DRY RUN] Summary: 1 added, 1 updated, 1 removed")]
    fn summary_line_format(#[case] dry_run: bool, #[case] expected: &str) {
        assert_eq!(summary_line(&report(dry_run)), expected);
    }

    #[test]
    fn empty_report_summarizes_zeroes() {
        assert_eq!(
            summary_line(&SyncReport::default()),
            "Summary: 0 added, 0 updated, 0 removed"
        );
    }
}
