//! Sync command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::utils::load_corpus;

/// Execute the sync command.
///
/// Indexes the folder into a throwaway in-memory corpus, so the report
/// shows what a server started on this folder would hold.
pub async fn execute(dir: &Path, json: bool, quiet: bool) -> Result<()> {
    let (index, report) = load_corpus(dir).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !quiet {
        println!("{} {}", "Indexed".green().bold(), dir.display());
    }
    println!("   {} {}", "Scanned:".dimmed(), report.scanned);
    println!("   {} {}", "Inserted:".dimmed(), report.inserted);
    println!("   {} {}", "Duplicates:".dimmed(), report.duplicates);
    println!("   {} {}", "Skipped:".dimmed(), report.skipped.len());
    for skipped in &report.skipped {
        println!(
            "     {} {} ({})",
            "-".yellow(),
            skipped.path.display(),
            skipped.reason
        );
    }
    if !quiet {
        println!("   {} {}", "Corpus size:".dimmed(), index.len().await?);
    }

    Ok(())
}
