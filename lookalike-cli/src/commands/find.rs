//! Match command implementation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use lookalike_core::{MatchCascade, MatchConfig, MatchOutcome, OrbMatcher};
use tracing::info;

use crate::utils::{format_score, load_corpus, read_input};

/// Knobs for a single lookup.
pub struct MatchOptions {
    pub threshold: f64,
    pub min_features: usize,
    pub max_distance: u32,
    pub deadline_secs: Option<u64>,
    pub json: bool,
    pub quiet: bool,
}

/// Execute the match command.
pub async fn execute(file: &Path, corpus: &Path, options: MatchOptions) -> Result<()> {
    let data = read_input(file)?;
    let (index, report) = load_corpus(corpus).await?;
    info!(corpus = %corpus.display(), entries = report.inserted, "Corpus loaded");

    let config = MatchConfig {
        near_match_threshold: options.threshold,
        min_feature_matches: options.min_features,
        deadline: options
            .deadline_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    };
    let matcher = OrbMatcher::default().with_max_distance(options.max_distance);
    let cascade = MatchCascade::with_matcher(index, matcher, config);

    let outcome = cascade
        .find_matches(&data)
        .await
        .with_context(|| format!("Failed to match image: {}", file.display()))?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&response_json(&outcome))?);
    } else {
        print_outcome(&outcome, options.quiet);
    }

    Ok(())
}

/// The same `{message, status, matches}` shape the HTTP service returns.
fn response_json(outcome: &MatchOutcome) -> serde_json::Value {
    serde_json::json!({
        "message": outcome.message(),
        "status": outcome.status,
        "matches": outcome.candidates,
        "timedOut": outcome.timed_out,
        "skipped": outcome.skipped,
    })
}

fn print_outcome(outcome: &MatchOutcome, quiet: bool) {
    if quiet {
        for candidate in &outcome.candidates {
            println!("{}\t{}", format_score(candidate), candidate.image_path);
        }
        return;
    }

    if outcome.is_match() {
        println!("{}", outcome.message().green().bold());
        for candidate in &outcome.candidates {
            println!(
                "   {:>14}  {}",
                format_score(candidate),
                candidate.image_path
            );
        }
    } else {
        println!("{}", outcome.message().yellow());
    }

    if !outcome.skipped.is_empty() {
        println!(
            "   {} {} corpus entries skipped",
            "Note:".dimmed(),
            outcome.skipped.len()
        );
    }
}
