//! Common utility functions shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::{ColoredString, Colorize};
use lookalike_core::{CorpusIndex, MatchCandidate, MemoryCorpusStore, ScoreKind, SyncReport};
use tracing::debug;

/// Read an input file into memory.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = data.len(), "Read file");
    Ok(data)
}

/// Build an in-memory corpus from a reference folder.
pub async fn load_corpus(folder: &Path) -> Result<(Arc<CorpusIndex>, SyncReport)> {
    if !folder.is_dir() {
        bail!("Corpus folder not found: {}", folder.display());
    }

    let index = Arc::new(CorpusIndex::new(Arc::new(MemoryCorpusStore::new())));
    let report = index
        .sync(folder)
        .await
        .with_context(|| format!("Failed to index folder: {}", folder.display()))?;
    Ok((index, report))
}

/// Parse a similarity threshold in `0..=100`.
pub fn parse_threshold(value: &str) -> std::result::Result<f64, String> {
    let threshold: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if (0.0..=100.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(format!("{threshold} is outside 0..=100"))
    }
}

/// Render a candidate score with its unit.
pub fn format_score(candidate: &MatchCandidate) -> String {
    match candidate.score_kind {
        ScoreKind::Percent => format!("{:.2}%", candidate.match_score),
        ScoreKind::FeatureCount => format!("{} keypoints", candidate.match_score),
    }
}

/// Color a similarity percentage by how convincing it is.
pub fn color_percent(score: f64) -> ColoredString {
    let text = format!("{score:.2}%");
    if score >= 90.0 {
        text.green()
    } else if score >= 75.0 {
        text.yellow()
    } else {
        text.red()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("75"), Ok(75.0));
        assert_eq!(parse_threshold("0"), Ok(0.0));
        assert_eq!(parse_threshold("100"), Ok(100.0));
        assert!(parse_threshold("100.5").is_err());
        assert!(parse_threshold("-1").is_err());
        assert!(parse_threshold("high").is_err());
    }

    #[test]
    fn test_format_score() {
        let percent = MatchCandidate {
            match_score: 96.88,
            image_path: "a.png".into(),
            image_hash: None,
            score_kind: ScoreKind::Percent,
        };
        assert_eq!(format_score(&percent), "96.88%");

        let features = MatchCandidate {
            match_score: 42.0,
            score_kind: ScoreKind::FeatureCount,
            ..percent
        };
        assert_eq!(format_score(&features), "42 keypoints");
    }

    #[tokio::test]
    async fn test_load_corpus_missing_folder() {
        let err = load_corpus(Path::new("/definitely/not/a/folder"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Corpus folder not found"));
    }
}
