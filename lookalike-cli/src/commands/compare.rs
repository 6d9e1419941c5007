//! Compare command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use lookalike_core::fingerprint::{decode_image, to_luma601};
use lookalike_core::{similarity_score, OrbMatcher, PerceptualHasher};
use tracing::debug;

use crate::utils::{color_percent, read_input};

/// Execute the compare command.
pub fn execute(first: &Path, second: &Path, max_distance: u32, json: bool) -> Result<()> {
    let image_a = decode_image(&read_input(first)?)
        .with_context(|| format!("Failed to decode image: {}", first.display()))?;
    let image_b = decode_image(&read_input(second)?)
        .with_context(|| format!("Failed to decode image: {}", second.display()))?;

    let hasher = PerceptualHasher::new();
    let hash_a = hasher.hash_image(&image_a);
    let hash_b = hasher.hash_image(&image_b);
    let distance = hash_a.hamming_distance(&hash_b)?;
    let score = similarity_score(distance, hash_a.bit_len());

    let matcher = OrbMatcher::default().with_max_distance(max_distance);
    let good_matches = matcher.count_image_matches(&to_luma601(&image_a), &to_luma601(&image_b));

    debug!(distance, score, good_matches, "Compared images");

    if json {
        let report = serde_json::json!({
            "a": { "path": first.display().to_string(), "imageHash": hash_a.to_hex() },
            "b": { "path": second.display().to_string(), "imageHash": hash_b.to_hex() },
            "distance": distance,
            "similarity": score,
            "goodMatches": good_matches,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("   {} {}  {}", "A:".dimmed(), hash_a, first.display());
    println!("   {} {}  {}", "B:".dimmed(), hash_b, second.display());
    println!(
        "   {} {} of {} bits",
        "Distance:".dimmed(),
        distance,
        hash_a.bit_len()
    );
    println!("   {} {}", "Similarity:".dimmed(), color_percent(score));
    println!("   {} {}", "Keypoints:".dimmed(), good_matches);

    Ok(())
}
