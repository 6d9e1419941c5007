//! Lookalike Core - image similarity lookup against a reference corpus
//!
//! This crate decides whether an image, or something visually close to it,
//! already exists in a curated set of reference images.
//!
//! # Features
//!
//! - 64-bit DCT perceptual fingerprints, stable under re-encoding and mild
//!   resizing
//! - Hamming distance with a 0-100 similarity score
//! - A fingerprint-keyed corpus index with idempotent folder sync
//! - ORB keypoint matching as a fallback for cropped queries
//! - A three-stage match cascade with an optional per-query deadline
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use lookalike_core::{CorpusIndex, MatchCascade, MatchConfig, MemoryCorpusStore};
//!
//! # async fn example() -> lookalike_core::Result<()> {
//! let index = Arc::new(CorpusIndex::new(Arc::new(MemoryCorpusStore::new())));
//! index.sync(Path::new("our_images")).await?;
//!
//! let cascade = MatchCascade::new(index, MatchConfig::default());
//! let outcome = cascade.find_matches(&std::fs::read("query.jpg")?).await?;
//!
//! println!("{}", outcome.message());
//! for candidate in &outcome.candidates {
//!     println!("{:>8.2}  {}", candidate.match_score, candidate.image_path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod corpus;
pub mod error;
pub mod features;
pub mod fingerprint;

// Re-export main types for convenience
pub use cascade::{
    MatchCandidate, MatchCascade, MatchConfig, MatchOutcome, MatchStatus, QueryImage, ScoreKind,
    SkippedEntry, DEFAULT_MIN_FEATURE_MATCHES, DEFAULT_NEAR_MATCH_THRESHOLD,
};
pub use corpus::{
    CorpusDocument, CorpusEntry, CorpusIndex, CorpusStore, MemoryCorpusStore, SkipReason,
    SyncReport,
};
pub use error::{LookalikeError, Result};
pub use features::{
    FeatureMatcher, OrbConfig, OrbExtractor, OrbFeatures, OrbMatcher,
    DEFAULT_MAX_DESCRIPTOR_DISTANCE,
};
pub use fingerprint::{
    compute_phash, hamming_distance, similarity_score, Fingerprint, PerceptualHasher,
    FINGERPRINT_BITS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Sync a folder, then look up one of its files byte for byte.
    #[tokio::test]
    async fn test_sync_then_exact_lookup() {
        let dir = TempDir::new().expect("tempdir");
        let img: RgbImage = ImageBuffer::from_fn(128, 96, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
        });
        let path = dir.path().join("reference.png");
        DynamicImage::ImageRgb8(img)
            .save(&path)
            .expect("write reference");

        let index = Arc::new(CorpusIndex::new(Arc::new(MemoryCorpusStore::new())));
        let report = index.sync(dir.path()).await.expect("sync");
        assert_eq!(report.inserted, 1);

        let cascade = MatchCascade::new(index, MatchConfig::default());
        let bytes = std::fs::read(&path).expect("read reference");
        let outcome = cascade.find_matches(&bytes).await.expect("cascade");

        assert_eq!(outcome.status, MatchStatus::Exact);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].match_score, 100.0);
        assert_eq!(
            outcome.candidates[0].image_path,
            path.to_string_lossy().into_owned()
        );
    }
}
