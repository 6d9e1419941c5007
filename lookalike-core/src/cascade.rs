//! The match cascade.
//!
//! A query is compared against the corpus in three stages, each attempted
//! only when the previous one produced nothing:
//!
//! 1. **Exact**: the query fingerprint is looked up by key. A hit returns
//!    that single entry at score 100.
//! 2. **Near-hash**: every stored fingerprint is scored against the query;
//!    entries at or above the near-match threshold are returned, best
//!    first.
//! 3. **Feature**: keypoint descriptors of the query are matched against
//!    every reference image still on disk; images with enough good matches
//!    are returned, most matches first. Scores in this stage are raw match
//!    counts, labelled [`ScoreKind::FeatureCount`].
//!
//! Corpus documents that cannot take part in a stage (missing or corrupted
//! fingerprint, missing file, undecodable file) are skipped, logged, and
//! reported in [`MatchOutcome::skipped`]. Only a query image that cannot be
//! decoded fails the call.
//!
//! An optional deadline is checked between corpus entries. When it passes,
//! the cascade stops and reports "no match" with `timed_out` set.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::corpus::{CorpusDocument, CorpusEntry, CorpusIndex, SkipReason};
use crate::error::Result;
use crate::features::{FeatureMatcher, OrbMatcher};
use crate::fingerprint::{decode_image, similarity_score, to_luma601, Fingerprint};

/// Minimum near-hash score. Earlier deployments disagreed (55, or a 5-bit
/// distance); 75 is the default.
pub const DEFAULT_NEAR_MATCH_THRESHOLD: f64 = 75.0;

/// Minimum good descriptor matches for a feature-stage candidate.
pub const DEFAULT_MIN_FEATURE_MATCHES: usize = 30;

/// Cascade thresholds and budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub near_match_threshold: f64,
    pub min_feature_matches: usize,
    /// Wall-clock budget for one query. `None` means unbounded.
    pub deadline: Option<Duration>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            near_match_threshold: DEFAULT_NEAR_MATCH_THRESHOLD,
            min_feature_matches: DEFAULT_MIN_FEATURE_MATCHES,
            deadline: None,
        }
    }
}

/// Which stage produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Exact,
    NearHash,
    Feature,
    NoMatch,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Exact => "exact",
            MatchStatus::NearHash => "near_hash",
            MatchStatus::Feature => "feature",
            MatchStatus::NoMatch => "no_match",
        }
    }
}

/// Scale of [`MatchCandidate::match_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreKind {
    /// Similarity percentage in `0..=100`.
    Percent,
    /// Count of good descriptor matches.
    FeatureCount,
}

impl ScoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreKind::Percent => "percent",
            ScoreKind::FeatureCount => "featureCount",
        }
    }
}

/// A ranked result. Produced per request and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub match_score: f64,
    pub image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    pub score_kind: ScoreKind,
}

/// A corpus document left out of a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub stage: MatchStatus,
    pub image_path: Option<String>,
    pub reason: SkipReason,
}

/// Result of one cascade run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub status: MatchStatus,
    /// Best first. Empty exactly when `status` is `NoMatch`.
    pub candidates: Vec<MatchCandidate>,
    /// The deadline passed before all stages completed.
    pub timed_out: bool,
    pub skipped: Vec<SkippedEntry>,
}

impl MatchOutcome {
    fn found(status: MatchStatus, candidates: Vec<MatchCandidate>, skipped: Vec<SkippedEntry>) -> Self {
        Self {
            status,
            candidates,
            timed_out: false,
            skipped,
        }
    }

    /// No stage produced candidates.
    pub fn no_match(skipped: Vec<SkippedEntry>) -> Self {
        Self::found(MatchStatus::NoMatch, Vec::new(), skipped)
    }

    /// The deadline passed. Reported as "no match".
    pub fn deadline_exceeded(skipped: Vec<SkippedEntry>) -> Self {
        Self {
            timed_out: true,
            ..Self::no_match(skipped)
        }
    }

    pub fn is_match(&self) -> bool {
        self.status != MatchStatus::NoMatch
    }

    /// Human-readable summary for API responses.
    pub fn message(&self) -> &'static str {
        match self.status {
            MatchStatus::Exact => "Similar images found",
            MatchStatus::NearHash => "Similar images found (hash)",
            MatchStatus::Feature => "Similar images found (ORB)",
            MatchStatus::NoMatch if self.timed_out => "No match found (deadline exceeded)",
            MatchStatus::NoMatch => "No match found (hash or cropped)",
        }
    }
}

/// A decoded query, ready for every stage.
#[derive(Debug, Clone)]
pub struct QueryImage {
    pub fingerprint: Fingerprint,
    pub gray: GrayImage,
}

enum StageResult {
    Found(Vec<MatchCandidate>),
    Empty,
    TimedOut,
}

/// Runs queries against a shared [`CorpusIndex`].
///
/// Holds no per-request state; one instance serves concurrent queries.
pub struct MatchCascade<M: FeatureMatcher = OrbMatcher> {
    index: Arc<CorpusIndex>,
    matcher: M,
    config: MatchConfig,
}

impl MatchCascade<OrbMatcher> {
    /// Cascade with the default ORB matcher.
    pub fn new(index: Arc<CorpusIndex>, config: MatchConfig) -> Self {
        Self::with_matcher(index, OrbMatcher::default(), config)
    }
}

impl<M: FeatureMatcher> MatchCascade<M> {
    pub fn with_matcher(index: Arc<CorpusIndex>, matcher: M, config: MatchConfig) -> Self {
        Self {
            index,
            matcher,
            config,
        }
    }

    pub fn index(&self) -> &Arc<CorpusIndex> {
        &self.index
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Decode and fingerprint query bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidImage` for bytes that do not decode.
    pub fn prepare(&self, image_data: &[u8]) -> Result<QueryImage> {
        let image = decode_image(image_data)?;
        Ok(self.prepare_image(&image))
    }

    pub fn prepare_image(&self, image: &DynamicImage) -> QueryImage {
        QueryImage {
            fingerprint: self.index.hasher().hash_image(image),
            gray: to_luma601(image),
        }
    }

    /// Decode the query and run the cascade.
    ///
    /// # Errors
    ///
    /// Fails before touching the corpus if the bytes do not decode, and
    /// afterwards only if the store itself fails.
    pub async fn find_matches(&self, image_data: &[u8]) -> Result<MatchOutcome> {
        let query = self.prepare(image_data)?;
        self.find_matches_for(&query).await
    }

    /// Run the cascade for an already prepared query.
    ///
    /// The near-hash and feature stages run on the calling task without
    /// yielding. On an async runtime, call [`exact_match`](Self::exact_match)
    /// and [`rank_corpus`](Self::rank_corpus) separately and move the latter
    /// to a blocking thread.
    pub async fn find_matches_for(&self, query: &QueryImage) -> Result<MatchOutcome> {
        let started = Instant::now();

        if let Some(outcome) = self.exact_match(query).await? {
            return Ok(outcome);
        }

        let documents = self.index.scan_all().await?;
        Ok(self.rank_corpus(query, &documents, started))
    }

    /// Stage 1: key lookup of the query fingerprint.
    pub async fn exact_match(&self, query: &QueryImage) -> Result<Option<MatchOutcome>> {
        let Some(entry) = self.index.find_exact(&query.fingerprint).await? else {
            return Ok(None);
        };

        info!(
            image_path = %entry.image_location.display(),
            image_hash = %query.fingerprint,
            "Exact match"
        );
        let candidate = MatchCandidate {
            match_score: 100.0,
            image_path: entry.location_string(),
            image_hash: Some(query.fingerprint.to_hex()),
            score_kind: ScoreKind::Percent,
        };
        Ok(Some(MatchOutcome::found(
            MatchStatus::Exact,
            vec![candidate],
            Vec::new(),
        )))
    }

    /// Stages 2 and 3 over a corpus snapshot.
    ///
    /// CPU-bound: reads and decodes reference images from disk. The deadline
    /// counts from `started`.
    pub fn rank_corpus(
        &self,
        query: &QueryImage,
        documents: &[CorpusDocument],
        started: Instant,
    ) -> MatchOutcome {
        let deadline = self.config.deadline.map(|budget| started + budget);
        let mut skipped = Vec::new();

        match self.near_hash_stage(query, documents, deadline, &mut skipped) {
            StageResult::Found(candidates) => {
                info!(candidates = candidates.len(), "Near-hash match");
                return MatchOutcome::found(MatchStatus::NearHash, candidates, skipped);
            }
            StageResult::TimedOut => return self.timed_out(skipped),
            StageResult::Empty => {}
        }

        match self.feature_stage(query, documents, deadline, &mut skipped) {
            StageResult::Found(candidates) => {
                info!(candidates = candidates.len(), "Feature match");
                MatchOutcome::found(MatchStatus::Feature, candidates, skipped)
            }
            StageResult::TimedOut => self.timed_out(skipped),
            StageResult::Empty => {
                info!(corpus_size = documents.len(), "No match");
                MatchOutcome::no_match(skipped)
            }
        }
    }

    fn timed_out(&self, skipped: Vec<SkippedEntry>) -> MatchOutcome {
        warn!(deadline = ?self.config.deadline, "Match deadline exceeded");
        MatchOutcome::deadline_exceeded(skipped)
    }

    fn near_hash_stage(
        &self,
        query: &QueryImage,
        documents: &[CorpusDocument],
        deadline: Option<Instant>,
        skipped: &mut Vec<SkippedEntry>,
    ) -> StageResult {
        let mut candidates = Vec::new();

        for document in documents {
            if expired(deadline) {
                return StageResult::TimedOut;
            }

            let entry = match CorpusEntry::try_from(document) {
                Ok(entry) => entry,
                Err(reason) => {
                    skip(skipped, MatchStatus::NearHash, document, reason);
                    continue;
                }
            };

            let distance = match query.fingerprint.hamming_distance(&entry.fingerprint) {
                Ok(distance) => distance,
                Err(_) => {
                    let reason = SkipReason::LengthMismatch {
                        stored: entry.fingerprint.bit_len(),
                        expected: query.fingerprint.bit_len(),
                    };
                    skip(skipped, MatchStatus::NearHash, document, reason);
                    continue;
                }
            };

            let score = similarity_score(distance, query.fingerprint.bit_len());
            debug!(image_path = document.display_path(), distance, score, "Hash comparison");
            if score >= self.config.near_match_threshold {
                candidates.push(MatchCandidate {
                    match_score: score,
                    image_path: entry.location_string(),
                    image_hash: document.image_hash.clone(),
                    score_kind: ScoreKind::Percent,
                });
            }
        }

        ranked(candidates)
    }

    fn feature_stage(
        &self,
        query: &QueryImage,
        documents: &[CorpusDocument],
        deadline: Option<Instant>,
        skipped: &mut Vec<SkippedEntry>,
    ) -> StageResult {
        if documents.is_empty() {
            return StageResult::Empty;
        }

        let query_features = self.matcher.extract(&query.gray);
        let mut candidates = Vec::new();

        for document in documents {
            if expired(deadline) {
                return StageResult::TimedOut;
            }

            let Some(location) = document.image_path.as_deref().filter(|p| !p.is_empty()) else {
                skip(skipped, MatchStatus::Feature, document, SkipReason::MissingLocation);
                continue;
            };

            let reference = match load_reference(Path::new(location)) {
                Ok(reference) => reference,
                Err(reason) => {
                    skip(skipped, MatchStatus::Feature, document, reason);
                    continue;
                }
            };

            let reference_features = self.matcher.extract(&reference);
            let good_matches = self.matcher.count_matches(&query_features, &reference_features);
            debug!(image_path = location, good_matches, "Feature comparison");

            if good_matches >= self.config.min_feature_matches {
                candidates.push(MatchCandidate {
                    match_score: good_matches as f64,
                    image_path: location.to_string(),
                    image_hash: document.image_hash.clone(),
                    score_kind: ScoreKind::FeatureCount,
                });
            }
        }

        ranked(candidates)
    }
}

/// Stable descending sort, so equal scores keep scan order.
fn ranked(mut candidates: Vec<MatchCandidate>) -> StageResult {
    if candidates.is_empty() {
        return StageResult::Empty;
    }
    candidates.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    StageResult::Found(candidates)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn skip(
    skipped: &mut Vec<SkippedEntry>,
    stage: MatchStatus,
    document: &CorpusDocument,
    reason: SkipReason,
) {
    warn!(
        stage = stage.as_str(),
        image_path = document.display_path(),
        %reason,
        "Skipping corpus entry"
    );
    skipped.push(SkippedEntry {
        stage,
        image_path: document.image_path.clone(),
        reason,
    });
}

fn load_reference(path: &Path) -> std::result::Result<GrayImage, SkipReason> {
    if !path.is_file() {
        return Err(SkipReason::FileMissing(path.to_path_buf()));
    }
    let data = std::fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    decode_image(&data)
        .map(|image| to_luma601(&image))
        .map_err(|e| SkipReason::Unreadable(e.to_string()))
}
