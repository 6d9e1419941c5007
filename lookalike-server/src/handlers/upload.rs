//! Image lookup handler
//!
//! Handles POST /upload requests: the uploaded image is run through the
//! match cascade against the reference corpus.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Multipart, State},
    Json,
};
use lookalike_core::{FeatureMatcher, MatchCandidate, MatchCascade, MatchOutcome};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::multipart::ImageUpload;
use crate::state::AppState;
use crate::validation::sanitize_file_name;

/// Multipart form accepted by `POST /upload`
#[derive(ToSchema)]
pub struct UploadForm {
    /// Query image (png, jpeg, gif, webp)
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// Result of an image lookup
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    /// Human-readable summary of the outcome
    #[schema(example = "Similar images found")]
    pub message: String,
    /// Stage that produced the matches: exact, near_hash, feature or no_match
    #[schema(example = "near_hash")]
    pub status: String,
    /// Ranked matches, best first. Empty when nothing matched.
    pub matches: Vec<MatchResponse>,
}

/// A single reference image matching the upload
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    /// Similarity percentage, or the good keypoint count for feature matches
    #[schema(example = 96.88)]
    pub match_score: f64,
    /// Location of the reference image
    #[schema(example = "our_images/cat.jpg")]
    pub image_path: String,
    /// Fingerprint of the reference image (hash stages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "c3a1e0f09b8d7c6e")]
    pub image_hash: Option<String>,
    /// How to read `matchScore`: percent or featureCount
    #[schema(example = "percent")]
    pub score_kind: String,
}

impl From<MatchCandidate> for MatchResponse {
    fn from(candidate: MatchCandidate) -> Self {
        Self {
            match_score: candidate.match_score,
            image_path: candidate.image_path,
            image_hash: candidate.image_hash,
            score_kind: candidate.score_kind.as_str().to_string(),
        }
    }
}

impl From<MatchOutcome> for UploadResponse {
    fn from(outcome: MatchOutcome) -> Self {
        Self {
            message: outcome.message().to_string(),
            status: outcome.status.as_str().to_string(),
            matches: outcome.candidates.into_iter().map(Into::into).collect(),
        }
    }
}

/// Look up an uploaded image in the reference corpus
///
/// Accepts multipart/form-data with:
/// - **image** (required): the query image (max 25MB by default)
///
/// Stages run in order and the first one with results wins:
/// 1. exact fingerprint lookup
/// 2. near-hash scan (similarity ≥ 75 by default)
/// 3. keypoint matching for cropped queries (≥ 30 good matches by default)
///
/// A lookup that exceeds the matching deadline is reported as no match.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Matching",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Lookup completed (matches may be empty)", body = UploadResponse),
        (status = 400, description = "No image, empty filename, or undecodable image"),
        (status = 503, description = "Corpus store unavailable")
    )
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_file_size = state.config.max_file_size_mb * 1024 * 1024;
    let upload = ImageUpload::from_multipart(&mut multipart, max_file_size).await?;

    if let Some(dir) = state.config.upload_dir.as_deref() {
        save_upload(dir, &upload).await?;
    }

    let ImageUpload {
        data,
        content_type,
        file_name,
    } = upload;
    let size = data.len();

    let outcome = lookup_within(
        Arc::clone(&state.cascade),
        data,
        state.config.match_deadline(),
    )
    .await?;

    tracing::info!(
        file_name = %file_name,
        content_type = content_type.as_deref().unwrap_or("-"),
        size,
        status = outcome.status.as_str(),
        matches = outcome.candidates.len(),
        skipped = outcome.skipped.len(),
        timed_out = outcome.timed_out,
        "Lookup completed"
    );

    Ok(Json(outcome.into()))
}

/// Run the cascade with `budget` bounding the whole call.
///
/// Expiry is reported as a deadline no-match. Work already handed to the
/// blocking pool keeps running until the cascade's own deadline stops it.
pub async fn lookup_within<M>(
    cascade: Arc<MatchCascade<M>>,
    data: Vec<u8>,
    budget: Option<Duration>,
) -> Result<MatchOutcome, ApiError>
where
    M: FeatureMatcher + 'static,
{
    let Some(budget) = budget else {
        return lookup(cascade, data).await;
    };

    match tokio::time::timeout(budget, lookup(cascade, data)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                budget_ms = budget.as_millis() as u64,
                "Lookup exceeded matching deadline"
            );
            Ok(MatchOutcome::deadline_exceeded(Vec::new()))
        }
    }
}

/// Decoding, hashing and both scan stages run on the blocking pool; only the
/// store reads run on the async worker.
async fn lookup<M>(cascade: Arc<MatchCascade<M>>, data: Vec<u8>) -> Result<MatchOutcome, ApiError>
where
    M: FeatureMatcher + 'static,
{
    let started = Instant::now();

    let preparing = Arc::clone(&cascade);
    let query = tokio::task::spawn_blocking(move || preparing.prepare(&data))
        .await
        .map_err(join_failed)??;

    if let Some(outcome) = cascade.exact_match(&query).await? {
        return Ok(outcome);
    }

    let documents = cascade.index().scan_all().await?;
    tokio::task::spawn_blocking(move || cascade.rank_corpus(&query, &documents, started))
        .await
        .map_err(join_failed)
}

fn join_failed(e: tokio::task::JoinError) -> ApiError {
    ApiError::internal(format!("Lookup task failed: {}", e))
}

/// Keep a copy of the upload under its sanitized filename.
async fn save_upload(dir: &Path, upload: &ImageUpload) -> Result<(), ApiError> {
    let file_name = sanitize_file_name(&upload.file_name)
        .ok_or_else(|| ApiError::bad_request("Empty filename"))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload dir: {}", e)))?;

    let path = dir.join(&file_name);
    tokio::fs::write(&path, &upload.data)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to save upload: {}", e)))?;

    tracing::debug!(path = %path.display(), "Upload saved");
    Ok(())
}
