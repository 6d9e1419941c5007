//! Health check handlers
//!
//! Provides liveness, readiness and banner endpoints for monitoring.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Plain-text banner returned by `GET /`
pub const BANNER: &str = "Image Comparison Server is Running";

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    #[schema(example = "healthy")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    /// Service name
    #[schema(example = "lookalike-server")]
    pub service: &'static str,
    /// Corpus store backend in use
    #[schema(example = "postgres")]
    pub store: &'static str,
}

/// GET / - Liveness banner
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses((status = 200, description = "Server is running", body = String))
)]
pub async fn index() -> &'static str {
    BANNER
}

/// GET /health - Health check endpoint
///
/// Returns JSON with service status, version and the corpus store backend.
/// Does not touch the store.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "lookalike-server",
        store: state.index.store().backend_name(),
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Number of reference images in the corpus
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 42)]
    pub corpus_size: Option<usize>,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Readiness probe
///
/// Ready once the corpus store answers a count query.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to serve uploads", body = ReadyResponse),
        (status = 503, description = "Corpus store unreachable", body = ReadyResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    match state.index.len().await {
        Ok(size) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                corpus_size: Some(size),
                message: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    corpus_size: None,
                    message: Some("Corpus store unavailable"),
                }),
            )
        }
    }
}
