//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod upload;

pub use crate::state::AppState;
pub use health::{health, index, ready, HealthResponse, ReadyResponse};
pub use upload::{upload_handler, MatchResponse, UploadForm, UploadResponse};
