//! Lookalike Server Library - HTTP API for reverse image lookup
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod corpus_store;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::Config;
pub use corpus_store::{open_store, PostgresCorpusStore, StoreError};
pub use error::ApiError;
pub use handlers::{HealthResponse, MatchResponse, ReadyResponse, UploadResponse};
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_config, create_router_with_state};
pub use state::AppState;
