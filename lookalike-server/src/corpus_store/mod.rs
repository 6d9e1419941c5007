//! Corpus store backends
//!
//! - **PostgreSQL** when `DATABASE_URL` is set: entries survive restarts and
//!   a unique index keeps concurrent syncs from duplicating fingerprints.
//! - **In-memory** otherwise (development fallback): the corpus is rebuilt
//!   from the reference folder on every start.

mod postgres;

pub use postgres::PostgresCorpusStore;

use std::sync::Arc;

use lookalike_core::{CorpusStore, LookalikeError, MemoryCorpusStore};

use crate::config::Config;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

impl From<StoreError> for LookalikeError {
    fn from(e: StoreError) -> Self {
        LookalikeError::Store(e.to_string())
    }
}

/// Open the corpus store selected by the configuration
///
/// Uses PostgreSQL if `database_url` is set, otherwise falls back to in-memory.
pub async fn open_store(config: &Config) -> Result<Arc<dyn CorpusStore>, StoreError> {
    match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Using PostgreSQL corpus store");
            let store = PostgresCorpusStore::new(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory corpus store");
            Ok(Arc::new(MemoryCorpusStore::new()))
        }
    }
}
