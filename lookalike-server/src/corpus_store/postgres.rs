//! PostgreSQL implementation of the corpus store.

use async_trait::async_trait;
use lookalike_core::{CorpusDocument, CorpusStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use super::StoreError;

/// PostgreSQL-backed corpus store.
///
/// Documents live in `corpus_entries`; a unique index on `image_hash`
/// keeps concurrent syncs from inserting the same fingerprint twice.
#[derive(Clone)]
pub struct PostgresCorpusStore {
    pool: PgPool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct CorpusRow {
    image_hash: Option<String>,
    image_path: Option<String>,
}

impl From<CorpusRow> for CorpusDocument {
    fn from(row: CorpusRow) -> Self {
        Self {
            image_hash: row.image_hash,
            image_path: row.image_path,
        }
    }
}

impl PostgresCorpusStore {
    /// Connect to the database and apply migrations.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Corpus store connected and migrations applied");

        Ok(Self { pool })
    }
}

#[async_trait]
impl CorpusStore for PostgresCorpusStore {
    async fn find_one(&self, image_hash: &str) -> lookalike_core::Result<Option<CorpusDocument>> {
        let row: Option<CorpusRow> = sqlx::query_as(
            r#"
            SELECT image_hash, image_path
            FROM corpus_entries
            WHERE image_hash = $1
            "#,
        )
        .bind(image_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(row.map(Into::into))
    }

    async fn find_all(&self) -> lookalike_core::Result<Vec<CorpusDocument>> {
        let rows: Vec<CorpusRow> = sqlx::query_as(
            r#"
            SELECT image_hash, image_path
            FROM corpus_entries
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_one(&self, document: CorpusDocument) -> lookalike_core::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO corpus_entries (image_hash, image_path)
            VALUES ($1, $2)
            ON CONFLICT (image_hash) DO NOTHING
            "#,
        )
        .bind(&document.image_hash)
        .bind(&document.image_path)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            tracing::debug!(
                image_hash = document.image_hash.as_deref().unwrap_or_default(),
                "Stored corpus entry"
            );
        }
        Ok(inserted)
    }

    async fn count(&self) -> lookalike_core::Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corpus_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Corpus store connection pool closed");
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
