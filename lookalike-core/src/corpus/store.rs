//! Corpus store capability.

use async_trait::async_trait;

use super::CorpusDocument;
use crate::error::Result;

/// A document collection holding corpus entries.
///
/// The store is opened by its owner, passed explicitly to the index, and
/// closed at shutdown. No updates or deletes are issued through it.
///
/// Implementations must be thread-safe (`Send + Sync`) and must make an
/// inserted document visible only once it is complete.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Look up the document stored under an exact fingerprint hex string.
    async fn find_one(&self, image_hash: &str) -> Result<Option<CorpusDocument>>;

    /// Every document, in insertion order.
    async fn find_all(&self) -> Result<Vec<CorpusDocument>>;

    /// Insert a document.
    ///
    /// Returns `false` without inserting when a document with the same
    /// `image_hash` already exists.
    async fn insert_one(&self, document: CorpusDocument) -> Result<bool>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;

    /// Release backend resources. Further calls may fail.
    async fn close(&self) {}

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Whether documents survive a restart.
    fn is_persistent(&self) -> bool {
        false
    }
}
