//! In-memory corpus store.
//!
//! Used by the CLI, by tests, and by the server when no database is
//! configured. Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::store::CorpusStore;
use super::CorpusDocument;
use crate::error::{LookalikeError, Result};

#[derive(Default)]
struct Documents {
    /// Insertion order.
    ordered: Vec<CorpusDocument>,
    /// Hash -> position in `ordered`.
    by_hash: HashMap<String, usize>,
}

/// Insertion-ordered document store guarded by a read-write lock.
///
/// A document is pushed and indexed under a single write guard, so readers
/// see either the whole document or nothing.
#[derive(Default)]
pub struct MemoryCorpusStore {
    documents: RwLock<Documents>,
}

impl MemoryCorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with documents as-is, including malformed ones.
    ///
    /// Later documents with an already-seen hash are dropped.
    pub fn with_documents(documents: impl IntoIterator<Item = CorpusDocument>) -> Self {
        let mut inner = Documents::default();
        for document in documents {
            insert(&mut inner, document);
        }
        Self {
            documents: RwLock::new(inner),
        }
    }
}

fn insert(inner: &mut Documents, document: CorpusDocument) -> bool {
    if let Some(hash) = &document.image_hash {
        if inner.by_hash.contains_key(hash) {
            return false;
        }
        inner.by_hash.insert(hash.clone(), inner.ordered.len());
    }
    inner.ordered.push(document);
    true
}

fn poisoned() -> LookalikeError {
    LookalikeError::Store("in-memory corpus lock poisoned".into())
}

#[async_trait]
impl CorpusStore for MemoryCorpusStore {
    async fn find_one(&self, image_hash: &str) -> Result<Option<CorpusDocument>> {
        let inner = self.documents.read().map_err(|_| poisoned())?;
        Ok(inner
            .by_hash
            .get(image_hash)
            .map(|&idx| inner.ordered[idx].clone()))
    }

    async fn find_all(&self) -> Result<Vec<CorpusDocument>> {
        let inner = self.documents.read().map_err(|_| poisoned())?;
        Ok(inner.ordered.clone())
    }

    async fn insert_one(&self, document: CorpusDocument) -> Result<bool> {
        let mut inner = self.documents.write().map_err(|_| poisoned())?;
        Ok(insert(&mut inner, document))
    }

    async fn count(&self) -> Result<usize> {
        let inner = self.documents.read().map_err(|_| poisoned())?;
        Ok(inner.ordered.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryCorpusStore::new();
        let doc = CorpusDocument::new("0123456789abcdef", "our_images/a.png");

        assert!(store.insert_one(doc.clone()).await.unwrap());
        assert_eq!(store.find_one("0123456789abcdef").await.unwrap(), Some(doc));
        assert_eq!(store.find_one("ffffffffffffffff").await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_hash_refused() {
        let store = MemoryCorpusStore::new();
        assert!(store
            .insert_one(CorpusDocument::new("aaaaaaaaaaaaaaaa", "a.png"))
            .await
            .unwrap());
        assert!(!store
            .insert_one(CorpusDocument::new("aaaaaaaaaaaaaaaa", "b.png"))
            .await
            .unwrap());

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].display_path(), "a.png");
    }

    #[tokio::test]
    async fn test_find_all_preserves_insertion_order() {
        let store = MemoryCorpusStore::new();
        for (hash, path) in [
            ("3333333333333333", "c.png"),
            ("1111111111111111", "a.png"),
            ("2222222222222222", "b.png"),
        ] {
            store
                .insert_one(CorpusDocument::new(hash, path))
                .await
                .unwrap();
        }

        let paths: Vec<_> = store
            .find_all()
            .await
            .unwrap()
            .iter()
            .map(|d| d.display_path().to_string())
            .collect();
        assert_eq!(paths, vec!["c.png", "a.png", "b.png"]);
    }

    #[tokio::test]
    async fn test_documents_without_hash_are_kept() {
        let store = MemoryCorpusStore::with_documents([
            CorpusDocument {
                image_hash: None,
                image_path: Some("orphan.png".into()),
            },
            CorpusDocument {
                image_hash: None,
                image_path: Some("orphan2.png".into()),
            },
        ]);
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(!store.is_persistent());
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_dedup() {
        let store = Arc::new(MemoryCorpusStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert_one(CorpusDocument::new("abababababababab", format!("{}.png", i)))
                    .await
                    .unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
