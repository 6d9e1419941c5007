//! Corpus index: folder sync and lookups over a [`CorpusStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::store::CorpusStore;
use super::{CorpusDocument, CorpusEntry};
use crate::error::Result;
use crate::fingerprint::{Fingerprint, PerceptualHasher};

/// File extensions picked up by [`CorpusIndex::sync`], compared
/// case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Whether a path has a reference image extension.
pub fn is_reference_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// A reference file that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files with a recognized extension.
    pub scanned: usize,
    pub inserted: usize,
    /// Files whose fingerprint was already indexed.
    pub duplicates: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Fingerprint-to-location index shared by every request.
pub struct CorpusIndex {
    store: Arc<dyn CorpusStore>,
    hasher: PerceptualHasher,
}

impl CorpusIndex {
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self::with_hasher(store, PerceptualHasher::default())
    }

    pub fn with_hasher(store: Arc<dyn CorpusStore>, hasher: PerceptualHasher) -> Self {
        Self { store, hasher }
    }

    pub fn store(&self) -> &Arc<dyn CorpusStore> {
        &self.store
    }

    pub fn hasher(&self) -> &PerceptualHasher {
        &self.hasher
    }

    /// Index every reference image in `folder` that is not already present.
    ///
    /// Files are visited in name order. Deduplication is by fingerprint, so
    /// differently named copies of one image produce a single entry and a
    /// second run over an unchanged folder inserts nothing. Files that fail
    /// to hash are reported and skipped.
    ///
    /// # Errors
    ///
    /// Fails if the folder cannot be listed or the store rejects an
    /// operation.
    pub async fn sync(&self, folder: &Path) -> Result<SyncReport> {
        let mut files = Vec::new();
        for dir_entry in std::fs::read_dir(folder)? {
            let path = dir_entry?.path();
            if path.is_file() && is_reference_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        let mut report = SyncReport::default();
        for path in files {
            report.scanned += 1;

            let fingerprint = match self.hasher.hash_path(&path) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    warn!(image_path = %path.display(), error = %e, "Skipping unhashable reference image");
                    report.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let image_hash = fingerprint.to_hex();
            if self.store.find_one(&image_hash).await?.is_some() {
                debug!(image_path = %path.display(), image_hash = %image_hash, "Already indexed");
                report.duplicates += 1;
                continue;
            }

            let document = CorpusDocument::new(image_hash.clone(), path.to_string_lossy());
            if self.store.insert_one(document).await? {
                info!(image_path = %path.display(), image_hash = %image_hash, "Indexed reference image");
                report.inserted += 1;
            } else {
                // Lost a race with a concurrent sync.
                debug!(image_path = %path.display(), image_hash = %image_hash, "Already indexed");
                report.duplicates += 1;
            }
        }

        info!(
            folder = %folder.display(),
            scanned = report.scanned,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped.len(),
            "Corpus sync complete"
        );
        Ok(report)
    }

    /// Exact-key lookup by fingerprint.
    ///
    /// A stored document that cannot be turned into an entry is logged and
    /// treated as absent.
    pub async fn find_exact(&self, fingerprint: &Fingerprint) -> Result<Option<CorpusEntry>> {
        let Some(document) = self.store.find_one(&fingerprint.to_hex()).await? else {
            return Ok(None);
        };

        match CorpusEntry::try_from(&document) {
            Ok(entry) => Ok(Some(entry)),
            Err(reason) => {
                warn!(image_path = document.display_path(), %reason, "Skipping corpus entry");
                Ok(None)
            }
        }
    }

    /// Every stored document, in insertion order, for linear comparison.
    pub async fn scan_all(&self) -> Result<Vec<CorpusDocument>> {
        self.store.find_all().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.count().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
