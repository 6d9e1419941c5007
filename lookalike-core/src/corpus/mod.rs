//! Reference corpus.
//!
//! The corpus maps fingerprints to reference image locations. It is backed
//! by a [`CorpusStore`], a minimal document collection, and populated from a
//! folder of images by [`CorpusIndex::sync`].
//!
//! Stored documents are deliberately loose (both fields optional) so that a
//! damaged row can still be read back and reported. Consumers convert a
//! document into a [`CorpusEntry`] and treat conversion failures as a
//! [`SkipReason`] rather than an error.

pub mod index;
pub mod memory;
pub mod store;

pub use index::{is_reference_image, CorpusIndex, SkippedFile, SyncReport, SUPPORTED_EXTENSIONS};
pub use memory::MemoryCorpusStore;
pub use store::CorpusStore;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// A corpus document as persisted: `{imageHash, imagePath}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl CorpusDocument {
    pub fn new(image_hash: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self {
            image_hash: Some(image_hash.into()),
            image_path: Some(image_path.into()),
        }
    }

    /// Location for log output.
    pub fn display_path(&self) -> &str {
        self.image_path.as_deref().unwrap_or("<unknown>")
    }
}

/// A validated corpus entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub fingerprint: Fingerprint,
    pub image_location: PathBuf,
}

impl CorpusEntry {
    pub fn location_string(&self) -> String {
        self.image_location.to_string_lossy().into_owned()
    }
}

impl TryFrom<&CorpusDocument> for CorpusEntry {
    type Error = SkipReason;

    fn try_from(document: &CorpusDocument) -> std::result::Result<Self, SkipReason> {
        let hex = document
            .image_hash
            .as_deref()
            .ok_or(SkipReason::MissingFingerprint)?;
        let fingerprint = Fingerprint::from_hex(hex)
            .map_err(|_| SkipReason::InvalidFingerprint(hex.to_string()))?;
        let location = document
            .image_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(SkipReason::MissingLocation)?;

        Ok(Self {
            fingerprint,
            image_location: PathBuf::from(location),
        })
    }
}

/// Why a corpus document was left out of a scan.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("entry has no fingerprint")]
    MissingFingerprint,

    #[error("stored fingerprint '{0}' does not parse")]
    InvalidFingerprint(String),

    #[error("fingerprint length mismatch: {stored} bits stored, {expected} bits expected")]
    LengthMismatch { stored: u32, expected: u32 },

    #[error("entry has no image location")]
    MissingLocation,

    #[error("image file {0} is missing")]
    FileMissing(PathBuf),

    #[error("image could not be read: {0}")]
    Unreadable(String),
}
