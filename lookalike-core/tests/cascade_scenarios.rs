//! End-to-end cascade scenarios over real files on disk.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use lookalike_core::{
    CorpusDocument, CorpusIndex, CorpusStore, LookalikeError, MatchCascade, MatchConfig,
    MatchStatus, MemoryCorpusStore, ScoreKind, SkipReason, DEFAULT_MIN_FEATURE_MATCHES,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn gradient_image(width: u32, height: u32, phase: u32) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let band = if ((x * 4 / width) + (y * 4 / height) + phase) % 2 == 0 {
            50
        } else {
            0
        };
        Rgb([r.saturating_add(band), g, 100])
    });
    DynamicImage::ImageRgb8(img)
}

fn rectangles_image(seed: u64, width: u32, height: u32) -> DynamicImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::from_pixel(width, height, Luma([128]));
    for _ in 0..150 {
        let w = rng.random_range(8..60u32);
        let h = rng.random_range(8..60u32);
        let x0 = rng.random_range(0..width - w);
        let y0 = rng.random_range(0..height - h);
        let value = rng.random_range(0..=255u8);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }
    DynamicImage::ImageLuma8(img)
}

fn save(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).expect("write image");
    path
}

fn jpeg_bytes(image: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .expect("JPEG encoding failed");
    buffer.into_inner()
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("PNG encoding failed");
    buffer.into_inner()
}

async fn synced_index(dir: &Path) -> Arc<CorpusIndex> {
    let index = Arc::new(CorpusIndex::new(Arc::new(MemoryCorpusStore::new())));
    index.sync(dir).await.expect("sync");
    index
}

#[tokio::test]
async fn test_identical_query_is_exact_match() {
    let dir = TempDir::new().unwrap();
    let reference = save(dir.path(), "ref.png", &gradient_image(200, 150, 0));
    save(dir.path(), "other.png", &gradient_image(200, 150, 1));

    let cascade = MatchCascade::new(synced_index(dir.path()).await, MatchConfig::default());
    let outcome = cascade
        .find_matches(&std::fs::read(&reference).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.status, MatchStatus::Exact);
    assert_eq!(outcome.message(), "Similar images found");
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].match_score, 100.0);
    assert_eq!(
        outcome.candidates[0].image_path,
        reference.to_string_lossy().into_owned()
    );
}

#[tokio::test]
async fn test_reencoded_query_is_found_by_hash() {
    let dir = TempDir::new().unwrap();
    let original = gradient_image(320, 240, 0);
    let reference = save(dir.path(), "ref.png", &original);

    let cascade = MatchCascade::new(synced_index(dir.path()).await, MatchConfig::default());
    let query = original.resize_exact(280, 210, image::imageops::FilterType::Triangle);
    let outcome = cascade.find_matches(&jpeg_bytes(&query, 85)).await.unwrap();

    // Re-encoding may or may not flip a bit; either hash stage is correct.
    assert!(
        matches!(outcome.status, MatchStatus::Exact | MatchStatus::NearHash),
        "unexpected status {:?}",
        outcome.status
    );
    let top = &outcome.candidates[0];
    assert_eq!(top.image_path, reference.to_string_lossy().into_owned());
    assert!(top.match_score >= 75.0);
    assert_eq!(top.score_kind, ScoreKind::Percent);
}

#[tokio::test]
async fn test_cropped_query_is_found_by_features() {
    let dir = TempDir::new().unwrap();
    let original = rectangles_image(21, 400, 400);
    let reference = save(dir.path(), "scene.png", &original);
    save(
        dir.path(),
        "blank.png",
        &DynamicImage::ImageLuma8(GrayImage::from_pixel(400, 400, Luma([30]))),
    );

    let cascade = MatchCascade::new(synced_index(dir.path()).await, MatchConfig::default());
    let crop = original.crop_imm(50, 50, 300, 300);
    let outcome = cascade.find_matches(&png_bytes(&crop)).await.unwrap();

    assert_eq!(outcome.status, MatchStatus::Feature);
    assert_eq!(outcome.message(), "Similar images found (ORB)");
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(
        outcome.candidates[0].image_path,
        reference.to_string_lossy().into_owned()
    );
    assert_eq!(outcome.candidates[0].score_kind, ScoreKind::FeatureCount);
    assert!(
        outcome.candidates[0].match_score >= DEFAULT_MIN_FEATURE_MATCHES as f64,
        "only {} good matches",
        outcome.candidates[0].match_score
    );
}

#[tokio::test]
async fn test_unrelated_query_is_no_match() {
    let dir = TempDir::new().unwrap();
    save(dir.path(), "ref.png", &gradient_image(200, 200, 0));

    let cascade = MatchCascade::new(synced_index(dir.path()).await, MatchConfig::default());
    let mut inverted = gradient_image(200, 200, 0);
    inverted.invert();
    let outcome = cascade.find_matches(&png_bytes(&inverted)).await.unwrap();

    assert_eq!(outcome.status, MatchStatus::NoMatch);
    assert_eq!(outcome.message(), "No match found (hash or cropped)");
    assert!(outcome.candidates.is_empty());
}

#[tokio::test]
async fn test_sync_dedups_identical_content() {
    let dir = TempDir::new().unwrap();
    let image = gradient_image(160, 160, 0);
    save(dir.path(), "first.png", &image);
    save(dir.path(), "copy_of_first.png", &image);
    save(dir.path(), "different.png", &gradient_image(160, 160, 1));

    let index = Arc::new(CorpusIndex::new(Arc::new(MemoryCorpusStore::new())));
    let report = index.sync(dir.path()).await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.duplicates, 1);

    let rerun = index.sync(dir.path()).await.unwrap();
    assert_eq!(rerun.inserted, 0);
    assert_eq!(index.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_corrupted_entries_do_not_abort_scan() {
    let dir = TempDir::new().unwrap();
    let original = gradient_image(240, 180, 0);
    let reference = save(dir.path(), "ref.png", &original);

    let store = Arc::new(MemoryCorpusStore::with_documents([
        CorpusDocument::new("this is not hex", "broken.png"),
        CorpusDocument {
            image_hash: None,
            image_path: None,
        },
    ]));
    let index = Arc::new(CorpusIndex::new(store));
    index.sync(dir.path()).await.unwrap();

    let cascade = MatchCascade::new(index, MatchConfig::default());
    let query = original.resize_exact(200, 150, image::imageops::FilterType::Triangle);
    let outcome = cascade.find_matches(&jpeg_bytes(&query, 90)).await.unwrap();

    assert!(outcome.is_match());
    assert_eq!(
        outcome.candidates[0].image_path,
        reference.to_string_lossy().into_owned()
    );
    if outcome.status == MatchStatus::NearHash {
        assert!(outcome
            .skipped
            .iter()
            .any(|s| matches!(s.reason, SkipReason::InvalidFingerprint(_))));
    }
}

/// Store that counts every access.
#[derive(Default)]
struct CountingStore {
    inner: MemoryCorpusStore,
    calls: AtomicUsize,
}

#[async_trait]
impl CorpusStore for CountingStore {
    async fn find_one(&self, image_hash: &str) -> lookalike_core::Result<Option<CorpusDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(image_hash).await
    }

    async fn find_all(&self) -> lookalike_core::Result<Vec<CorpusDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_all().await
    }

    async fn insert_one(&self, document: CorpusDocument) -> lookalike_core::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_one(document).await
    }

    async fn count(&self) -> lookalike_core::Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count().await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

#[tokio::test]
async fn test_corrupt_upload_fails_before_corpus_access() {
    let store = Arc::new(CountingStore::default());
    let index = Arc::new(CorpusIndex::new(store.clone()));
    let cascade = MatchCascade::new(index, MatchConfig::default());

    let err = cascade
        .find_matches(b"\x89PNG\r\n\x1a\n truncated")
        .await
        .unwrap_err();

    assert!(matches!(err, LookalikeError::InvalidImage(_)));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_corpus_is_no_match() {
    let store = Arc::new(CountingStore::default());
    let index = Arc::new(CorpusIndex::new(store.clone()));
    let cascade = MatchCascade::new(index, MatchConfig::default());

    let outcome = cascade
        .find_matches(&png_bytes(&gradient_image(100, 100, 0)))
        .await
        .unwrap();

    assert_eq!(outcome.status, MatchStatus::NoMatch);
    assert!(outcome.skipped.is_empty());
    // One exact lookup and one scan.
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}
