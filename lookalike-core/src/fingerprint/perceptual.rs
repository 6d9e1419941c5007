//! Perceptual hashing for images.
//!
//! This module computes the fingerprint used for exact and near-duplicate
//! lookups against the reference corpus.
//!
//! # Algorithm
//!
//! 1. Decode and convert to single-channel luma with Rec.601 weights, the
//!    same integer rounding PIL's `convert("L")` uses, so fingerprints agree
//!    with corpora indexed by PIL-based tooling.
//! 2. Resample to a fixed 64x64 square, so every fingerprint is derived from
//!    the same normalized input regardless of source resolution.
//! 3. Reduce to 32x32 and apply a 2-D DCT-II.
//! 4. Keep the top-left 8x8 block of low-frequency coefficients.
//! 5. Emit one bit per coefficient: set when it is above the block median.
//!
//! Bits are packed row-major, most significant bit first, giving exactly
//! 8 bytes (16 hex characters).
//!
//! # Usage
//!
//! ```no_run
//! use lookalike_core::fingerprint::PerceptualHasher;
//!
//! let hasher = PerceptualHasher::default();
//! let a = hasher.hash_bytes(&std::fs::read("a.jpg").unwrap()).unwrap();
//! let b = hasher.hash_bytes(&std::fs::read("b.jpg").unwrap()).unwrap();
//!
//! let score = a.similarity(&b).unwrap();
//! println!("{} vs {}: {:.2}%", a, b, score);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::score::{hamming_distance, similarity_score};
use crate::error::{LookalikeError, Result};

/// Side of the square every image is resampled to before hashing.
pub const NORMALIZED_SIZE: u32 = 64;

/// Side of the retained low-frequency coefficient block.
pub const HASH_SIDE: usize = 8;

/// The DCT runs on an image `HASH_SIDE * HIGHFREQ_FACTOR` pixels wide.
const HIGHFREQ_FACTOR: usize = 4;

/// Fingerprint size in bits (64).
pub const FINGERPRINT_BITS: u32 = (HASH_SIDE * HASH_SIDE) as u32;

/// Fingerprint size in bytes (8).
pub const FINGERPRINT_BYTES: usize = HASH_SIDE * HASH_SIDE / 8;

/// A perceptual hash.
///
/// Serialized as a lower-case hex string, which is also its canonical
/// storage and comparison form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Create a fingerprint from raw bytes.
    ///
    /// Any non-empty length is accepted so that hashes written by other
    /// configurations can still be parsed; comparing them against a standard
    /// fingerprint fails with a length mismatch.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(LookalikeError::InvalidFingerprint(
                "Fingerprint cannot be empty".into(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Pack a bit vector, most significant bit first.
    fn from_bits(bits: &[bool]) -> Self {
        let bytes = bits
            .chunks(8)
            .map(|chunk| {
                chunk.iter().enumerate().fold(0u8, |acc, (i, &bit)| {
                    if bit {
                        acc | (1 << (7 - i))
                    } else {
                        acc
                    }
                })
            })
            .collect();
        Self { bytes }
    }

    /// Parse a hex-encoded fingerprint.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(|e| {
            LookalikeError::InvalidFingerprint(format!("Invalid hex string '{}': {}", hex_str, e))
        })?;
        Self::from_bytes(bytes)
    }

    /// Get the fingerprint as a hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bits.
    pub fn bit_len(&self) -> u32 {
        (self.bytes.len() * 8) as u32
    }

    /// Whether this fingerprint has the size produced by [`PerceptualHasher`].
    pub fn is_standard_size(&self) -> bool {
        self.bytes.len() == FINGERPRINT_BYTES
    }

    /// Hamming distance to another fingerprint of the same length.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        hamming_distance(self, other)
    }

    /// Similarity percentage in `0.0..=100.0`, rounded to two decimals.
    pub fn similarity(&self, other: &Self) -> Result<f64> {
        let distance = self.hamming_distance(other)?;
        Ok(similarity_score(distance, self.bit_len()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = LookalikeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = LookalikeError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

/// Perceptual hasher.
///
/// Stateless apart from its normalization parameters; fingerprints are only
/// comparable when produced with identical parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerceptualHasher {
    normalized_size: u32,
    hash_side: usize,
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self {
            normalized_size: NORMALIZED_SIZE,
            hash_side: HASH_SIDE,
        }
    }
}

impl PerceptualHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute a fingerprint from raw image bytes.
    ///
    /// Supports JPEG, PNG, GIF, and WebP formats.
    pub fn hash_bytes(&self, image_data: &[u8]) -> Result<Fingerprint> {
        let image = decode_image(image_data)?;
        Ok(self.hash_image(&image))
    }

    /// Compute a fingerprint for an image file on disk.
    pub fn hash_path(&self, path: &Path) -> Result<Fingerprint> {
        let data = std::fs::read(path)?;
        self.hash_bytes(&data)
    }

    /// Compute a fingerprint from an already decoded image.
    pub fn hash_image(&self, image: &DynamicImage) -> Fingerprint {
        let normalized = normalize(image, self.normalized_size);
        self.hash_normalized(&normalized)
    }

    fn hash_normalized(&self, normalized: &GrayImage) -> Fingerprint {
        let side = self.hash_side;
        let dct_size = side * HIGHFREQ_FACTOR;

        let reduced = imageops::resize(
            normalized,
            dct_size as u32,
            dct_size as u32,
            FilterType::Lanczos3,
        );
        let pixels: Vec<f64> = reduced.pixels().map(|p| f64::from(p.0[0])).collect();
        let coefficients = dct_2d(&pixels, dct_size);

        let mut low_frequency = Vec::with_capacity(side * side);
        for v in 0..side {
            for u in 0..side {
                low_frequency.push(coefficients[v * dct_size + u]);
            }
        }

        let median = median(&low_frequency);
        let bits: Vec<bool> = low_frequency.iter().map(|&c| c > median).collect();
        Fingerprint::from_bits(&bits)
    }

    /// Side of the normalized square image.
    pub fn normalized_size(&self) -> u32 {
        self.normalized_size
    }

    /// Number of bits in the fingerprints this hasher produces.
    pub fn bit_len(&self) -> u32 {
        (self.hash_side * self.hash_side) as u32
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}

/// Decode raw bytes into an image.
pub fn decode_image(image_data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(image_data)
        .map_err(|e| LookalikeError::InvalidImage(format!("Failed to decode image: {}", e)))
}

/// Rec.601 luma, `L = (19595 R + 38470 G + 7471 B + 2^15) >> 16`.
///
/// `DynamicImage::to_luma8` weights channels per Rec.709 instead. Alpha is
/// ignored.
pub fn to_luma601(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (19595 * r as u32 + 38470 * g as u32 + 7471 * b as u32 + 0x8000) >> 16;
        image::Luma([luma as u8])
    })
}

/// Convert to luma and resample to a `size` x `size` square.
pub fn normalize(image: &DynamicImage, size: u32) -> GrayImage {
    imageops::resize(&to_luma601(image), size, size, FilterType::CatmullRom)
}

/// Compute a fingerprint for image data using default settings.
///
/// Returns `None` if the data is not a decodable image.
pub fn compute_phash(image_data: &[u8]) -> Option<Fingerprint> {
    PerceptualHasher::default().hash_bytes(image_data).ok()
}

/// Separable, unnormalized 2-D DCT-II over a `size` x `size` row-major block.
fn dct_2d(pixels: &[f64], size: usize) -> Vec<f64> {
    let cos_table: Vec<f64> = (0..size)
        .flat_map(|u| {
            (0..size).map(move |x| {
                ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / (2.0 * size as f64)).cos()
            })
        })
        .collect();

    // Columns first, then rows.
    let mut temp = vec![0.0; size * size];
    for x in 0..size {
        for v in 0..size {
            let sum: f64 = (0..size)
                .map(|y| pixels[y * size + x] * cos_table[v * size + y])
                .sum();
            temp[v * size + x] = 2.0 * sum;
        }
    }

    let mut result = vec![0.0; size * size];
    for v in 0..size {
        for u in 0..size {
            let sum: f64 = (0..size)
                .map(|x| temp[v * size + x] * cos_table[u * size + x])
                .sum();
            result[v * size + u] = 2.0 * sum;
        }
    }

    result
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
