//! Image fingerprints.
//!
//! A fingerprint is a 64-bit perceptual hash summarising the coarse visual
//! structure of an image. Two fingerprints are compared by Hamming distance,
//! which is turned into a similarity percentage for ranking.
//!
//! # Components
//!
//! - **Perceptual hashing**: grayscale normalization followed by a DCT-based
//!   hash that survives re-encoding and mild resizing but not cropping.
//! - **Distance and score**: Hamming distance and the `0..=100` score model.

pub mod perceptual;
pub mod score;

pub use perceptual::*;
pub use score::*;
