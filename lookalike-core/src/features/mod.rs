//! Local keypoint features.
//!
//! The last stage of the lookup cascade compares images by counting
//! agreeing local descriptors rather than global structure, which lets a
//! cropped query still find its source image.
//!
//! [`FeatureMatcher`] is the seam between the cascade and a concrete
//! detector. The production implementation is [`OrbMatcher`]: oriented
//! FAST keypoints with rotated BRIEF descriptors, matched by Hamming
//! distance with a cross-check.

pub mod matcher;
pub mod orb;

pub use matcher::*;
pub use orb::*;

use image::GrayImage;

/// Extracts local features and counts good matches between two images.
///
/// Implementations must be deterministic: the same pair of images always
/// yields the same count.
pub trait FeatureMatcher: Send + Sync {
    /// Per-image feature set.
    type Features: Send;

    /// Detect keypoints and compute descriptors for a grayscale image.
    fn extract(&self, image: &GrayImage) -> Self::Features;

    /// Number of good matches between a query and a reference feature set.
    ///
    /// Zero when either side has no features.
    fn count_matches(&self, query: &Self::Features, reference: &Self::Features) -> usize;
}
