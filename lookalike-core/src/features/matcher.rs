//! Brute-force Hamming matching with cross-check.

use image::GrayImage;

use super::orb::{Descriptor, OrbExtractor, OrbFeatures};
use super::FeatureMatcher;

/// Matches with a descriptor distance below this count as good.
pub const DEFAULT_MAX_DESCRIPTOR_DISTANCE: u32 = 50;

/// A mutual nearest-neighbour pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    pub query_idx: usize,
    pub reference_idx: usize,
    pub distance: u32,
}

/// Number of differing bits between two descriptors.
pub fn descriptor_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Index and distance of the nearest descriptor in `candidates`.
///
/// Ties resolve to the lowest index.
fn nearest(descriptor: &Descriptor, candidates: &[Descriptor]) -> Option<(usize, u32)> {
    candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, descriptor_distance(descriptor, candidate)))
        .fold(None, |best, (idx, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((idx, distance)),
        })
}

/// Pairs each query descriptor with its nearest reference descriptor,
/// keeping only pairs that are also nearest in the reverse direction.
///
/// Results are ordered by query index.
pub fn cross_check_match(query: &[Descriptor], reference: &[Descriptor]) -> Vec<DescriptorMatch> {
    if query.is_empty() || reference.is_empty() {
        return Vec::new();
    }

    let reverse: Vec<Option<usize>> = reference
        .iter()
        .map(|descriptor| nearest(descriptor, query).map(|(idx, _)| idx))
        .collect();

    query
        .iter()
        .enumerate()
        .filter_map(|(query_idx, descriptor)| {
            let (reference_idx, distance) = nearest(descriptor, reference)?;
            (reverse[reference_idx] == Some(query_idx)).then_some(DescriptorMatch {
                query_idx,
                reference_idx,
                distance,
            })
        })
        .collect()
}

/// ORB extraction plus cross-checked matching with a distance cutoff.
#[derive(Debug, Clone)]
pub struct OrbMatcher {
    extractor: OrbExtractor,
    max_distance: u32,
}

impl Default for OrbMatcher {
    fn default() -> Self {
        Self::new(OrbExtractor::default(), DEFAULT_MAX_DESCRIPTOR_DISTANCE)
    }
}

impl OrbMatcher {
    pub fn new(extractor: OrbExtractor, max_distance: u32) -> Self {
        Self {
            extractor,
            max_distance,
        }
    }

    /// Same extractor with a different good-match cutoff.
    pub fn with_max_distance(mut self, max_distance: u32) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// Convenience for comparing two images directly.
    pub fn count_image_matches(&self, query: &GrayImage, reference: &GrayImage) -> usize {
        let query = self.extract(query);
        let reference = self.extract(reference);
        self.count_matches(&query, &reference)
    }
}

impl FeatureMatcher for OrbMatcher {
    type Features = OrbFeatures;

    fn extract(&self, image: &GrayImage) -> OrbFeatures {
        self.extractor.extract(image)
    }

    fn count_matches(&self, query: &OrbFeatures, reference: &OrbFeatures) -> usize {
        cross_check_match(&query.descriptors, &reference.descriptors)
            .into_iter()
            .filter(|m| m.distance < self.max_distance)
            .count()
    }
}
