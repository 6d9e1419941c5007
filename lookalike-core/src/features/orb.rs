//! Oriented FAST keypoints with rotated BRIEF descriptors.
//!
//! # Pipeline
//!
//! For each level of a scale pyramid (factor 1.2, 8 levels):
//!
//! 1. FAST-9 corners, discarding anything within the edge border and
//!    keeping only 3x3 local maxima of the corner score.
//! 2. The strongest corners up to the level's share of the feature budget.
//! 3. Orientation from the intensity centroid of a radius-15 disc.
//! 4. A 256-bit descriptor from intensity comparisons on a Gaussian
//!    blurred copy of the level, with the sampling pattern rotated by the
//!    keypoint orientation.
//!
//! The sampling pattern is drawn from a seeded RNG once per extractor, so
//! descriptors from extractors with the same configuration are comparable.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Descriptor size in bytes.
pub const DESCRIPTOR_BYTES: usize = 32;

const DESCRIPTOR_BITS: usize = DESCRIPTOR_BYTES * 8;

/// Half-width of the square the sampling pattern is drawn from.
const PATTERN_HALF_SIZE: i32 = 13;

const ORIENTATION_RADIUS: i32 = 15;

/// 256-bit binary descriptor.
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// Detector parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbConfig {
    /// Total keypoint budget across all pyramid levels.
    pub max_features: usize,
    pub scale_factor: f32,
    pub levels: usize,
    pub fast_threshold: u8,
    /// Keypoints closer than this to a level's edge are discarded.
    pub edge_threshold: u32,
    pub blur_sigma: f32,
    pub pattern_seed: u64,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            max_features: 500,
            scale_factor: 1.2,
            levels: 8,
            fast_threshold: 20,
            edge_threshold: 31,
            blur_sigma: 2.0,
            pattern_seed: 0x6f72_6200,
        }
    }
}

/// A detected keypoint, in level-0 image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Orientation in radians.
    pub angle: f32,
    /// FAST corner score.
    pub response: f32,
    pub level: usize,
}

/// Keypoints and their descriptors, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct OrbFeatures {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl OrbFeatures {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// ORB keypoint detector and descriptor extractor.
#[derive(Debug, Clone)]
pub struct OrbExtractor {
    config: OrbConfig,
    pattern: Vec<[i32; 4]>,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::new(OrbConfig::default())
    }
}

impl OrbExtractor {
    pub fn new(config: OrbConfig) -> Self {
        let pattern = sampling_pattern(config.pattern_seed);
        Self { config, pattern }
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    /// Detect keypoints and compute descriptors.
    ///
    /// Images too small to hold a single keypoint outside the edge border
    /// produce an empty feature set.
    pub fn extract(&self, image: &GrayImage) -> OrbFeatures {
        let mut features = OrbFeatures::default();
        let min_side = 2 * self.config.edge_threshold + 1;

        for (level, quota) in self.level_quotas().into_iter().enumerate() {
            let scale = self.config.scale_factor.powi(level as i32);
            let width = (image.width() as f32 / scale).round() as u32;
            let height = (image.height() as f32 / scale).round() as u32;
            if width < min_side || height < min_side {
                break;
            }

            if level == 0 {
                self.extract_level(image, level, scale, quota, &mut features);
            } else {
                let resized = imageops::resize(image, width, height, FilterType::Triangle);
                self.extract_level(&resized, level, scale, quota, &mut features);
            }
        }

        trace!(
            width = image.width(),
            height = image.height(),
            keypoints = features.len(),
            "Extracted ORB features"
        );
        features
    }

    fn extract_level(
        &self,
        level_image: &GrayImage,
        level: usize,
        scale: f32,
        quota: usize,
        out: &mut OrbFeatures,
    ) {
        if quota == 0 {
            return;
        }
        let corners = self.detect(level_image, quota);
        if corners.is_empty() {
            return;
        }

        let blurred = gaussian_blur_f32(level_image, self.config.blur_sigma);
        for corner in corners {
            let angle = intensity_centroid_angle(level_image, corner.x, corner.y);
            out.descriptors
                .push(self.describe(&blurred, corner.x, corner.y, angle));
            out.keypoints.push(Keypoint {
                x: corner.x as f32 * scale,
                y: corner.y as f32 * scale,
                angle,
                response: corner.score,
                level,
            });
        }
    }

    fn detect(&self, image: &GrayImage, quota: usize) -> Vec<Corner> {
        let border = self.config.edge_threshold;
        let (width, height) = image.dimensions();

        let candidates: Vec<Corner> = corners_fast9(image, self.config.fast_threshold)
            .into_iter()
            .filter(|c| {
                c.x >= border && c.y >= border && c.x < width - border && c.y < height - border
            })
            .collect();

        let mut kept = suppress_non_maxima(candidates, width, height);
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept.truncate(quota);
        kept
    }

    fn describe(&self, blurred: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let max_x = blurred.width() as i32 - 1;
        let max_y = blurred.height() as i32 - 1;

        let sample = |dx: i32, dy: i32| -> u8 {
            let rx = (dx as f32 * cos - dy as f32 * sin).round() as i32;
            let ry = (dx as f32 * sin + dy as f32 * cos).round() as i32;
            let px = (x as i32 + rx).clamp(0, max_x) as u32;
            let py = (y as i32 + ry).clamp(0, max_y) as u32;
            blurred.get_pixel(px, py).0[0]
        };

        let mut descriptor = [0u8; DESCRIPTOR_BYTES];
        for (bit, &[x1, y1, x2, y2]) in self.pattern.iter().enumerate() {
            if sample(x1, y1) < sample(x2, y2) {
                descriptor[bit / 8] |= 1 << (bit % 8);
            }
        }
        descriptor
    }

    /// Split the feature budget geometrically across pyramid levels.
    fn level_quotas(&self) -> Vec<usize> {
        let levels = self.config.levels;
        if levels == 0 {
            return Vec::new();
        }

        let total = self.config.max_features;
        let factor = 1.0 / f64::from(self.config.scale_factor);
        let mut per_level =
            total as f64 * (1.0 - factor) / (1.0 - factor.powi(levels as i32));

        let mut quotas = Vec::with_capacity(levels);
        let mut assigned = 0usize;
        for _ in 0..levels - 1 {
            let quota = (per_level.round() as usize).min(total - assigned);
            quotas.push(quota);
            assigned += quota;
            per_level *= factor;
        }
        quotas.push(total - assigned);
        quotas
    }
}

fn sampling_pattern(seed: u64) -> Vec<[i32; 4]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pattern = Vec::with_capacity(DESCRIPTOR_BITS);
    while pattern.len() < DESCRIPTOR_BITS {
        let pair: [i32; 4] =
            std::array::from_fn(|_| rng.random_range(-PATTERN_HALF_SIZE..=PATTERN_HALF_SIZE));
        if pair[..2] != pair[2..] {
            pattern.push(pair);
        }
    }
    pattern
}

/// Keep corners whose score is not exceeded by any 8-neighbour.
fn suppress_non_maxima(corners: Vec<Corner>, width: u32, height: u32) -> Vec<Corner> {
    let mut scores = vec![0.0f32; (width * height) as usize];
    for c in &corners {
        scores[(c.y * width + c.x) as usize] = c.score;
    }

    corners
        .into_iter()
        .filter(|c| {
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = c.x as i32 + dx;
                    let ny = c.y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                        continue;
                    }
                    if scores[(ny as u32 * width + nx as u32) as usize] > c.score {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// Angle from the patch centre to its intensity centroid.
fn intensity_centroid_angle(image: &GrayImage, cx: u32, cy: u32) -> f32 {
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;

    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > ORIENTATION_RADIUS * ORIENTATION_RADIUS {
                continue;
            }
            let px = cx as i32 + dx;
            let py = cy as i32 + dy;
            if px < 0 || py < 0 || px >= image.width() as i32 || py >= image.height() as i32 {
                continue;
            }
            let intensity = f32::from(image.get_pixel(px as u32, py as u32).0[0]);
            m10 += intensity * dx as f32;
            m01 += intensity * dy as f32;
        }
    }

    m01.atan2(m10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn rectangles_image(seed: u64, width: u32, height: u32) -> GrayImage {
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
        img
    }

    #[test]
    fn test_sampling_pattern_is_deterministic() {
        let a = sampling_pattern(7);
        let b = sampling_pattern(7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        assert_ne!(a, sampling_pattern(8));
    }

    #[test]
    fn test_sampling_pattern_bounds() {
        for pair in sampling_pattern(OrbConfig::default().pattern_seed) {
            for offset in pair {
                assert!((-PATTERN_HALF_SIZE..=PATTERN_HALF_SIZE).contains(&offset));
            }
            assert_ne!(pair[..2], pair[2..]);
        }
    }

    #[test]
    fn test_level_quotas_sum_to_budget() {
        let extractor = OrbExtractor::default();
        let quotas = extractor.level_quotas();
        assert_eq!(quotas.len(), 8);
        assert_eq!(quotas.iter().sum::<usize>(), 500);
        assert!(quotas[0] > quotas[1]);
        assert!(quotas[1] > quotas[6]);
    }

    #[test]
    fn test_single_level_gets_whole_budget() {
        let extractor = OrbExtractor::new(OrbConfig {
            levels: 1,
            ..OrbConfig::default()
        });
        assert_eq!(extractor.level_quotas(), vec![500]);
    }

    #[test]
    fn test_tiny_image_has_no_features() {
        let extractor = OrbExtractor::default();
        let features = extractor.extract(&rectangles_image(1, 62, 62));
        assert!(features.is_empty());
    }

    #[test]
    fn test_flat_image_has_no_features() {
        let extractor = OrbExtractor::default();
        let features = extractor.extract(&GrayImage::from_pixel(300, 300, Luma([90])));
        assert!(features.is_empty());
    }

    #[test]
    fn test_textured_image_features() {
        let extractor = OrbExtractor::default();
        let image = rectangles_image(42, 400, 400);
        let features = extractor.extract(&image);

        assert!(!features.is_empty());
        assert!(features.len() <= 500);
        assert_eq!(features.keypoints.len(), features.descriptors.len());
        for kp in &features.keypoints {
            assert!(kp.x >= 0.0 && kp.x < 400.0);
            assert!(kp.y >= 0.0 && kp.y < 400.0);
            assert!(kp.level < 8);
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let image = rectangles_image(3, 320, 240);
        let a = OrbExtractor::default().extract(&image);
        let b = OrbExtractor::default().extract(&image);
        assert_eq!(a.descriptors, b.descriptors);
        assert_eq!(a.keypoints, b.keypoints);
    }

    #[test]
    fn test_orientation_points_towards_bright_side() {
        let right_bright = GrayImage::from_fn(64, 64, |x, _| Luma([if x > 32 { 255 } else { 0 }]));
        let angle = intensity_centroid_angle(&right_bright, 32, 32);
        assert!(angle.abs() < 0.1, "angle was {}", angle);

        let bottom_bright = GrayImage::from_fn(64, 64, |_, y| Luma([if y > 32 { 255 } else { 0 }]));
        let angle = intensity_centroid_angle(&bottom_bright, 32, 32);
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 0.1, "angle was {}", angle);
    }

    #[test]
    fn test_non_maxima_suppression_keeps_strongest() {
        let corners = vec![
            Corner { x: 10, y: 10, score: 5.0 },
            Corner { x: 11, y: 10, score: 9.0 },
            Corner { x: 20, y: 20, score: 1.0 },
        ];
        let kept = suppress_non_maxima(corners, 32, 32);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|c| c.x == 11 && c.y == 10));
        assert!(kept.iter().any(|c| c.x == 20 && c.y == 20));
    }
}
