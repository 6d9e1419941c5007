//! Hamming distance and the similarity score model.

use super::perceptual::Fingerprint;
use crate::error::{LookalikeError, Result};

/// Number of differing bits between two fingerprints.
///
/// Fingerprints of different lengths are not comparable.
pub fn hamming_distance(a: &Fingerprint, b: &Fingerprint) -> Result<u32> {
    if a.bit_len() != b.bit_len() {
        return Err(LookalikeError::FingerprintLengthMismatch {
            left: a.bit_len(),
            right: b.bit_len(),
        });
    }

    Ok(a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum())
}

/// `100 * (1 - distance / bit_len)`, clamped to `0..=100` and rounded to two
/// decimals.
pub fn similarity_score(distance: u32, bit_len: u32) -> f64 {
    if bit_len == 0 {
        return 0.0;
    }
    let raw = 100.0 * (1.0 - f64::from(distance) / f64::from(bit_len));
    round_score(raw.clamp(0.0, 100.0))
}

/// Round to two decimal places.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(hex: &str) -> Fingerprint {
        Fingerprint::from_hex(hex).unwrap()
    }

    #[test]
    fn test_identical_fingerprints() {
        let a = fp("0123456789abcdef");
        assert_eq!(hamming_distance(&a, &a).unwrap(), 0);
        assert_eq!(a.similarity(&a).unwrap(), 100.0);
    }

    #[test]
    fn test_fully_inverted_fingerprints() {
        let a = fp("0000000000000000");
        let b = fp("ffffffffffffffff");
        assert_eq!(hamming_distance(&a, &b).unwrap(), 64);
        assert_eq!(a.similarity(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = fp("f0f0f0f0f0f0f0f0");
        let b = fp("f0f0f0f0f0f0f0ff");
        assert_eq!(hamming_distance(&a, &b).unwrap(), 4);
        assert_eq!(hamming_distance(&b, &a).unwrap(), 4);
    }

    #[test]
    fn test_score_rounding() {
        assert_eq!(similarity_score(1, 64), 98.44);
        assert_eq!(similarity_score(16, 64), 75.0);
        assert_eq!(similarity_score(17, 64), 73.44);
        assert_eq!(similarity_score(3, 64), 95.31);
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(similarity_score(100, 64), 0.0);
        assert_eq!(similarity_score(0, 0), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let a = fp("0123456789abcdef");
        let b = fp("0123");
        let err = hamming_distance(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            LookalikeError::FingerprintLengthMismatch {
                left: 64,
                right: 16
            }
        ));
        assert!(a.similarity(&b).is_err());
    }
}
