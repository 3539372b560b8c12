//! Percentile contrast stretching and 8-bit quantization.
//!
//! Raw sensor and elevation windows arrive with arbitrary numeric range.
//! The stretch maps the 2nd..98th percentile band of a patch onto [0, 1],
//! clipping the tails, and quantizes to 8 bits. The full normalizer then
//! replicates single-band input to RGB and applies CLAHE per band.

use patch_common::PixelBuffer;
use serde::{Deserialize, Serialize};

use crate::clahe::{equalize, ClaheParams};

/// Guard added to the percentile range so flat patches stretch to zero
/// instead of dividing by zero.
pub const STRETCH_EPSILON: f64 = 1e-5;

/// Compute a percentile (0-100) of the finite values in `values`, using
/// linear interpolation between the two nearest order statistics.
///
/// Returns 0.0 when there are no finite values.
pub fn percentile(values: &[f32], p: f64) -> f64 {
    let sorted = sorted_finite(values);
    percentile_of_sorted(&sorted, p)
}

fn sorted_finite(values: &[f32]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Quantize a unit-range value to 8 bits, truncating like an integer cast.
/// Values outside [0, 1] saturate; NaN maps to 0.
#[inline]
pub fn quantize(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Linearly stretch `raw` so that the `low`..`high` percentile range (over
/// all bands combined) maps to 0..255, clipping values outside it.
///
/// The band count of the input is preserved. Non-finite samples become 0.
pub fn percentile_stretch(raw: &PixelBuffer<f32>, low: f64, high: f64) -> PixelBuffer<u8> {
    let sorted = sorted_finite(raw.data());
    let p_low = percentile_of_sorted(&sorted, low);
    let p_high = percentile_of_sorted(&sorted, high);
    let scale = p_high - p_low + STRETCH_EPSILON;

    tracing::trace!(p_low, p_high, "percentile stretch bounds");

    raw.map(|&v| {
        if v.is_finite() {
            quantize((v as f64 - p_low) / scale)
        } else {
            0
        }
    })
}

/// Min-max normalize every sample to [0, 1] using the buffer's own range.
///
/// Non-finite samples are replaced by zero before the range is measured.
/// `epsilon` guards a flat buffer.
pub fn min_max_normalize(raw: &PixelBuffer<f32>, epsilon: f64) -> PixelBuffer<f32> {
    let clean = raw.map(|&v| if v.is_finite() { v as f64 } else { 0.0 });

    let (min, max) = clean
        .data()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return raw.map(|_| 0.0);
    }
    let range = max - min + epsilon;

    clean.map(|&v| (((v - min) / range).clamp(0.0, 1.0)) as f32)
}

/// Coerce an 8-bit buffer to three bands.
///
/// Single- and two-band input replicates the first band; input with more
/// than three bands keeps the first three (alpha and extra bands dropped).
pub fn to_rgb(image: &PixelBuffer<u8>) -> PixelBuffer<u8> {
    match image.bands() {
        3 => image.clone(),
        1 => image.replicate(3),
        2 => image.first_band().replicate(3),
        bands => {
            let mut out = PixelBuffer::filled(image.width(), image.height(), 3, 0u8);
            for (src, dst) in image
                .data()
                .chunks_exact(bands)
                .zip(out.data_mut().chunks_exact_mut(3))
            {
                dst.copy_from_slice(&src[..3]);
            }
            out
        }
    }
}

/// Percentile stretch followed by per-band CLAHE.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastNormalizer {
    /// Lower percentile mapped to 0.
    pub low_percentile: f64,
    /// Upper percentile mapped to 255.
    pub high_percentile: f64,
    /// Local equalization parameters.
    pub clahe: ClaheParams,
}

impl Default for ContrastNormalizer {
    fn default() -> Self {
        Self {
            low_percentile: 2.0,
            high_percentile: 98.0,
            clahe: ClaheParams::default(),
        }
    }
}

impl ContrastNormalizer {
    /// Create a normalizer with explicit percentiles and CLAHE parameters.
    pub fn new(low_percentile: f64, high_percentile: f64, clahe: ClaheParams) -> Self {
        Self {
            low_percentile,
            high_percentile,
            clahe,
        }
    }

    /// Stretch and quantize to a 3-band buffer. No equalization is applied.
    pub fn stretch(&self, raw: &PixelBuffer<f32>) -> PixelBuffer<u8> {
        to_rgb(&percentile_stretch(raw, self.low_percentile, self.high_percentile))
    }

    /// The full normalization: stretch, quantize, replicate to RGB, CLAHE.
    ///
    /// The output always has the spatial dimensions of the input and exactly
    /// three bands.
    pub fn normalize(&self, raw: &PixelBuffer<f32>) -> PixelBuffer<u8> {
        equalize(&self.stretch(raw), &self.clahe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_linear_interpolation() {
        let values: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        assert!((percentile(&values, 2.0) - 2.0).abs() < 1e-9);
        assert!((percentile(&values, 98.0) - 98.0).abs() < 1e-9);

        // Between order statistics: [0, 10], p50 -> 5
        assert!((percentile(&[10.0, 0.0], 50.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_ignores_non_finite() {
        let values = [f32::NAN, 1.0, 3.0, f32::INFINITY];
        assert!((percentile(&values, 50.0) - 2.0).abs() < 1e-9);
        assert_eq!(percentile(&[f32::NAN], 50.0), 0.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_quantize_truncates_and_saturates() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 255);
        assert_eq!(quantize(0.5), 127);
        assert_eq!(quantize(2.0), 255);
        assert_eq!(quantize(-1.0), 0);
        assert_eq!(quantize(f64::NAN), 0);
    }

    #[test]
    fn test_stretch_constant_patch_is_zero() {
        let raw = PixelBuffer::filled(8, 8, 1, 1234.0f32);
        let out = percentile_stretch(&raw, 2.0, 98.0);
        assert!(out.all_equal(&0));
    }

    #[test]
    fn test_stretch_clips_single_outlier() {
        let mut raw = PixelBuffer::filled(10, 10, 1, 0.0f32);
        for (i, v) in raw.data_mut().iter_mut().enumerate() {
            *v = i as f32;
        }
        raw.set(9, 9, 0, 1.0e9);
        let out = percentile_stretch(&raw, 2.0, 98.0);
        // The outlier saturates instead of compressing everything else to 0.
        assert_eq!(out.get(9, 9, 0), Some(255));
        assert!(out.get(0, 5, 0).unwrap() > 100);
    }

    #[test]
    fn test_min_max_normalize_range() {
        let raw = PixelBuffer::new(3, 1, 1, vec![10.0f32, f32::NAN, 30.0]).unwrap();
        let norm = min_max_normalize(&raw, 1e-6);
        // NaN -> 0 becomes the minimum.
        assert!(norm.get(1, 0, 0).unwrap().abs() < 1e-6);
        assert!((norm.get(2, 0, 0).unwrap() - 1.0).abs() < 1e-4);
        assert!(norm.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_to_rgb_drops_alpha() {
        let rgba = PixelBuffer::new(1, 1, 4, vec![1u8, 2, 3, 4]).unwrap();
        assert_eq!(to_rgb(&rgba).data(), &[1, 2, 3]);
        let gray_alpha = PixelBuffer::new(1, 1, 2, vec![9u8, 255]).unwrap();
        assert_eq!(to_rgb(&gray_alpha).data(), &[9, 9, 9]);
    }

    #[test]
    fn test_normalizer_outputs_three_bands() {
        let raw = PixelBuffer::filled(5, 3, 1, 7.0f32);
        let out = ContrastNormalizer::default().normalize(&raw);
        assert_eq!(out.dimensions(), (5, 3));
        assert_eq!(out.bands(), 3);
    }
}
