//! Optical + elevation overlay composites.
//!
//! ```text
//! optical window ──► percentile stretch ──► RGB ───────────────┐
//!                                                              ├─► 0.7 a + 0.3 b ──► CLAHE
//! elevation window ─► min-max ─► 8-bit ─► resize ─► jet ramp ──┘
//! ```

use patch_common::{PatchError, PixelBuffer, Result};
use serde::{Deserialize, Serialize};

use crate::clahe::equalize;
use crate::colormap::apply_jet;
use crate::contrast::{min_max_normalize, quantize, ContrastNormalizer};
use crate::resample::{resize_u8, InterpolationMethod};

/// Guard for the elevation min-max normalization in overlays.
const OVERLAY_ELEVATION_EPSILON: f64 = 1e-5;

/// Blend two 8-bit buffers of equal shape: `a * weight_a + b * weight_b`,
/// rounded and saturated to [0, 255].
pub fn blend_weighted(
    a: &PixelBuffer<u8>,
    weight_a: f64,
    b: &PixelBuffer<u8>,
    weight_b: f64,
) -> Result<PixelBuffer<u8>> {
    if a.dimensions() != b.dimensions() || a.bands() != b.bands() {
        return Err(PatchError::shape_mismatch(format!(
            "cannot blend {}x{}x{} with {}x{}x{}",
            a.width(),
            a.height(),
            a.bands(),
            b.width(),
            b.height(),
            b.bands()
        )));
    }

    let mut out = a.clone();
    for (dst, &other) in out.data_mut().iter_mut().zip(b.data()) {
        let value = *dst as f64 * weight_a + other as f64 * weight_b;
        *dst = value.round().clamp(0.0, 255.0) as u8;
    }
    Ok(out)
}

/// Builds one visualization patch from a matched optical/elevation window pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayCompositor {
    /// Stretch for the optical patch and CLAHE for the composite.
    pub normalizer: ContrastNormalizer,
    /// Weight of the optical RGB.
    pub optical_weight: f64,
    /// Weight of the colorized elevation.
    pub elevation_weight: f64,
    /// Resampling used to bring elevation onto the optical grid.
    pub interpolation: InterpolationMethod,
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self {
            normalizer: ContrastNormalizer::default(),
            optical_weight: 0.7,
            elevation_weight: 0.3,
            interpolation: InterpolationMethod::Bilinear,
        }
    }
}

impl OverlayCompositor {
    /// Colorize the first elevation band, resampled to `width x height`.
    pub fn colorize_elevation(
        &self,
        elevation: &PixelBuffer<f32>,
        width: usize,
        height: usize,
    ) -> PixelBuffer<u8> {
        let normalized = min_max_normalize(&elevation.first_band(), OVERLAY_ELEVATION_EPSILON);
        let quantized = normalized.map(|&v| quantize(v as f64));
        let resized = resize_u8(&quantized, width, height, self.interpolation);
        apply_jet(&resized)
    }

    /// Composite an optical window with its elevation window.
    ///
    /// The output has the optical window's dimensions and three bands.
    pub fn composite(
        &self,
        optical: &PixelBuffer<f32>,
        elevation: &PixelBuffer<f32>,
    ) -> Result<PixelBuffer<u8>> {
        let optical_rgb = self.normalizer.stretch(optical);
        let (width, height) = optical_rgb.dimensions();
        let elevation_rgb = self.colorize_elevation(elevation, width, height);

        let blended = blend_weighted(
            &optical_rgb,
            self.optical_weight,
            &elevation_rgb,
            self.elevation_weight,
        )?;
        Ok(equalize(&blended, &self.normalizer.clahe))
    }
}
