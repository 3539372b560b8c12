//! Hillshade (shaded relief) synthesis from elevation patches.
//!
//! Shading follows a light-source model:
//!
//! 1. Surface gradient by central differences (one-sided at the borders),
//!    with rows running south so the y spacing is -1.
//! 2. Unit surface normal `(-dz/dx, -dz/dy, 1) / |n|`.
//! 3. Intensity = normal . light direction, rescaled to [0, 1] by its own
//!    min/max.
//! 4. Overlay blend of the intensity against the elevation rendered through
//!    a 256-level gray colormap.
//!
//! Because both the gradient and the colormap normalization are relative,
//! the result does not change when a constant is added to the elevation.

use patch_common::PixelBuffer;
use serde::{Deserialize, Serialize};

use crate::contrast::{min_max_normalize, quantize};

/// Guard for the per-patch min-max elevation normalization.
pub const ELEVATION_EPSILON: f64 = 1e-6;

/// Intensity ranges at or below this are treated as flat and left unscaled.
const INTENSITY_FLAT_RANGE: f64 = 1e-6;

/// A distant light source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    /// Compass bearing of the light in degrees (0 = north, clockwise).
    pub azimuth: f64,
    /// Elevation angle of the light above the horizon in degrees.
    pub altitude: f64,
}

impl Default for LightSource {
    fn default() -> Self {
        Self {
            azimuth: 315.0, // NW illumination (standard)
            altitude: 45.0,
        }
    }
}

impl LightSource {
    /// Create a light source from azimuth and altitude in degrees.
    pub fn new(azimuth: f64, altitude: f64) -> Self {
        Self { azimuth, altitude }
    }

    /// Unit vector pointing towards the light (x east, y north, z up).
    pub fn direction(&self) -> [f64; 3] {
        let az = (90.0 - self.azimuth).to_radians();
        let alt = self.altitude.to_radians();
        [az.cos() * alt.cos(), az.sin() * alt.cos(), alt.sin()]
    }
}

/// Parameters for hillshade synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HillshadeParams {
    pub light: LightSource,
    /// Vertical exaggeration applied to elevation before differentiation.
    pub vert_exag: f64,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            light: LightSource::default(),
            vert_exag: 1.0,
        }
    }
}

/// Synthesize a hillshade from a raw elevation patch.
///
/// Non-finite samples become zero, the patch is min-max normalized with its
/// own range, then shaded. Only the first band is used.
///
/// # Returns
/// Single-band intensity in [0, 1] with the input's dimensions
pub fn synthesize(elevation: &PixelBuffer<f32>, params: &HillshadeParams) -> PixelBuffer<f32> {
    let first = elevation.first_band();
    let normalized = min_max_normalize(&first, ELEVATION_EPSILON);
    shade(&normalized, params)
}

/// Shade an elevation surface with overlay blending against a gray ramp.
///
/// Unlike [`synthesize`], the input is not min-max normalized first; the
/// gradient is taken from the values as given.
pub fn shade(elevation: &PixelBuffer<f32>, params: &HillshadeParams) -> PixelBuffer<f32> {
    let (width, height) = elevation.dimensions();
    let values: Vec<f64> = elevation
        .data()
        .iter()
        .step_by(elevation.bands())
        .map(|&v| v as f64)
        .collect();

    let intensity = intensity(&values, width, height, params);
    let gray = gray_colormap(&values);

    let mut out = PixelBuffer::filled(width, height, 1, 0.0f32);
    for ((dst, &base), &light) in out.data_mut().iter_mut().zip(gray.iter()).zip(intensity.iter()) {
        *dst = blend_overlay(base, light) as f32;
    }
    out
}

/// Illumination intensity in [0, 1] for every pixel.
pub fn intensity(values: &[f64], width: usize, height: usize, params: &HillshadeParams) -> Vec<f64> {
    let light = params.light.direction();
    let scaled: Vec<f64> = values.iter().map(|v| v * params.vert_exag).collect();

    let mut out = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dz_dx = gradient(&scaled, width, height, col, row, Axis::X);
            // Row index grows southwards.
            let dz_dy = -gradient(&scaled, width, height, col, row, Axis::Y);

            let (nx, ny, nz) = (-dz_dx, -dz_dy, 1.0);
            let norm = (nx * nx + ny * ny + nz * nz).sqrt();
            out.push((nx * light[0] + ny * light[1] + nz * light[2]) / norm);
        }
    }

    let (imin, imax) = out
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = imax - imin;
    for v in out.iter_mut() {
        if range > INTENSITY_FLAT_RANGE {
            *v = (*v - imin) / range;
        }
        *v = v.clamp(0.0, 1.0);
    }
    out
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Unit-spacing derivative along one axis; central in the interior,
/// one-sided at the edges, zero for a dimension of length 1.
fn gradient(values: &[f64], width: usize, height: usize, col: usize, row: usize, axis: Axis) -> f64 {
    let (pos, len) = match axis {
        Axis::X => (col, width),
        Axis::Y => (row, height),
    };
    if len < 2 {
        return 0.0;
    }
    let at = |p: usize| match axis {
        Axis::X => values[row * width + p],
        Axis::Y => values[p * width + col],
    };
    if pos == 0 {
        at(1) - at(0)
    } else if pos == len - 1 {
        at(len - 1) - at(len - 2)
    } else {
        (at(pos + 1) - at(pos - 1)) / 2.0
    }
}

/// Map values through a 256-level gray colormap spanning their own range.
fn gray_colormap(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            let t = if range > 0.0 { (v - min) / range } else { 0.0 };
            let level = ((t * 256.0).max(0.0) as usize).min(255);
            level as f64 / 255.0
        })
        .collect()
}

/// Overlay blend: darkens where the base is dark, lightens where it is light.
#[inline]
fn blend_overlay(base: f64, light: f64) -> f64 {
    if base <= 0.5 {
        2.0 * light * base
    } else {
        1.0 - 2.0 * (1.0 - light) * (1.0 - base)
    }
}

/// Quantize a [0, 1] intensity buffer to 8 bits.
pub fn to_u8(intensity: &PixelBuffer<f32>) -> PixelBuffer<u8> {
    intensity.map(|&v| quantize(v as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> PixelBuffer<f32> {
        let data = (0..width * height)
            .map(|i| ((i % width) + (i / width)) as f32)
            .collect();
        PixelBuffer::new(width, height, 1, data).unwrap()
    }

    #[test]
    fn test_default_light_direction() {
        // Azimuth 315 (NW): light comes from negative x, positive y.
        let d = LightSource::default().direction();
        assert!(d[0] < 0.0);
        assert!(d[1] > 0.0);
        assert!((d[2] - 45f64.to_radians().sin()).abs() < 1e-12);
        let len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_edges_and_interior() {
        let values = [0.0, 1.0, 4.0];
        assert_eq!(gradient(&values, 3, 1, 0, 0, Axis::X), 1.0);
        assert_eq!(gradient(&values, 3, 1, 1, 0, Axis::X), 2.0);
        assert_eq!(gradient(&values, 3, 1, 2, 0, Axis::X), 3.0);
        assert_eq!(gradient(&values, 3, 1, 1, 0, Axis::Y), 0.0);
    }

    #[test]
    fn test_flat_patch_is_finite() {
        let flat = PixelBuffer::filled(6, 4, 1, 100.0f32);
        let out = synthesize(&flat, &HillshadeParams::default());
        assert_eq!(out.dimensions(), (6, 4));
        assert!(out.data().iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_non_finite_samples_are_zeroed() {
        let mut elev = ramp(5, 5);
        elev.set(2, 2, 0, f32::NAN);
        elev.set(0, 4, 0, f32::INFINITY);
        let out = synthesize(&elev, &HillshadeParams::default());
        assert!(out.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_overlay_blend_bounds() {
        assert_eq!(blend_overlay(0.0, 1.0), 0.0);
        assert_eq!(blend_overlay(1.0, 0.0), 1.0);
        assert!((blend_overlay(0.5, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gray_colormap_levels() {
        let levels = gray_colormap(&[0.0, 0.5, 1.0]);
        assert_eq!(levels[0], 0.0);
        assert!((levels[1] - 128.0 / 255.0).abs() < 1e-12);
        assert_eq!(levels[2], 1.0);
    }

    #[test]
    fn test_west_facing_plane_lit_from_west() {
        // z = x rises to the east, so the surface faces west.
        let values: Vec<f64> = (0..16).map(|i| (i % 4) as f64).collect();
        let lit = |azimuth: f64| {
            intensity(
                &values,
                4,
                4,
                &HillshadeParams {
                    light: LightSource::new(azimuth, 45.0),
                    vert_exag: 1.0,
                },
            )
        };

        // Uniform slope means a flat intensity field, which is left unscaled.
        assert!(lit(270.0).iter().all(|v| (v - 1.0).abs() < 1e-9));
        assert!(lit(90.0).iter().all(|v| v.abs() < 1e-9));
    }
}
