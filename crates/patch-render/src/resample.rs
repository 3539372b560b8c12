//! Resampling of patches to a target pixel size.
//!
//! Uses pixel-center alignment: destination pixel `x` samples the source at
//! `(x + 0.5) * src/dst - 0.5`, so resizing never shifts content by half a
//! pixel.

use patch_common::PixelBuffer;
use serde::{Deserialize, Serialize};

/// Interpolation method for resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values).
    Nearest,
    /// Bilinear interpolation (smooth, slight value changes).
    #[default]
    Bilinear,
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}

/// Resample a single-band grid to a different resolution.
///
/// # Arguments
/// - `data`: Input grid data (row-major order)
/// - `src_width`, `src_height`: Source grid size
/// - `dst_width`, `dst_height`: Destination grid size
///
/// # Returns
/// Resampled grid data at the requested resolution
pub fn resize(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    method: InterpolationMethod,
) -> Vec<f32> {
    if src_width == dst_width && src_height == dst_height {
        return data.to_vec();
    }
    if src_width == 0 || src_height == 0 {
        return vec![0.0; dst_width * dst_height];
    }

    let scale_x = src_width as f64 / dst_width.max(1) as f64;
    let scale_y = src_height as f64 / dst_height.max(1) as f64;
    let mut output = vec![0.0f32; dst_width * dst_height];

    for y in 0..dst_height {
        for x in 0..dst_width {
            output[y * dst_width + x] = match method {
                InterpolationMethod::Nearest => {
                    let sx = ((x as f64 * scale_x).floor() as usize).min(src_width - 1);
                    let sy = ((y as f64 * scale_y).floor() as usize).min(src_height - 1);
                    data[sy * src_width + sx]
                }
                InterpolationMethod::Bilinear => {
                    let (x1, x2, dx) = bilinear_taps(x, scale_x, src_width);
                    let (y1, y2, dy) = bilinear_taps(y, scale_y, src_height);

                    let v11 = data[y1 * src_width + x1];
                    let v21 = data[y1 * src_width + x2];
                    let v12 = data[y2 * src_width + x1];
                    let v22 = data[y2 * src_width + x2];

                    let v1 = v11 * (1.0 - dx) + v21 * dx;
                    let v2 = v12 * (1.0 - dx) + v22 * dx;
                    v1 * (1.0 - dy) + v2 * dy
                }
            };
        }
    }

    output
}

/// Source taps and fractional weight for one destination coordinate.
fn bilinear_taps(dst: usize, scale: f64, src_len: usize) -> (usize, usize, f32) {
    let src = ((dst as f64 + 0.5) * scale - 0.5).max(0.0);
    let lo = src.floor() as usize;
    if lo >= src_len - 1 {
        return (src_len - 1, src_len - 1, 0.0);
    }
    (lo, lo + 1, (src - lo as f64) as f32)
}

/// Resize every band of an 8-bit buffer, rounding back to 8 bits.
pub fn resize_u8(
    image: &PixelBuffer<u8>,
    dst_width: usize,
    dst_height: usize,
    method: InterpolationMethod,
) -> PixelBuffer<u8> {
    if image.dimensions() == (dst_width, dst_height) {
        return image.clone();
    }

    let (src_width, src_height) = image.dimensions();
    let bands = image.bands();
    let mut out = PixelBuffer::filled(dst_width, dst_height, bands, 0u8);

    for band in 0..bands {
        let plane: Vec<f32> = image
            .data()
            .iter()
            .skip(band)
            .step_by(bands)
            .map(|&v| v as f32)
            .collect();
        let resized = resize(&plane, src_width, src_height, dst_width, dst_height, method);
        for (dst, v) in out
            .data_mut()
            .iter_mut()
            .skip(band)
            .step_by(bands)
            .zip(resized)
        {
            *dst = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}
