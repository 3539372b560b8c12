//! Synthetic raster generators.
//!
//! These generators create predictable, verifiable pixel patterns that can
//! be used across the test suite in place of real scenes.

use patch_common::PixelBuffer;

/// Creates a single-band grid whose value encodes the pixel position.
///
/// Each cell holds `row * width + col + 1`, so every sample is distinct and
/// non-zero (no window is ever treated as nodata) and a copied window can be
/// checked against its source coordinates.
///
/// # Example
///
/// ```
/// use test_utils::create_coordinate_grid;
///
/// let grid = create_coordinate_grid(10, 5);
/// assert_eq!(grid.get(0, 0, 0), Some(1.0));
/// assert_eq!(grid.get(3, 2, 0), Some(24.0));
/// ```
pub fn create_coordinate_grid(width: usize, height: usize) -> PixelBuffer<f32> {
    let data = (0..width * height).map(|i| (i + 1) as f32).collect();
    single_band(width, height, data)
}

/// Creates an elevation-like grid in meters.
///
/// A smooth field of rolling hills on top of `base` meters, with
/// roughly 200 m of relief. Values are integral so that adding an integer
/// offset is exact in `f32`.
pub fn create_elevation_grid(width: usize, height: usize, base: f32) -> PixelBuffer<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x = col as f32 / width.max(1) as f32 * std::f32::consts::TAU;
            let y = row as f32 / height.max(1) as f32 * std::f32::consts::TAU;
            let relief = 100.0 * (x.sin() * y.cos()) + 50.0 * (2.0 * x).cos();
            data.push(base + relief.round());
        }
    }
    single_band(width, height, data)
}

/// Creates an optical-like grid with `bands` bands of 12-bit reflectance.
///
/// Each band is a diagonal gradient shifted by the band index, with a
/// deterministic speckle so percentiles are not degenerate.
pub fn create_optical_grid(width: usize, height: usize, bands: usize, seed: u32) -> PixelBuffer<f32> {
    let bands = bands.max(1);
    let mut data = Vec::with_capacity(width * height * bands);
    for row in 0..height {
        for col in 0..width {
            for band in 0..bands {
                let gradient = ((col + row) * 4095 / (width + height).max(1)) as f32;
                let speckle = (simple_hash(col as u32, row as u32, seed + band as u32) % 64) as f32;
                data.push((gradient + speckle + band as f32 * 100.0).min(4095.0));
            }
        }
    }
    PixelBuffer::new(width, height, bands, data).expect("generator produced a consistent shape")
}

/// Creates an 8-bit patch with the fraction `bright_fraction` of its pixels
/// set to `bright` and the rest set to `dark`.
///
/// Bright pixels fill the patch in row-major order, so the count is exact:
/// `round(width * height * bright_fraction)`.
pub fn create_partial_patch(
    width: usize,
    height: usize,
    bright_fraction: f64,
    bright: u8,
    dark: u8,
) -> PixelBuffer<u8> {
    let total = width * height;
    let bright_count = ((total as f64) * bright_fraction.clamp(0.0, 1.0)).round() as usize;
    let data = (0..total)
        .map(|i| if i < bright_count { bright } else { dark })
        .collect();
    single_band(width, height, data)
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> PixelBuffer<f32> {
    PixelBuffer::filled(width, height, 1, value)
}

/// Creates a grid where some values are NaN (missing data).
///
/// Every `nan_frequency`-th value (starting at index 0) is NaN.
pub fn create_grid_with_nan(width: usize, height: usize, nan_frequency: usize) -> PixelBuffer<f32> {
    let freq = nan_frequency.max(1);
    let data = (0..width * height)
        .map(|i| if i % freq == 0 { f32::NAN } else { i as f32 })
        .collect();
    single_band(width, height, data)
}

fn single_band<T>(width: usize, height: usize, data: Vec<T>) -> PixelBuffer<T> {
    PixelBuffer::new(width, height, 1, data).expect("generator produced a consistent shape")
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
