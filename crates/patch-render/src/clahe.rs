//! Contrast limited adaptive histogram equalization (CLAHE).
//!
//! The image is divided into a fixed grid of tiles (8x8 by default, so tile
//! size depends on the image size). Each tile gets its own clipped
//! histogram and lookup table; every pixel is remapped by bilinearly
//! interpolating the lookup tables of the four nearest tile centers.
//!
//! Images whose size is not a multiple of the grid are padded on the right
//! and bottom by reflection (`dcb|abcd|cba`, edge pixel not repeated) for
//! histogram purposes only. The output has the input's dimensions.

use patch_common::PixelBuffer;
use serde::{Deserialize, Serialize};

const BINS: usize = 256;

/// CLAHE parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaheParams {
    /// Contrast limit, as a multiple of the uniform bin height
    /// (`tile_area / 256`). Values <= 0 disable clipping.
    pub clip_limit: f64,
    /// Number of tiles along (x, y).
    pub tile_grid: (usize, usize),
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tile_grid: (8, 8),
        }
    }
}

/// Apply CLAHE independently to every band of `image`.
pub fn equalize(image: &PixelBuffer<u8>, params: &ClaheParams) -> PixelBuffer<u8> {
    let (width, height) = image.dimensions();
    let bands = image.bands();
    let mut out = image.clone();

    if image.is_empty() {
        return out;
    }

    for band in 0..bands {
        let plane: Vec<u8> = image.data().iter().skip(band).step_by(bands).copied().collect();
        let equalized = equalize_plane(&plane, width, height, params);
        for (dst, &v) in out
            .data_mut()
            .iter_mut()
            .skip(band)
            .step_by(bands)
            .zip(equalized.iter())
        {
            *dst = v;
        }
    }

    out
}

/// Apply CLAHE to a single 8-bit plane (row-major).
pub fn equalize_plane(plane: &[u8], width: usize, height: usize, params: &ClaheParams) -> Vec<u8> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let tiles_x = params.tile_grid.0.max(1);
    let tiles_y = params.tile_grid.1.max(1);
    let (tile_w, tile_h) = tile_size(width, height, tiles_x, tiles_y);
    let tile_area = tile_w * tile_h;

    let clip = if params.clip_limit > 0.0 {
        Some(((params.clip_limit * tile_area as f64 / BINS as f64) as u32).max(1))
    } else {
        None
    };
    let lut_scale = (BINS - 1) as f64 / tile_area as f64;

    let mut luts = vec![[0u8; BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0u32; BINS];
            for py in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect_101(py, height);
                for px in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect_101(px, width);
                    hist[plane[sy * width + sx] as usize] += 1;
                }
            }

            if let Some(limit) = clip {
                clip_histogram(&mut hist, limit);
            }

            luts[ty * tiles_x + tx] = build_lut(&hist, lut_scale);
        }
    }

    let inv_tw = 1.0 / tile_w as f64;
    let inv_th = 1.0 / tile_h as f64;
    let mut out = vec![0u8; width * height];

    for y in 0..height {
        let tyf = y as f64 * inv_th - 0.5;
        let ty1f = tyf.floor();
        let ya = tyf - ty1f;
        let ty1 = (ty1f.max(0.0) as usize).min(tiles_y - 1);
        let ty2 = ((ty1f + 1.0).max(0.0) as usize).min(tiles_y - 1);

        for x in 0..width {
            let txf = x as f64 * inv_tw - 0.5;
            let tx1f = txf.floor();
            let xa = txf - tx1f;
            let tx1 = (tx1f.max(0.0) as usize).min(tiles_x - 1);
            let tx2 = ((tx1f + 1.0).max(0.0) as usize).min(tiles_x - 1);

            let v = plane[y * width + x] as usize;
            let top = luts[ty1 * tiles_x + tx1][v] as f64 * (1.0 - xa)
                + luts[ty1 * tiles_x + tx2][v] as f64 * xa;
            let bottom = luts[ty2 * tiles_x + tx1][v] as f64 * (1.0 - xa)
                + luts[ty2 * tiles_x + tx2][v] as f64 * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            out[y * width + x] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

/// Tile size for a `tiles_x x tiles_y` grid.
///
/// When either axis is not a multiple of the grid, both axes are padded by
/// `tiles - dim % tiles`, so an axis that already divides evenly still grows
/// by one full tile row or column.
fn tile_size(width: usize, height: usize, tiles_x: usize, tiles_y: usize) -> (usize, usize) {
    if width % tiles_x == 0 && height % tiles_y == 0 {
        return (width / tiles_x, height / tiles_y);
    }
    let padded_w = width + tiles_x - width % tiles_x;
    let padded_h = height + tiles_y - height % tiles_y;
    (padded_w / tiles_x, padded_h / tiles_y)
}

/// Clip bins above `limit` and spread the excess evenly, with any remainder
/// handed out one count at a time across the range.
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut clipped = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            clipped += *bin - limit;
            *bin = limit;
        }
    }

    let batch = clipped / BINS as u32;
    let mut residual = clipped - batch * BINS as u32;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (BINS / residual as usize).max(1);
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

fn build_lut(hist: &[u32; BINS], scale: f64) -> [u8; BINS] {
    let mut lut = [0u8; BINS];
    let mut sum = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        sum += count as u64;
        lut[i] = (sum as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Reflect an index into `0..n` without repeating the edge sample.
fn reflect_101(i: usize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * n - 2;
    let i = i % period;
    if i >= n {
        period - i
    } else {
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_size_pads_every_axis_once_uneven() {
        assert_eq!(tile_size(512, 512, 8, 8), (64, 64));
        assert_eq!(tile_size(512, 300, 8, 8), (65, 38));
        assert_eq!(tile_size(300, 512, 8, 8), (38, 65));
        assert_eq!(tile_size(10, 7, 8, 8), (2, 1));
    }

    #[test]
    fn test_uneven_window_keeps_dimensions() {
        let plane: Vec<u8> = (0..512 * 300).map(|i| (i % 251) as u8).collect();
        let out = equalize_plane(&plane, 512, 300, &ClaheParams::default());
        assert_eq!(out.len(), plane.len());
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(0, 4), 0);
        assert_eq!(reflect_101(3, 4), 3);
        assert_eq!(reflect_101(4, 4), 2);
        assert_eq!(reflect_101(5, 4), 1);
        assert_eq!(reflect_101(6, 4), 0);
        assert_eq!(reflect_101(9, 1), 0);
    }

    #[test]
    fn test_clip_histogram_preserves_mass() {
        let mut hist = [0u32; BINS];
        hist[10] = 1000;
        hist[200] = 24;
        clip_histogram(&mut hist, 12);
        let total: u32 = hist.iter().sum();
        assert_eq!(total, 1024);
        assert!(hist[10] <= 12 + 1000 / 256 + 1);
    }

    #[test]
    fn test_lut_is_monotonic() {
        let mut hist = [0u32; BINS];
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin = (i % 7) as u32;
        }
        let total: u32 = hist.iter().sum();
        let lut = build_lut(&hist, 255.0 / total as f64);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn test_equalize_preserves_shape() {
        let img = PixelBuffer::new(13, 7, 3, (0..13 * 7 * 3).map(|i| (i % 256) as u8).collect())
            .unwrap();
        let out = equalize(&img, &ClaheParams::default());
        assert_eq!(out.dimensions(), (13, 7));
        assert_eq!(out.bands(), 3);
    }

    #[test]
    fn test_equalize_tiny_image() {
        // Smaller than the tile grid in both dimensions.
        let img = PixelBuffer::new(3, 1, 1, vec![0u8, 128, 255]).unwrap();
        let out = equalize(&img, &ClaheParams::default());
        assert_eq!(out.dimensions(), (3, 1));
    }

    #[test]
    fn test_equalize_stretches_low_contrast() {
        // Input spans only 100..=115; equalization widens that range.
        let width = 64;
        let height = 64;
        let plane: Vec<u8> = (0..width * height)
            .map(|i| 100 + (i % width % 16) as u8)
            .collect();
        let out = equalize_plane(&plane, width, height, &ClaheParams::default());
        let min = *out.iter().min().unwrap();
        let max = *out.iter().max().unwrap();
        assert!(max - min > 15, "range {}..{}", min, max);
    }
}
