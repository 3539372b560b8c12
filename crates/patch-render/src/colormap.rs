//! Color ramps for elevation overlays.

use patch_common::PixelBuffer;

/// Color value in RGB format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn black() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.max(0.0).min(1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)).round() as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)).round() as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)).round() as u8,
    )
}

/// Jet color scale
/// Maps a normalized value (0-1) to the classic blue-cyan-yellow-red ramp
pub fn jet_color(t: f32) -> Color {
    // Jet stops:
    // 0.000: Dark blue
    // 0.125: Blue
    // 0.375: Cyan
    // 0.625: Yellow
    // 0.875: Red
    // 1.000: Dark red

    match t {
        t if t.is_nan() || t <= 0.0 => Color::new(0, 0, 128),
        t if t < 0.125 => interpolate_color(
            Color::new(0, 0, 128),
            Color::new(0, 0, 255),
            t / 0.125,
        ),
        t if t < 0.375 => interpolate_color(
            Color::new(0, 0, 255),
            Color::new(0, 255, 255),
            (t - 0.125) / 0.25,
        ),
        t if t < 0.625 => interpolate_color(
            Color::new(0, 255, 255),
            Color::new(255, 255, 0),
            (t - 0.375) / 0.25,
        ),
        t if t < 0.875 => interpolate_color(
            Color::new(255, 255, 0),
            Color::new(255, 0, 0),
            (t - 0.625) / 0.25,
        ),
        t if t < 1.0 => interpolate_color(
            Color::new(255, 0, 0),
            Color::new(128, 0, 0),
            (t - 0.875) / 0.125,
        ),
        _ => Color::new(128, 0, 0),
    }
}

/// Build a 256-entry lookup table for an 8-bit input.
fn jet_lut() -> [Color; 256] {
    let mut lut = [Color::black(); 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = jet_color(i as f32 / 255.0);
    }
    lut
}

/// Colorize the first band of an 8-bit buffer with the jet ramp.
///
/// # Returns
/// A 3-band RGB buffer with the input's dimensions
pub fn apply_jet(gray: &PixelBuffer<u8>) -> PixelBuffer<u8> {
    let lut = jet_lut();
    let (width, height) = gray.dimensions();
    let bands = gray.bands();

    let mut out = PixelBuffer::filled(width, height, 3, 0u8);
    for (pixel, rgb) in gray
        .data()
        .chunks_exact(bands)
        .zip(out.data_mut().chunks_exact_mut(3))
    {
        let color = lut[pixel[0] as usize];
        rgb[0] = color.r;
        rgb[1] = color.g;
        rgb[2] = color.b;
    }
    out
}
