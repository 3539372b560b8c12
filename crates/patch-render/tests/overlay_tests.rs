//! Tests for optical + elevation overlays.

use patch_common::PixelBuffer;
use patch_render::{apply_jet, blend_weighted, InterpolationMethod, OverlayCompositor};
use test_utils::{create_elevation_grid, create_optical_grid};

#[test]
fn test_composite_resizes_elevation_to_optical() {
    let optical = create_optical_grid(64, 64, 3, 1);
    // Elevation at half the optical resolution.
    let elevation = create_elevation_grid(32, 32, 1200.0);

    let out = OverlayCompositor::default().composite(&optical, &elevation).unwrap();
    assert_eq!(out.dimensions(), (64, 64));
    assert_eq!(out.bands(), 3);
}

#[test]
fn test_colorized_elevation_spans_ramp() {
    let elevation = create_elevation_grid(32, 32, 0.0);
    let compositor = OverlayCompositor {
        interpolation: InterpolationMethod::Nearest,
        ..OverlayCompositor::default()
    };
    let rgb = compositor.colorize_elevation(&elevation, 32, 32);

    // Lowest point maps to dark blue, highest to dark red.
    let has_blue = rgb.data().chunks_exact(3).any(|p| p == [0, 0, 128]);
    let has_red = rgb.data().chunks_exact(3).any(|p| p[0] >= 128 && p[1] == 0 && p[2] == 0);
    assert!(has_blue);
    assert!(has_red);
}

#[test]
fn test_blend_weights_sum() {
    let gray = PixelBuffer::filled(8, 8, 1, 100u8);
    let jet = apply_jet(&gray);
    let optical = PixelBuffer::filled(8, 8, 3, 200u8);

    let blended = blend_weighted(&optical, 0.7, &jet, 0.3).unwrap();
    let expected_jet = jet.get(0, 0, 0).unwrap() as f64;
    assert_eq!(
        blended.get(0, 0, 0),
        Some((140.0 + 0.3 * expected_jet).round() as u8)
    );
}
