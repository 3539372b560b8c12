//! Shared test utilities for the geo-patches workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster generators
//! - Fixture writers for GeoTIFF inputs and patch directories
//! - Float and shape assertion macros
//! - Scratch directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, create_elevation_grid, PatchTree};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that two 8-bit buffers have the same shape.
///
/// ```ignore
/// assert_same_shape!(hillshade, elevation);
/// ```
#[macro_export]
macro_rules! assert_same_shape {
    ($left:expr, $right:expr) => {{
        assert_eq!(
            ($left.width(), $left.height()),
            ($right.width(), $right.height()),
            "spatial dimensions differ"
        );
    }};
}
