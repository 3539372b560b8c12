//! Pixel algorithms for turning raw raster windows into display-ready patches.
//!
//! - Percentile contrast stretch and min-max normalization
//! - CLAHE (contrast limited adaptive histogram equalization)
//! - Hillshade synthesis from elevation
//! - Jet color ramp for elevation overlays
//! - Bilinear / nearest resampling
//! - Weighted blending of optical and colorized elevation patches

pub mod clahe;
pub mod colormap;
pub mod contrast;
pub mod hillshade;
pub mod overlay;
pub mod resample;

pub use clahe::{equalize, ClaheParams};
pub use colormap::{apply_jet, jet_color, Color};
pub use contrast::{
    min_max_normalize, percentile, percentile_stretch, quantize, to_rgb, ContrastNormalizer,
};
pub use hillshade::{HillshadeParams, LightSource};
pub use overlay::{blend_weighted, OverlayCompositor};
pub use resample::{resize, resize_u8, InterpolationMethod};
