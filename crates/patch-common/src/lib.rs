//! Common types for the raster-to-patch pipeline.
//!
//! Every stage of the pipeline speaks in terms of the same few values:
//!
//! - [`PixelBuffer`]: a band-interleaved pixel grid (raw `f32` samples or
//!   display-ready `u8` samples)
//! - [`Window`]: the rectangle a patch was extracted from
//! - [`PatchKey`]: the `(source_key, index)` pair that names a patch file and
//!   joins patches across modalities
//! - [`Modality`]: optical, elevation or derived hillshade

pub mod buffer;
pub mod error;
pub mod key;
pub mod window;

pub use buffer::PixelBuffer;
pub use error::{PatchError, Result};
pub use key::{Modality, PatchKey};
pub use window::Window;
