//! Raster-to-patch pipeline.
//!
//! Turns large optical and elevation rasters into a dataset of co-registered
//! multi-modal patches:
//!
//! ```text
//! GeoTIFF ──► GridTiler ──► ContrastNormalizer ──► {key}.jpg   (optical, elevation)
//!                      └──► hillshade ───────────► {key}.png   (hillshade)
//!
//! optical + elevation + hillshade patches ──► SampleAssembler ──► npy/{key}.npy, jpg/{key}.jpg
//!
//! patch directory ──► QualityFilter (delete in place)
//!                 └─► PopulationSampler (copy a balanced subset)
//! ```
//!
//! All stages take their constants from a [`PipelineConfig`]; [`Pipeline`]
//! runs them over directories.

pub mod codec;
pub mod config;
pub mod listing;
pub mod matcher;
pub mod npy;
pub mod pipeline;
pub mod quality;
pub mod sampler;
pub mod source;
pub mod store;
pub mod tiler;

pub use config::{
    ContrastConfig, HillshadeConfig, IndexScheme, OverlayConfig, PipelineConfig, QualityConfig,
    SamplingConfig, TilingConfig,
};
pub use matcher::{
    AssemblyReport, Availability, DatasetWriter, ModalityIndex, SampleAssembler, SampleSink,
};
pub use pipeline::{DirectoryReport, OverlayReport, Pipeline, SweepReport};
pub use quality::{FilterReport, QualityFilter};
pub use sampler::{PopulationSampler, SampleReport};
pub use source::{MemoryRaster, RasterPair, RasterSource, TiffRaster};
pub use store::{DirStore, MemoryStore, PatchStore};
pub use tiler::{GridTiler, GridWindow, PatchIndexer, TilePass, TilePatch, TileReport};
