//! Directory-level pipeline stages.
//!
//! Each stage reads one or more input directories, writes patch files named
//! `{source_key}_{index}.{ext}`, and returns a report. Inputs are visited in
//! sorted order so reruns on unchanged input rewrite identical files.

use std::path::{Path, PathBuf};

use patch_common::Result;
use patch_render::hillshade;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codec;
use crate::config::PipelineConfig;
use crate::listing::{file_stem, list_files, JPEG_EXTENSIONS, RASTER_EXTENSIONS};
use crate::matcher::{AssemblyReport, DatasetWriter, SampleAssembler};
use crate::quality::{FilterReport, QualityFilter};
use crate::sampler::{PopulationSampler, SampleReport};
use crate::source::{RasterPair, RasterSource, TiffRaster};
use crate::store::DirStore;
use crate::tiler::{GridTiler, TileReport};

/// Totals for a stage that tiles every raster in a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryReport {
    /// Rasters found in the input directory.
    pub sources: usize,
    /// Rasters that could not be opened.
    pub failed_sources: usize,
    /// One report per raster that was tiled.
    pub passes: Vec<TileReport>,
}

impl DirectoryReport {
    pub fn emitted(&self) -> usize {
        self.passes.iter().map(|p| p.emitted).sum()
    }

    pub fn read_failures(&self) -> usize {
        self.passes.iter().map(|p| p.read_failures).sum()
    }

    pub fn nodata_skipped(&self) -> usize {
        self.passes.iter().map(|p| p.nodata_skipped).sum()
    }
}

/// Totals for the overlay stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayReport {
    /// Optical/elevation raster pairs composited.
    pub pairs: usize,
    /// Optical rasters with no elevation raster of the same stem.
    pub missing_elevation: usize,
    /// Pairs where either raster could not be opened.
    pub failed_sources: usize,
    pub passes: Vec<TileReport>,
}

impl OverlayReport {
    pub fn emitted(&self) -> usize {
        self.passes.iter().map(|p| p.emitted).sum()
    }
}

/// Totals for the sunlight sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Elevation patches found.
    pub patches: usize,
    /// Patches that could not be decoded.
    pub unreadable: usize,
    /// Shaded variants written.
    pub written: usize,
    pub azimuths: Vec<f64>,
}

/// Runs pipeline stages with one validated configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    tiler: GridTiler,
}

impl Pipeline {
    /// Validate `config` and build the stage runner.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let tiler = GridTiler::from_config(&config.tiling)?;
        Ok(Self { config, tiler })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tiler(&self) -> &GridTiler {
        &self.tiler
    }

    // ------------------------------------------------------------------
    // Single-raster passes
    // ------------------------------------------------------------------

    /// Tile one raster through the contrast normalizer into `.jpg` patches.
    pub fn tile_raster<R: RasterSource + ?Sized>(
        &self,
        source: &R,
        source_key: &str,
        output: &Path,
    ) -> Result<TileReport> {
        let normalizer = self.config.normalizer();
        let mut pass = self
            .tiler
            .pass(source, source_key, self.config.tiling.index_scheme);

        for patch in pass.by_ref() {
            let normalized = normalizer.normalize(&patch.pixels);
            codec::save_patch(&output.join(patch.key.file_name("jpg")), &normalized)?;
        }
        Ok(pass.finish())
    }

    /// Tile one elevation raster into 8-bit hillshade `.png` patches.
    pub fn hillshade_raster<R: RasterSource + ?Sized>(
        &self,
        source: &R,
        source_key: &str,
        output: &Path,
    ) -> Result<TileReport> {
        let params = self.config.hillshade.params();
        let mut pass = self
            .tiler
            .pass(source, source_key, self.config.tiling.index_scheme);

        for patch in pass.by_ref() {
            let shaded = hillshade::to_u8(&hillshade::synthesize(&patch.pixels, &params));
            codec::save_patch(&output.join(patch.key.file_name("png")), &shaded)?;
        }
        Ok(pass.finish())
    }

    /// Composite one optical/elevation raster pair over their common extent.
    pub fn overlay_rasters(
        &self,
        optical: &dyn RasterSource,
        elevation: &dyn RasterSource,
        source_key: &str,
        output: &Path,
    ) -> Result<TileReport> {
        let compositor = self.config.compositor();
        let pair = RasterPair::new(optical, elevation);
        let mut pass = self
            .tiler
            .pass(&pair, source_key, self.config.tiling.index_scheme);

        for patch in pass.by_ref() {
            let (optical_pixels, elevation_pixels) = pair.split(&patch.pixels)?;
            let composite = compositor.composite(&optical_pixels, &elevation_pixels)?;
            codec::save_patch(&output.join(patch.key.file_name("jpg")), &composite)?;
        }
        Ok(pass.finish())
    }

    // ------------------------------------------------------------------
    // Directory stages
    // ------------------------------------------------------------------

    /// Tile every raster in `input` into normalized `.jpg` patches.
    pub fn tile_directory(&self, input: &Path, output: &Path) -> Result<DirectoryReport> {
        self.for_each_raster(input, output, "tile", |raster, key| {
            self.tile_raster(raster, key, output)
        })
    }

    /// Tile every elevation raster in `input` into hillshade `.png` patches.
    pub fn hillshade_directory(&self, input: &Path, output: &Path) -> Result<DirectoryReport> {
        self.for_each_raster(input, output, "hillshade", |raster, key| {
            self.hillshade_raster(raster, key, output)
        })
    }

    fn for_each_raster<F>(
        &self,
        input: &Path,
        output: &Path,
        stage: &str,
        mut run: F,
    ) -> Result<DirectoryReport>
    where
        F: FnMut(&TiffRaster, &str) -> Result<TileReport>,
    {
        let rasters = list_files(input, RASTER_EXTENSIONS)?;
        std::fs::create_dir_all(output)?;

        let mut report = DirectoryReport {
            sources: rasters.len(),
            ..DirectoryReport::default()
        };

        for path in &rasters {
            let key = file_stem(path)?;
            let raster = match TiffRaster::open(path) {
                Ok(raster) => raster,
                Err(e) => {
                    warn!(stage, path = %path.display(), error = %e, "Skipping unreadable raster");
                    report.failed_sources += 1;
                    continue;
                }
            };

            let pass = run(&raster, &key)?;
            info!(
                stage,
                source = %key,
                width = raster.width(),
                height = raster.height(),
                emitted = pass.emitted,
                read_failures = pass.read_failures,
                nodata_skipped = pass.nodata_skipped,
                "Tiled raster"
            );
            report.passes.push(pass);
        }

        info!(
            stage,
            sources = report.sources,
            failed_sources = report.failed_sources,
            emitted = report.emitted(),
            read_failures = report.read_failures(),
            nodata_skipped = report.nodata_skipped(),
            "Stage complete"
        );
        Ok(report)
    }

    /// Pair optical and elevation rasters by file stem and write composites.
    pub fn overlay_directory(
        &self,
        optical_dir: &Path,
        elevation_dir: &Path,
        output: &Path,
    ) -> Result<OverlayReport> {
        let optical_rasters = list_files(optical_dir, RASTER_EXTENSIONS)?;
        let elevation_rasters = list_files(elevation_dir, RASTER_EXTENSIONS)?;
        std::fs::create_dir_all(output)?;

        let mut report = OverlayReport::default();
        for optical_path in &optical_rasters {
            let key = file_stem(optical_path)?;
            let Some(elevation_path) = find_by_stem(&elevation_rasters, &key) else {
                warn!(source = %key, "No elevation raster with a matching name");
                report.missing_elevation += 1;
                continue;
            };

            let opened = TiffRaster::open(optical_path)
                .and_then(|optical| Ok((optical, TiffRaster::open(elevation_path)?)));
            let (optical, elevation) = match opened {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(source = %key, error = %e, "Skipping unreadable raster pair");
                    report.failed_sources += 1;
                    continue;
                }
            };

            let pass = self.overlay_rasters(&optical, &elevation, &key, output)?;
            info!(source = %key, emitted = pass.emitted, "Composited raster pair");
            report.pairs += 1;
            report.passes.push(pass);
        }

        info!(
            pairs = report.pairs,
            missing_elevation = report.missing_elevation,
            failed_sources = report.failed_sources,
            emitted = report.emitted(),
            "Overlay complete"
        );
        Ok(report)
    }

    /// Shade every elevation `.jpg` patch in `input` from each sweep azimuth,
    /// writing `az{az}/{stem}_az{az}.png` under `output`.
    ///
    /// Patches are scaled by 1/255 and shaded as is, without the per-patch
    /// min-max normalization used for dataset hillshades.
    pub fn sunlight_sweep(&self, input: &Path, output: &Path) -> Result<SweepReport> {
        let patches = list_files(input, JPEG_EXTENSIONS)?;
        let azimuths = self.config.hillshade.sweep_azimuths.clone();

        let dirs: Vec<PathBuf> = azimuths
            .iter()
            .map(|az| output.join(format!("az{}", az)))
            .collect();
        for dir in &dirs {
            std::fs::create_dir_all(dir)?;
        }

        let mut report = SweepReport {
            patches: patches.len(),
            azimuths: azimuths.clone(),
            ..SweepReport::default()
        };

        for path in &patches {
            let stem = file_stem(path)?;
            let elevation = match codec::load_gray(path) {
                Ok(patch) => patch.map(|&v| v as f32 / 255.0),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable patch");
                    report.unreadable += 1;
                    continue;
                }
            };

            for (azimuth, dir) in azimuths.iter().zip(&dirs) {
                let params = self.config.hillshade.params_at(*azimuth);
                let shaded = hillshade::to_u8(&hillshade::shade(&elevation, &params));
                codec::save_patch(&dir.join(format!("{}_az{}.png", stem, azimuth)), &shaded)?;
                report.written += 1;
            }
        }

        info!(
            patches = report.patches,
            unreadable = report.unreadable,
            written = report.written,
            "Sunlight sweep complete"
        );
        Ok(report)
    }

    /// Join optical, elevation and hillshade patches into `npy/` and `jpg/`
    /// samples under `output`.
    pub fn assemble_directory(
        &self,
        optical: &Path,
        elevation: &Path,
        hillshade: &Path,
        output: &Path,
    ) -> Result<AssemblyReport> {
        let store = DirStore::new(optical, elevation, hillshade);
        let mut writer = DatasetWriter::create(output)?;
        SampleAssembler::new(self.config.overlay.interpolation).run(&store, &mut writer)
    }

    /// Delete low-information patches in `dir`.
    pub fn clean_directory(&self, dir: &Path, dry_run: bool) -> Result<FilterReport> {
        QualityFilter::from_config(&self.config.quality)
            .with_dry_run(dry_run)
            .run(dir)
    }

    /// Copy a group-balanced subset of `input` to `output`.
    pub fn sample_directory(&self, input: &Path, output: &Path) -> Result<SampleReport> {
        PopulationSampler::from_config(&self.config.sampling).run(input, output)
    }
}

fn find_by_stem<'a>(paths: &'a [PathBuf], stem: &str) -> Option<&'a PathBuf> {
    paths
        .iter()
        .find(|p| p.file_stem().and_then(|s| s.to_str()) == Some(stem))
}
