//! Grid tiling of large rasters into fixed-size windows.
//!
//! Windows start at `0, P-O, 2(P-O), ...` along each axis while the start
//! lies inside the extent. Trailing windows are clipped to the extent,
//! never padded. Windows are visited row-major.

use patch_common::{PatchError, PatchKey, PixelBuffer, Result, Window};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{IndexScheme, TilingConfig};
use crate::source::RasterSource;

/// A window plus its position in the tiling grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub window: Window,
    pub row: usize,
    pub col: usize,
}

/// Partitions a pixel extent into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridTiler {
    patch_size: usize,
    overlap: usize,
}

impl GridTiler {
    /// Create a tiler. Fails when `patch_size` is zero or `overlap >= patch_size`.
    pub fn new(patch_size: usize, overlap: usize) -> Result<Self> {
        if patch_size == 0 {
            return Err(PatchError::invalid_config("patch_size must be > 0"));
        }
        if overlap >= patch_size {
            return Err(PatchError::invalid_config(format!(
                "overlap ({}) must be smaller than patch_size ({})",
                overlap, patch_size
            )));
        }
        Ok(Self {
            patch_size,
            overlap,
        })
    }

    pub fn from_config(config: &TilingConfig) -> Result<Self> {
        Self::new(config.patch_size, config.overlap)
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window origins.
    pub fn stride(&self) -> usize {
        self.patch_size - self.overlap
    }

    /// Number of window columns and rows covering a `width x height` extent.
    pub fn grid_shape(&self, width: usize, height: usize) -> (usize, usize) {
        let stride = self.stride();
        (width.div_ceil(stride), height.div_ceil(stride))
    }

    /// Lazily enumerate the windows of a `width x height` extent.
    ///
    /// Each call starts a fresh iteration.
    pub fn windows(&self, width: usize, height: usize) -> Windows {
        Windows {
            tiler: *self,
            width,
            height,
            row: 0,
            col: 0,
        }
    }

    /// Start a tiling pass over `source`, naming patches after `source_key`.
    pub fn pass<'a, R: RasterSource + ?Sized>(
        &self,
        source: &'a R,
        source_key: &str,
        scheme: IndexScheme,
    ) -> TilePass<'a, R> {
        let (cols, _) = self.grid_shape(source.width(), source.height());
        TilePass {
            source,
            source_key: source_key.to_string(),
            windows: self.windows(source.width(), source.height()),
            indexer: PatchIndexer::new(scheme, cols),
            report: TileReport::new(source_key),
        }
    }
}

/// Iterator over the windows of one extent.
#[derive(Debug, Clone)]
pub struct Windows {
    tiler: GridTiler,
    width: usize,
    height: usize,
    row: usize,
    col: usize,
}

impl Iterator for Windows {
    type Item = GridWindow;

    fn next(&mut self) -> Option<GridWindow> {
        let stride = self.tiler.stride();
        let size = self.tiler.patch_size;

        let top = self.row * stride;
        if top >= self.height || self.width == 0 {
            return None;
        }
        let left = self.col * stride;

        let item = GridWindow {
            window: Window::new(
                left,
                top,
                size.min(self.width - left),
                size.min(self.height - top),
            ),
            row: self.row,
            col: self.col,
        };

        if left + stride >= self.width {
            self.col = 0;
            self.row += 1;
        } else {
            self.col += 1;
        }
        Some(item)
    }
}

/// Mints patch indices for emitted windows.
#[derive(Debug, Clone)]
pub struct PatchIndexer {
    scheme: IndexScheme,
    cols_per_row: usize,
    next: usize,
}

impl PatchIndexer {
    pub fn new(scheme: IndexScheme, cols_per_row: usize) -> Self {
        Self {
            scheme,
            cols_per_row,
            next: 0,
        }
    }

    /// Index for an emitted window. Only call this for windows that produce
    /// a patch.
    pub fn assign(&mut self, window: &GridWindow) -> usize {
        match self.scheme {
            IndexScheme::Dense => {
                let index = self.next;
                self.next += 1;
                index
            }
            IndexScheme::Grid => window.row * self.cols_per_row + window.col,
        }
    }
}

/// A patch read from one window.
#[derive(Debug, Clone)]
pub struct TilePatch {
    pub key: PatchKey,
    pub window: Window,
    pub pixels: PixelBuffer<f32>,
}

/// Counts for one tiling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileReport {
    pub source_key: String,
    /// Windows visited.
    pub windows: usize,
    /// Patches emitted.
    pub emitted: usize,
    /// Windows skipped because the read failed.
    pub read_failures: usize,
    /// Windows skipped because every sample was nodata.
    pub nodata_skipped: usize,
}

impl TileReport {
    pub fn new(source_key: &str) -> Self {
        Self {
            source_key: source_key.to_string(),
            ..Self::default()
        }
    }
}

/// One pass over a raster, yielding patches lazily.
///
/// Failed reads and all-zero windows are skipped and counted; neither
/// consumes a dense index.
pub struct TilePass<'a, R: RasterSource + ?Sized> {
    source: &'a R,
    source_key: String,
    windows: Windows,
    indexer: PatchIndexer,
    report: TileReport,
}

impl<R: RasterSource + ?Sized> TilePass<'_, R> {
    /// Counts so far.
    pub fn report(&self) -> &TileReport {
        &self.report
    }

    /// Drain the remaining windows and return the final counts.
    pub fn finish(mut self) -> TileReport {
        for _ in self.by_ref() {}
        self.report
    }
}

impl<R: RasterSource + ?Sized> Iterator for TilePass<'_, R> {
    type Item = TilePatch;

    fn next(&mut self) -> Option<TilePatch> {
        loop {
            let grid_window = self.windows.next()?;
            self.report.windows += 1;

            let pixels = match self.source.read_window(&grid_window.window) {
                Ok(pixels) => pixels,
                Err(e) => {
                    warn!(
                        source = %self.source_key,
                        window = %grid_window.window,
                        error = %e,
                        "Skipping unreadable window"
                    );
                    self.report.read_failures += 1;
                    continue;
                }
            };

            if pixels.all_equal(&0.0) {
                self.report.nodata_skipped += 1;
                continue;
            }

            let index = self.indexer.assign(&grid_window);
            self.report.emitted += 1;
            return Some(TilePatch {
                key: PatchKey::new(self.source_key.clone(), index),
                window: grid_window.window,
                pixels,
            });
        }
    }
}
