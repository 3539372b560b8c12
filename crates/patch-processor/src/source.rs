//! Raster sources: anything that can hand out pixel windows.
//!
//! GeoTIFF inputs are read with the `tiff` crate one strip or tile at a
//! time: a window read decodes only the chunks it overlaps, so a damaged
//! chunk fails just the windows that touch it. Georeferencing tags are
//! ignored.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use patch_common::{PatchError, PixelBuffer, Result, Window};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

/// An immutable 2D pixel grid with one or more bands.
///
/// The nodata convention is zero: a window whose samples are all zero
/// carries no information.
pub trait RasterSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn bands(&self) -> usize;

    /// Read the samples of `window`, band-interleaved.
    fn read_window(&self, window: &Window) -> Result<PixelBuffer<f32>>;
}

fn check_bounds(window: &Window, width: usize, height: usize) -> Result<()> {
    if window.is_degenerate() || !window.fits_within(width, height) {
        return Err(PatchError::OutOfBounds {
            requested: window.to_string(),
            width,
            height,
        });
    }
    Ok(())
}

/// Copy a window out of a decoded buffer.
fn copy_window(buffer: &PixelBuffer<f32>, window: &Window) -> Result<PixelBuffer<f32>> {
    let (width, height) = buffer.dimensions();
    check_bounds(window, width, height)?;

    let bands = buffer.bands();
    let row_len = window.width * bands;
    let mut data = Vec::with_capacity(window.area() * bands);
    for row in window.top..window.bottom() {
        let start = (row * width + window.left) * bands;
        data.extend_from_slice(&buffer.data()[start..start + row_len]);
    }
    PixelBuffer::new(window.width, window.height, bands, data)
}

type TiffDecoder = Decoder<BufReader<File>>;

/// A TIFF/GeoTIFF raster read chunk by chunk.
///
/// Decoded chunks are kept until a window starting below them is read,
/// so a row-major tiling pass decodes every chunk once.
pub struct TiffRaster {
    path: PathBuf,
    width: usize,
    height: usize,
    bands: usize,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    decoder: RefCell<TiffDecoder>,
    chunks: RefCell<HashMap<u32, Vec<f32>>>,
}

impl std::fmt::Debug for TiffRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiffRaster")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bands", &self.bands)
            .field("chunk", &(self.chunk_width, self.chunk_height))
            .finish_non_exhaustive()
    }
}

impl TiffRaster {
    /// Open a TIFF file and read its layout. No pixel data is decoded.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PatchError::open_failed(path, e.to_string()))?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| PatchError::open_failed(path, e.to_string()))?;

        let (width, height) = decoder.dimensions()?;
        let bands = match decoder.colortype()? {
            ColorType::Gray(_) => 1,
            ColorType::GrayA(_) => 2,
            ColorType::RGB(_) | ColorType::YCbCr(_) => 3,
            ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
            other => {
                return Err(PatchError::UnsupportedFormat(format!(
                    "{}: color type {:?}",
                    path.display(),
                    other
                )))
            }
        };
        if decoder.find_tag_unsigned::<u16>(Tag::PlanarConfiguration)? == Some(2) {
            return Err(PatchError::UnsupportedFormat(format!(
                "{}: planar sample layout",
                path.display()
            )));
        }

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let (chunk_width, chunk_height) = (chunk_width as usize, chunk_height as usize);
        if chunk_width == 0 || chunk_height == 0 {
            return Err(PatchError::UnsupportedFormat(format!(
                "{}: empty strip or tile size",
                path.display()
            )));
        }

        debug!(
            path = %path.display(),
            width,
            height,
            bands,
            chunk_width,
            chunk_height,
            chunk_type = ?decoder.get_chunk_type(),
            "Opened raster"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width: width as usize,
            height: height as usize,
            bands,
            chunk_width,
            chunk_height,
            chunks_across: (width as usize).div_ceil(chunk_width),
            decoder: RefCell::new(decoder),
            chunks: RefCell::new(HashMap::new()),
        })
    }

    /// Width of the decoded data in chunk column `col` (edge chunks are narrower).
    fn chunk_data_width(&self, col: usize) -> usize {
        self.chunk_width.min(self.width - col * self.chunk_width)
    }

    fn chunk_data_height(&self, row: usize) -> usize {
        self.chunk_height.min(self.height - row * self.chunk_height)
    }

    fn decode_chunk(&self, decoder: &mut TiffDecoder, row: usize, col: usize) -> Result<Vec<f32>> {
        let index = (row * self.chunks_across + col) as u32;
        let samples = decoder
            .read_chunk(index)
            .map_err(|e| {
                PatchError::read_failed(format!("{} chunk {}: {}", self.path.display(), index, e))
            })
            .and_then(|result| {
                samples_to_f32(result).ok_or_else(|| {
                    PatchError::UnsupportedFormat(format!("{}: sample type", self.path.display()))
                })
            })?;

        let expected = self.chunk_data_width(col) * self.chunk_data_height(row) * self.bands;
        if samples.len() != expected {
            return Err(PatchError::read_failed(format!(
                "{} chunk {}: {} samples, expected {}",
                self.path.display(),
                index,
                samples.len(),
                expected
            )));
        }
        Ok(samples)
    }
}

fn samples_to_f32(result: DecodingResult) -> Option<Vec<f32>> {
    let samples = match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(samples)
}

impl RasterSource for TiffRaster {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn bands(&self) -> usize {
        self.bands
    }

    fn read_window(&self, window: &Window) -> Result<PixelBuffer<f32>> {
        check_bounds(window, self.width, self.height)?;

        let bands = self.bands;
        let (cw, ch) = (self.chunk_width, self.chunk_height);
        let mut decoder = self.decoder.borrow_mut();
        let mut chunks = self.chunks.borrow_mut();

        // Chunk rows entirely above this window are no longer needed.
        let across = self.chunks_across;
        chunks.retain(|&index, _| (index as usize / across + 1) * ch > window.top);

        let mut data = vec![0.0f32; window.area() * bands];
        for chunk_row in window.top / ch..=(window.bottom() - 1) / ch {
            for chunk_col in window.left / cw..=(window.right() - 1) / cw {
                let index = (chunk_row * across + chunk_col) as u32;
                if !chunks.contains_key(&index) {
                    let samples = self.decode_chunk(&mut decoder, chunk_row, chunk_col)?;
                    chunks.insert(index, samples);
                }
                let Some(samples) = chunks.get(&index) else {
                    continue;
                };

                let stride = self.chunk_data_width(chunk_col);
                let (x0, y0) = (chunk_col * cw, chunk_row * ch);
                let left = window.left.max(x0);
                let right = window.right().min(x0 + cw);
                let len = (right - left) * bands;
                for row in window.top.max(y0)..window.bottom().min(y0 + ch) {
                    let src = ((row - y0) * stride + (left - x0)) * bands;
                    let dst = ((row - window.top) * window.width + (left - window.left)) * bands;
                    data[dst..dst + len].copy_from_slice(&samples[src..src + len]);
                }
            }
        }

        PixelBuffer::new(window.width, window.height, bands, data)
    }
}

/// An in-memory raster, with optional injected read failures.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    pixels: PixelBuffer<f32>,
    failing: HashSet<Window>,
}

impl MemoryRaster {
    pub fn new(pixels: PixelBuffer<f32>) -> Self {
        Self {
            pixels,
            failing: HashSet::new(),
        }
    }

    /// Make reads of exactly `window` fail.
    pub fn fail_on(mut self, window: Window) -> Self {
        self.failing.insert(window);
        self
    }
}

impl RasterSource for MemoryRaster {
    fn width(&self) -> usize {
        self.pixels.width()
    }

    fn height(&self) -> usize {
        self.pixels.height()
    }

    fn bands(&self) -> usize {
        self.pixels.bands()
    }

    fn read_window(&self, window: &Window) -> Result<PixelBuffer<f32>> {
        if self.failing.contains(window) {
            return Err(PatchError::read_failed(format!("injected failure at {}", window)));
        }
        copy_window(&self.pixels, window)
    }
}

/// Two co-registered rasters read as one over their common extent.
///
/// A window read returns the primary's bands followed by the first band of
/// the secondary, so one tiling pass drives both.
pub struct RasterPair<'a> {
    primary: &'a dyn RasterSource,
    secondary: &'a dyn RasterSource,
}

impl<'a> RasterPair<'a> {
    pub fn new(primary: &'a dyn RasterSource, secondary: &'a dyn RasterSource) -> Self {
        Self { primary, secondary }
    }

    /// Split a paired read back into `(primary, secondary)`.
    pub fn split(&self, pixels: &PixelBuffer<f32>) -> Result<(PixelBuffer<f32>, PixelBuffer<f32>)> {
        let primary_bands = self.primary.bands();
        let layers = (0..primary_bands)
            .map(|b| pixels.band(b))
            .collect::<Result<Vec<_>>>()?;
        let primary = PixelBuffer::stack(&layers)?;
        let secondary = pixels.band(primary_bands)?;
        Ok((primary, secondary))
    }
}

impl RasterSource for RasterPair<'_> {
    fn width(&self) -> usize {
        self.primary.width().min(self.secondary.width())
    }

    fn height(&self) -> usize {
        self.primary.height().min(self.secondary.height())
    }

    fn bands(&self) -> usize {
        self.primary.bands() + 1
    }

    fn read_window(&self, window: &Window) -> Result<PixelBuffer<f32>> {
        let primary = self.primary.read_window(window)?;
        let secondary = self.secondary.read_window(window)?.first_band();

        let mut layers = Vec::with_capacity(primary.bands() + 1);
        for band in 0..primary.bands() {
            layers.push(primary.band(band)?);
        }
        layers.push(secondary);
        PixelBuffer::stack(&layers)
    }
}
