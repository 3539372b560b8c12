//! Common test fixtures for geo-patches tests.
//!
//! Writers for small GeoTIFF inputs and pre-populated patch directories, so
//! integration tests can run every pipeline stage on disk without real scenes.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use patch_common::{Modality, PatchKey, PixelBuffer};
use tiff::encoder::{colortype, TiffEncoder};

/// Write a float32 raster as an uncompressed TIFF.
///
/// Supports 1 (gray), 3 (RGB) and 4 (RGBA) band buffers.
pub fn write_tiff_f32(path: &Path, raster: &PixelBuffer<f32>) {
    let file = BufWriter::new(File::create(path).expect("Failed to create TIFF fixture"));
    let mut encoder = TiffEncoder::new(file).expect("Failed to start TIFF encoder");
    let (width, height) = (raster.width() as u32, raster.height() as u32);
    let result = match raster.bands() {
        1 => encoder.write_image::<colortype::Gray32Float>(width, height, raster.data()),
        3 => encoder.write_image::<colortype::RGB32Float>(width, height, raster.data()),
        4 => encoder.write_image::<colortype::RGBA32Float>(width, height, raster.data()),
        n => panic!("write_tiff_f32 does not support {} bands", n),
    };
    result.expect("Failed to write TIFF fixture");
}

/// Write a 16-bit single-band raster as an uncompressed TIFF.
pub fn write_tiff_u16(path: &Path, width: usize, height: usize, data: &[u16]) {
    let file = BufWriter::new(File::create(path).expect("Failed to create TIFF fixture"));
    let mut encoder = TiffEncoder::new(file).expect("Failed to start TIFF encoder");
    encoder
        .write_image::<colortype::Gray16>(width as u32, height as u32, data)
        .expect("Failed to write TIFF fixture");
}

/// Write a 16-bit single-band raster in strips of `rows_per_strip` rows.
pub fn write_tiff_u16_strips(
    path: &Path,
    width: usize,
    height: usize,
    data: &[u16],
    rows_per_strip: u32,
) {
    let file = BufWriter::new(File::create(path).expect("Failed to create TIFF fixture"));
    let mut encoder = TiffEncoder::new(file).expect("Failed to start TIFF encoder");
    let mut image = encoder
        .new_image::<colortype::Gray16>(width as u32, height as u32)
        .expect("Failed to start TIFF image");
    image
        .rows_per_strip(rows_per_strip)
        .expect("Failed to set rows per strip");
    image.write_data(data).expect("Failed to write TIFF fixture");
}

/// Point strip `strip` of a little-endian TIFF past the end of the file,
/// so decoding that strip fails while the rest of the image stays readable.
pub fn break_strip(path: &Path, strip: usize) {
    const STRIP_OFFSETS: u16 = 273;

    let mut bytes = fs::read(path).expect("Failed to read TIFF fixture");
    assert_eq!(&bytes[..2], b"II", "only little-endian TIFFs are supported");
    let u16_at = |b: &[u8], at: usize| u16::from_le_bytes([b[at], b[at + 1]]);
    let u32_at = |b: &[u8], at: usize| u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]]);

    let ifd = u32_at(&bytes, 4) as usize;
    let entries = u16_at(&bytes, ifd) as usize;
    let entry = (0..entries)
        .map(|i| ifd + 2 + i * 12)
        .find(|&at| u16_at(&bytes, at) == STRIP_OFFSETS)
        .expect("TIFF has no StripOffsets tag");

    let size = match u16_at(&bytes, entry + 2) {
        3 => 2,
        4 => 4,
        other => panic!("unexpected StripOffsets field type {}", other),
    };
    let count = u32_at(&bytes, entry + 4) as usize;
    assert!(strip < count, "strip {} out of {}", strip, count);
    let values = if count * size <= 4 {
        entry + 8
    } else {
        u32_at(&bytes, entry + 8) as usize
    };

    let at = values + strip * size;
    let past_end = bytes.len() + 4096;
    if size == 2 {
        let past_end = u16::try_from(past_end).expect("fixture too large for SHORT offsets");
        bytes[at..at + 2].copy_from_slice(&past_end.to_le_bytes());
    } else {
        bytes[at..at + 4].copy_from_slice(&(past_end as u32).to_le_bytes());
    }
    fs::write(path, bytes).expect("Failed to rewrite TIFF fixture");
}

/// Write an 8-bit patch as an image file; the format follows the extension.
///
/// Single-band buffers are written as grayscale, three-band buffers as RGB.
pub fn write_patch_image(path: &Path, patch: &PixelBuffer<u8>) {
    let (width, height) = (patch.width() as u32, patch.height() as u32);
    let data = patch.data().to_vec();
    let result = match patch.bands() {
        1 => image::GrayImage::from_raw(width, height, data).map(|img| img.save(path)),
        3 => image::RgbImage::from_raw(width, height, data).map(|img| img.save(path)),
        n => panic!("write_patch_image does not support {} bands", n),
    };
    result
        .expect("patch buffer does not match its dimensions")
        .expect("Failed to write patch image");
}

/// A temporary directory laid out as one sub-directory per modality.
///
/// ```ignore
/// let tree = PatchTree::new();
/// tree.add(Modality::Optical, &PatchKey::new("img1", 0), &patch);
/// ```
pub struct PatchTree {
    root: tempfile::TempDir,
}

impl PatchTree {
    /// Create the tree with empty `optical/`, `elevation/` and `hillshade/` directories.
    pub fn new() -> Self {
        let root = crate::temp_test_dir_with_prefix("patch_tree_");
        for modality in Modality::ALL {
            fs::create_dir_all(root.path().join(modality.to_string()))
                .expect("Failed to create modality directory");
        }
        Self { root }
    }

    /// Root of the tree.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Directory holding one modality's patches.
    pub fn dir(&self, modality: Modality) -> PathBuf {
        self.root.path().join(modality.to_string())
    }

    /// Write a patch under its modality directory with the modality's extension.
    pub fn add(&self, modality: Modality, key: &PatchKey, patch: &PixelBuffer<u8>) -> PathBuf {
        let path = self.dir(modality).join(key.file_name(modality.extension()));
        write_patch_image(&path, patch);
        path
    }

    /// Write the same constant gray patch for every key.
    pub fn add_constant(&self, modality: Modality, keys: &[PatchKey], size: usize, value: u8) {
        let patch = PixelBuffer::filled(size, size, 1, value);
        for key in keys {
            self.add(modality, key, &patch);
        }
    }
}

impl Default for PatchTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys `{source}_{0..count}`.
pub fn keys_for(source: &str, count: usize) -> Vec<PatchKey> {
    (0..count).map(|i| PatchKey::new(source, i)).collect()
}
