//! Patch image files: 8-bit grayscale or RGB, JPEG or PNG by extension.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use patch_common::{PatchError, PixelBuffer, Result};

use crate::listing::{has_extension, JPEG_EXTENSIONS, PNG_EXTENSIONS};

/// JPEG quality for written patches.
pub const JPEG_QUALITY: u8 = 95;

/// Write a 1-band (grayscale) or 3-band (RGB) patch.
///
/// The encoder follows the extension of `path`: `.jpg`/`.jpeg` or `.png`.
pub fn save_patch(path: &Path, patch: &PixelBuffer<u8>) -> Result<()> {
    let color = match patch.bands() {
        1 => ColorType::L8,
        3 => ColorType::Rgb8,
        n => {
            return Err(PatchError::shape_mismatch(format!(
                "cannot encode a {}-band patch",
                n
            )))
        }
    };
    let (width, height) = (patch.width() as u32, patch.height() as u32);

    if has_extension(path, JPEG_EXTENSIONS) {
        let mut writer = BufWriter::new(File::create(path)?);
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode(
            patch.data(),
            width,
            height,
            color,
        )?;
        writer.flush()?;
    } else if has_extension(path, PNG_EXTENSIONS) {
        let mut writer = BufWriter::new(File::create(path)?);
        PngEncoder::new(&mut writer).write_image(patch.data(), width, height, color)?;
        writer.flush()?;
    } else {
        return Err(PatchError::ImageError(format!(
            "unsupported patch extension: {}",
            path.display()
        )));
    }
    Ok(())
}

/// BT.601 luma of one RGB pixel, in 16-bit fixed point with rounding.
#[inline]
pub fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// Decode a patch file as 8-bit grayscale.
///
/// Color input is reduced with BT.601 weights (0.299, 0.587, 0.114).
pub fn load_gray(path: &Path) -> Result<PixelBuffer<u8>> {
    let rgb = image::open(path)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    let gray = rgb
        .pixels()
        .map(|p| luma_601(p[0], p[1], p[2]))
        .collect();
    PixelBuffer::new(width as usize, height as usize, 1, gray)
}
