//! Band-interleaved pixel buffers.

use crate::error::{PatchError, Result};

/// A 2D pixel grid with one or more bands.
///
/// Samples are stored row-major, top-to-bottom, with bands interleaved
/// (`H x W x C` order), so the sample for `(col, row, band)` lives at
/// `(row * width + col) * bands + band`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer<T> {
    width: usize,
    height: usize,
    bands: usize,
    data: Vec<T>,
}

impl<T> PixelBuffer<T> {
    /// Wrap existing samples, checking that the length matches the shape.
    pub fn new(width: usize, height: usize, bands: usize, data: Vec<T>) -> Result<Self> {
        if bands == 0 {
            return Err(PatchError::shape_mismatch("buffer must have at least one band"));
        }
        let expected = width * height * bands;
        if data.len() != expected {
            return Err(PatchError::shape_mismatch(format!(
                "{} samples for a {}x{}x{} buffer (expected {})",
                data.len(),
                width,
                height,
                bands,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            bands,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// `(width, height)` of the spatial extent.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of pixels (not samples).
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Apply `f` to every sample, keeping the shape.
    pub fn map<U, F>(&self, f: F) -> PixelBuffer<U>
    where
        F: FnMut(&T) -> U,
    {
        PixelBuffer {
            width: self.width,
            height: self.height,
            bands: self.bands,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Copy> PixelBuffer<T> {
    /// Create a buffer with every sample set to `value`.
    pub fn filled(width: usize, height: usize, bands: usize, value: T) -> Self {
        Self {
            width,
            height,
            bands: bands.max(1),
            data: vec![value; width * height * bands.max(1)],
        }
    }

    /// Get the sample at a pixel coordinate.
    pub fn get(&self, col: usize, row: usize, band: usize) -> Option<T> {
        if col >= self.width || row >= self.height || band >= self.bands {
            return None;
        }
        self.data
            .get((row * self.width + col) * self.bands + band)
            .copied()
    }

    /// Set the sample at a pixel coordinate. Out-of-range coordinates are ignored.
    pub fn set(&mut self, col: usize, row: usize, band: usize, value: T) {
        if col < self.width && row < self.height && band < self.bands {
            self.data[(row * self.width + col) * self.bands + band] = value;
        }
    }

    /// Extract one band as a single-band buffer.
    pub fn band(&self, band: usize) -> Result<PixelBuffer<T>> {
        if band >= self.bands {
            return Err(PatchError::shape_mismatch(format!(
                "band {} requested from a {}-band buffer",
                band, self.bands
            )));
        }
        let data = self
            .data
            .iter()
            .skip(band)
            .step_by(self.bands)
            .copied()
            .collect();
        Ok(PixelBuffer {
            width: self.width,
            height: self.height,
            bands: 1,
            data,
        })
    }

    /// The first band as a single-band buffer. Every buffer has at least one band.
    pub fn first_band(&self) -> PixelBuffer<T> {
        PixelBuffer {
            width: self.width,
            height: self.height,
            bands: 1,
            data: self.data.iter().step_by(self.bands).copied().collect(),
        }
    }

    /// Interleave single-band buffers of equal dimensions into one buffer.
    pub fn stack(layers: &[PixelBuffer<T>]) -> Result<PixelBuffer<T>> {
        let first = layers
            .first()
            .ok_or_else(|| PatchError::shape_mismatch("cannot stack zero layers"))?;
        let (width, height) = first.dimensions();

        for layer in layers {
            if layer.dimensions() != (width, height) || layer.bands != 1 {
                return Err(PatchError::shape_mismatch(format!(
                    "cannot stack {}x{}x{} layer onto {}x{} stack",
                    layer.width, layer.height, layer.bands, width, height
                )));
            }
        }

        let mut data = Vec::with_capacity(width * height * layers.len());
        for i in 0..width * height {
            for layer in layers {
                data.push(layer.data[i]);
            }
        }

        Ok(PixelBuffer {
            width,
            height,
            bands: layers.len(),
            data,
        })
    }

    /// Replicate a single-band buffer `bands` times. Multi-band input is returned as is.
    pub fn replicate(&self, bands: usize) -> PixelBuffer<T> {
        if self.bands != 1 {
            return self.clone();
        }
        let mut data = Vec::with_capacity(self.data.len() * bands);
        for &v in &self.data {
            for _ in 0..bands {
                data.push(v);
            }
        }
        PixelBuffer {
            width: self.width,
            height: self.height,
            bands,
            data,
        }
    }
}

impl<T: PartialEq> PixelBuffer<T> {
    /// True when every sample equals `value`.
    pub fn all_equal(&self, value: &T) -> bool {
        self.data.iter().all(|v| v == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_length() {
        assert!(PixelBuffer::new(2, 2, 1, vec![0u8; 3]).is_err());
        assert!(PixelBuffer::new(2, 2, 0, Vec::<u8>::new()).is_err());
        assert!(PixelBuffer::new(2, 2, 3, vec![0u8; 12]).is_ok());
    }

    #[test]
    fn test_get_interleaved() {
        // 2x1 RGB: pixel 0 = (1,2,3), pixel 1 = (4,5,6)
        let buf = PixelBuffer::new(2, 1, 3, vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(buf.get(0, 0, 2), Some(3));
        assert_eq!(buf.get(1, 0, 0), Some(4));
        assert_eq!(buf.get(2, 0, 0), None);
        assert_eq!(buf.get(0, 0, 3), None);
    }

    #[test]
    fn test_band_and_stack() {
        let buf = PixelBuffer::new(2, 1, 3, vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        let g = buf.band(1).unwrap();
        assert_eq!(g.data(), &[2, 5]);

        let layers = vec![buf.band(0).unwrap(), g, buf.band(2).unwrap()];
        let restacked = PixelBuffer::stack(&layers).unwrap();
        assert_eq!(restacked, buf);
    }

    #[test]
    fn test_stack_rejects_mismatched_layers() {
        let a = PixelBuffer::filled(2, 2, 1, 0u8);
        let b = PixelBuffer::filled(3, 2, 1, 0u8);
        assert!(PixelBuffer::stack(&[a, b]).is_err());
        assert!(PixelBuffer::<u8>::stack(&[]).is_err());
    }

    #[test]
    fn test_replicate() {
        let gray = PixelBuffer::new(2, 1, 1, vec![7u8, 9]).unwrap();
        let rgb = gray.replicate(3);
        assert_eq!(rgb.bands(), 3);
        assert_eq!(rgb.data(), &[7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn test_all_equal() {
        assert!(PixelBuffer::filled(4, 4, 1, 0.0f32).all_equal(&0.0));
        let mut buf = PixelBuffer::filled(4, 4, 1, 0.0f32);
        buf.set(3, 3, 0, 1.0);
        assert!(!buf.all_equal(&0.0));
    }
}
