//! `.npy` sample tensors.
//!
//! Samples are stored as little-endian `f32` arrays of shape `(H, W, C)`
//! in C order, written through `ndarray-npy`.

use std::path::Path;

use ndarray::Array3;
use patch_common::{PatchError, PixelBuffer, Result};

/// View a band-interleaved buffer as an `(H, W, C)` array.
pub fn to_array(tensor: &PixelBuffer<f32>) -> Result<Array3<f32>> {
    Array3::from_shape_vec(
        (tensor.height(), tensor.width(), tensor.bands()),
        tensor.data().to_vec(),
    )
    .map_err(|e| PatchError::shape_mismatch(e.to_string()))
}

/// Write a buffer as an `H x W x C` array.
pub fn write_npy(path: &Path, tensor: &PixelBuffer<f32>) -> Result<()> {
    let array = to_array(tensor)?;
    ndarray_npy::write_npy(path, &array)
        .map_err(|e| PatchError::StorageError(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_layout_is_hwc() {
        // Two pixels on one row, three channels each.
        let tensor = PixelBuffer::new(2, 1, 3, vec![0.0f32, 0.5, 1.0, 0.25, 0.75, 0.125]).unwrap();
        let array = to_array(&tensor).unwrap();
        assert_eq!(array.shape(), &[1, 2, 3]);
        assert_eq!(array[[0, 1, 0]], 0.25);
        assert_eq!(array[[0, 0, 2]], 1.0);
    }

    #[test]
    fn test_written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img1_0.npy");
        let tensor = PixelBuffer::new(3, 2, 3, (0..18).map(|v| v as f32 / 18.0).collect()).unwrap();

        write_npy(&path, &tensor).unwrap();
        let loaded: Array3<f32> = ndarray_npy::read_npy(&path).unwrap();
        assert_eq!(loaded, to_array(&tensor).unwrap());
    }

    #[test]
    fn test_unwritable_path_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("img1_0.npy");
        let err = write_npy(&path, &PixelBuffer::filled(1, 1, 3, 0.0f32)).unwrap_err();
        assert!(matches!(err, PatchError::StorageError(_)));
    }
}
