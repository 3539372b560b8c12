//! Error types for the patch pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while producing or consuming patches.
#[derive(Error, Debug)]
pub enum PatchError {
    /// Failed to open a raster source.
    #[error("failed to open raster {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// Failed to read pixel data for a window.
    #[error("failed to read window: {0}")]
    ReadFailed(String),

    /// The requested window lies outside the raster extent.
    #[error("window {requested} is outside raster extent {width}x{height}")]
    OutOfBounds {
        requested: String,
        width: usize,
        height: usize,
    },

    /// Pixel buffer dimensions disagree with its data length or with another buffer.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The raster uses a sample format the pipeline cannot decode.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A required input directory does not exist.
    #[error("input directory not found: {0}")]
    MissingDirectory(PathBuf),

    /// The patch population is empty where at least one patch is required.
    #[error("empty population: {0}")]
    EmptyPopulation(String),

    /// A file name does not follow the `{source_key}_{index}` convention.
    #[error("invalid patch name: {0}")]
    InvalidName(String),

    /// Image encode/decode error.
    #[error("image codec error: {0}")]
    ImageError(String),

    /// Filesystem error.
    #[error("storage error: {0}")]
    StorageError(String),
}

impl PatchError {
    /// Create an OpenFailed error.
    pub fn open_failed(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create a ConfigError.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an EmptyPopulation error.
    pub fn empty_population(msg: impl Into<String>) -> Self {
        Self::EmptyPopulation(msg.into())
    }
}

impl From<std::io::Error> for PatchError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<image::ImageError> for PatchError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<tiff::TiffError> for PatchError {
    fn from(err: tiff::TiffError) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

/// Result type for patch pipeline operations.
pub type Result<T> = std::result::Result<T, PatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_storage() {
        let err: PatchError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PatchError::StorageError(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_out_of_bounds_message() {
        let err = PatchError::OutOfBounds {
            requested: "(10, 10, 4, 4)".to_string(),
            width: 8,
            height: 8,
        };
        assert_eq!(
            err.to_string(),
            "window (10, 10, 4, 4) is outside raster extent 8x8"
        );
    }
}
