//! Sorted, extension-filtered directory enumeration.

use std::path::{Path, PathBuf};

use patch_common::{PatchError, Result};

/// Raster inputs.
pub const RASTER_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Optical and elevation patches, and sampled populations.
pub const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Hillshade patches.
pub const PNG_EXTENSIONS: &[&str] = &["png"];

/// List the regular files directly inside `dir` whose extension matches one
/// of `extensions` (case-insensitive), sorted by file name.
///
/// A missing directory is an error; an empty one is not.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PatchError::MissingDirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| PatchError::StorageError(e.to_string()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// File stem as a string, or an `InvalidName` error.
pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| PatchError::InvalidName(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.tif", "a.TIFF", "c.jpg", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.tif")).unwrap();

        let files = list_files(dir.path(), RASTER_EXTENSIONS).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TIFF", "b.tif"]);
    }

    #[test]
    fn test_missing_directory() {
        let err = list_files(Path::new("/nonexistent/patches"), JPEG_EXTENSIONS).unwrap_err();
        assert!(matches!(err, PatchError::MissingDirectory(_)));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/x/img1_3.jpg")).unwrap(), "img1_3");
    }
}
