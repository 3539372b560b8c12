//! Patch naming: keys and modalities.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PatchError, Result};

/// Identifies one patch within a modality directory.
///
/// A key renders to the file stem `{source_key}_{index}`. The source key is
/// the stem of the raster the patch was cut from and may itself contain
/// underscores; the index is always the text after the last underscore.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatchKey {
    pub source_key: String,
    pub index: usize,
}

impl PatchKey {
    /// Create a new key.
    pub fn new(source_key: impl Into<String>, index: usize) -> Self {
        Self {
            source_key: source_key.into(),
            index,
        }
    }

    /// File stem, e.g. `img1_12`.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.source_key, self.index)
    }

    /// File name with the given extension, e.g. `img1_12.jpg`.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}_{}.{}", self.source_key, self.index, ext)
    }

    /// Parse a key from a file stem such as `img1_12`.
    ///
    /// The index must be written the way [`PatchKey::stem`] writes it, so
    /// `img1_07` and `img1_+7` are rejected.
    pub fn from_stem(stem: &str) -> Result<Self> {
        let (source, index) = stem
            .rsplit_once('_')
            .ok_or_else(|| PatchError::InvalidName(stem.to_string()))?;
        if source.is_empty() {
            return Err(PatchError::InvalidName(stem.to_string()));
        }
        let parsed = index
            .parse::<usize>()
            .map_err(|_| PatchError::InvalidName(stem.to_string()))?;
        if parsed.to_string() != index {
            return Err(PatchError::InvalidName(stem.to_string()));
        }
        Ok(Self::new(source, parsed))
    }

    /// Parse a key from a path, ignoring directory and extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PatchError::InvalidName(path.display().to_string()))?;
        Self::from_stem(stem)
    }
}

impl std::fmt::Display for PatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.source_key, self.index)
    }
}

/// The three raster modalities a sample is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Optical imagery (contrast-stretched, CLAHE-equalized JPEG patches).
    Optical,
    /// Digital elevation (contrast-stretched, CLAHE-equalized JPEG patches).
    Elevation,
    /// Shaded relief derived from elevation (PNG patches).
    Hillshade,
}

impl Modality {
    /// All modalities in sample channel order.
    pub const ALL: [Modality; 3] = [Modality::Optical, Modality::Elevation, Modality::Hillshade];

    /// File extension used for this modality's patch files.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Optical | Self::Elevation => "jpg",
            Self::Hillshade => "png",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optical => write!(f, "optical"),
            Self::Elevation => write!(f, "elevation"),
            Self::Hillshade => write!(f, "hillshade"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_and_file_name() {
        let key = PatchKey::new("img1", 45);
        assert_eq!(key.stem(), "img1_45");
        assert_eq!(key.file_name("jpg"), "img1_45.jpg");
        assert_eq!(key.to_string(), "img1_45");
    }

    #[test]
    fn test_from_stem_uses_last_underscore() {
        let key = PatchKey::from_stem("m_2020_ortho_7").unwrap();
        assert_eq!(key.source_key, "m_2020_ortho");
        assert_eq!(key.index, 7);
    }

    #[test]
    fn test_from_stem_rejects_bad_names() {
        assert!(PatchKey::from_stem("noindex").is_err());
        assert!(PatchKey::from_stem("img1_x").is_err());
        assert!(PatchKey::from_stem("_3").is_err());
    }

    #[test]
    fn test_from_stem_rejects_non_canonical_index() {
        assert!(PatchKey::from_stem("img_07").is_err());
        assert!(PatchKey::from_stem("img_+7").is_err());
        assert!(PatchKey::from_stem("img_00").is_err());
        assert_eq!(PatchKey::from_stem("img_0").unwrap(), PatchKey::new("img", 0));

        let key = PatchKey::from_stem("img_70").unwrap();
        assert_eq!(key.stem(), "img_70");
    }

    #[test]
    fn test_from_path() {
        let key = PatchKey::from_path(Path::new("/data/hill/img2_3.png")).unwrap();
        assert_eq!(key, PatchKey::new("img2", 3));
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            PatchKey::new("b", 0),
            PatchKey::new("a", 10),
            PatchKey::new("a", 2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                PatchKey::new("a", 2),
                PatchKey::new("a", 10),
                PatchKey::new("b", 0)
            ]
        );
    }

    #[test]
    fn test_modality_extensions() {
        assert_eq!(Modality::Optical.extension(), "jpg");
        assert_eq!(Modality::Elevation.extension(), "jpg");
        assert_eq!(Modality::Hillshade.extension(), "png");
    }
}
