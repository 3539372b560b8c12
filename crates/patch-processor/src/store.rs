//! Where patches live: one directory (or in-memory map) per modality.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use patch_common::{Modality, PatchError, PatchKey, PixelBuffer, Result};
use tracing::debug;

use crate::codec;
use crate::listing::list_files;

/// Read access to patches by modality and key.
pub trait PatchStore {
    /// All keys present for `modality`, sorted.
    fn keys(&self, modality: Modality) -> Result<Vec<PatchKey>>;

    /// Decode one patch as 8-bit grayscale.
    fn load_gray(&self, modality: Modality, key: &PatchKey) -> Result<PixelBuffer<u8>>;
}

/// Patches stored as files, one directory per modality.
#[derive(Debug, Clone)]
pub struct DirStore {
    optical: PathBuf,
    elevation: PathBuf,
    hillshade: PathBuf,
}

impl DirStore {
    pub fn new(
        optical: impl Into<PathBuf>,
        elevation: impl Into<PathBuf>,
        hillshade: impl Into<PathBuf>,
    ) -> Self {
        Self {
            optical: optical.into(),
            elevation: elevation.into(),
            hillshade: hillshade.into(),
        }
    }

    pub fn dir(&self, modality: Modality) -> &Path {
        match modality {
            Modality::Optical => &self.optical,
            Modality::Elevation => &self.elevation,
            Modality::Hillshade => &self.hillshade,
        }
    }

    /// Path of a patch file, whether or not it exists.
    pub fn path_for(&self, modality: Modality, key: &PatchKey) -> PathBuf {
        self.dir(modality).join(key.file_name(modality.extension()))
    }
}

impl PatchStore for DirStore {
    /// Only files whose name is exactly what [`DirStore::path_for`] would
    /// produce are listed, so every listed key can be loaded back.
    fn keys(&self, modality: Modality) -> Result<Vec<PatchKey>> {
        let mut keys = Vec::new();
        for path in list_files(self.dir(modality), &[modality.extension()])? {
            match PatchKey::from_path(&path) {
                Ok(key) if path.file_name() == self.path_for(modality, &key).file_name() => {
                    keys.push(key)
                }
                _ => debug!(path = %path.display(), "Ignoring file without a patch key"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn load_gray(&self, modality: Modality, key: &PatchKey) -> Result<PixelBuffer<u8>> {
        codec::load_gray(&self.path_for(modality, key))
    }
}

/// Patches held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    patches: BTreeMap<(Modality, PatchKey), PixelBuffer<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, modality: Modality, key: PatchKey, patch: PixelBuffer<u8>) {
        self.patches.insert((modality, key), patch);
    }
}

impl PatchStore for MemoryStore {
    fn keys(&self, modality: Modality) -> Result<Vec<PatchKey>> {
        Ok(self
            .patches
            .keys()
            .filter(|(m, _)| *m == modality)
            .map(|(_, key)| key.clone())
            .collect())
    }

    fn load_gray(&self, modality: Modality, key: &PatchKey) -> Result<PixelBuffer<u8>> {
        let patch = self
            .patches
            .get(&(modality, key.clone()))
            .ok_or_else(|| PatchError::read_failed(format!("no {} patch {}", modality, key)))?;
        Ok(patch.first_band())
    }
}
