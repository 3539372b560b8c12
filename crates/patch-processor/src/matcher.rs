//! Cross-modality matching and sample assembly.
//!
//! Optical patches are the source of truth. For every optical key the
//! elevation and hillshade patches with the same key are looked up; when
//! all three exist they are decoded as grayscale, brought to the optical
//! dimensions, scaled to [0, 1] and stacked into an `H x W x 3` sample
//! (optical, elevation, hillshade).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use patch_common::{Modality, PatchKey, PixelBuffer, Result};
use patch_render::{resize_u8, InterpolationMethod};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec;
use crate::npy;
use crate::store::PatchStore;

/// Which modalities have a patch for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    pub optical: bool,
    pub elevation: bool,
    pub hillshade: bool,
}

impl Availability {
    pub fn has(&self, modality: Modality) -> bool {
        match modality {
            Modality::Optical => self.optical,
            Modality::Elevation => self.elevation,
            Modality::Hillshade => self.hillshade,
        }
    }

    fn mark(&mut self, modality: Modality) {
        match modality {
            Modality::Optical => self.optical = true,
            Modality::Elevation => self.elevation = true,
            Modality::Hillshade => self.hillshade = true,
        }
    }

    /// True when all three modalities are present.
    pub fn is_complete(&self) -> bool {
        self.optical && self.elevation && self.hillshade
    }
}

/// `PatchKey -> Availability` over every key any modality holds.
#[derive(Debug, Clone, Default)]
pub struct ModalityIndex {
    entries: BTreeMap<PatchKey, Availability>,
}

impl ModalityIndex {
    /// List each modality of `store` once and record what is available.
    pub fn build<S: PatchStore + ?Sized>(store: &S) -> Result<Self> {
        let mut entries: BTreeMap<PatchKey, Availability> = BTreeMap::new();
        for modality in Modality::ALL {
            for key in store.keys(modality)? {
                entries.entry(key).or_default().mark(modality);
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &PatchKey) -> Option<Availability> {
        self.entries.get(key).copied()
    }

    /// Keys with an optical patch, sorted.
    pub fn optical_keys(&self) -> impl Iterator<Item = (&PatchKey, &Availability)> {
        self.entries.iter().filter(|(_, a)| a.optical)
    }

    /// Keys present in all three modalities, sorted.
    pub fn complete_keys(&self) -> Vec<PatchKey> {
        self.entries
            .iter()
            .filter(|(_, a)| a.is_complete())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Destination for assembled samples.
pub trait SampleSink {
    fn write(&mut self, key: &PatchKey, sample: &PixelBuffer<f32>) -> Result<()>;
}

impl SampleSink for Vec<(PatchKey, PixelBuffer<f32>)> {
    fn write(&mut self, key: &PatchKey, sample: &PixelBuffer<f32>) -> Result<()> {
        self.push((key.clone(), sample.clone()));
        Ok(())
    }
}

/// Writes `npy/{key}.npy` and `jpg/{key}.jpg` under a dataset root.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    npy_dir: PathBuf,
    jpg_dir: PathBuf,
}

impl DatasetWriter {
    /// Create the `npy/` and `jpg/` directories under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let npy_dir = root.join("npy");
        let jpg_dir = root.join("jpg");
        std::fs::create_dir_all(&npy_dir)?;
        std::fs::create_dir_all(&jpg_dir)?;
        Ok(Self { npy_dir, jpg_dir })
    }

    pub fn npy_dir(&self) -> &Path {
        &self.npy_dir
    }

    pub fn jpg_dir(&self) -> &Path {
        &self.jpg_dir
    }
}

impl SampleSink for DatasetWriter {
    fn write(&mut self, key: &PatchKey, sample: &PixelBuffer<f32>) -> Result<()> {
        npy::write_npy(&self.npy_dir.join(key.file_name("npy")), sample)?;
        codec::save_patch(&self.jpg_dir.join(key.file_name("jpg")), &visualize(sample))
    }
}

/// 8-bit rendering of a [0, 1] sample, one channel per modality.
pub fn visualize(sample: &PixelBuffer<f32>) -> PixelBuffer<u8> {
    sample.map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
}

/// Counts for one assembly run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// Optical patches considered.
    pub optical: usize,
    /// Samples written.
    pub matched: usize,
    /// Optical keys without an elevation patch.
    pub missing_elevation: usize,
    /// Optical keys without a hillshade patch.
    pub missing_hillshade: usize,
    /// Complete keys whose patches could not be decoded.
    pub failed: usize,
}

impl AssemblyReport {
    /// Optical keys that did not become samples.
    pub fn skipped(&self) -> usize {
        self.optical - self.matched
    }

    /// Fraction of optical keys that became samples.
    pub fn match_rate(&self) -> f64 {
        if self.optical == 0 {
            0.0
        } else {
            self.matched as f64 / self.optical as f64
        }
    }
}

/// Joins patches across modalities into samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleAssembler {
    /// Resampling used to match elevation and hillshade to the optical size.
    pub interpolation: InterpolationMethod,
}

impl SampleAssembler {
    pub fn new(interpolation: InterpolationMethod) -> Self {
        Self { interpolation }
    }

    /// Build the sample for one key. All three patches must exist.
    pub fn assemble<S: PatchStore + ?Sized>(
        &self,
        store: &S,
        key: &PatchKey,
    ) -> Result<PixelBuffer<f32>> {
        let optical = store.load_gray(Modality::Optical, key)?;
        let (width, height) = optical.dimensions();

        let mut layers = Vec::with_capacity(Modality::ALL.len());
        for modality in Modality::ALL {
            let patch = if modality == Modality::Optical {
                optical.clone()
            } else {
                resize_u8(
                    &store.load_gray(modality, key)?,
                    width,
                    height,
                    self.interpolation,
                )
            };
            layers.push(patch.map(|&v| v as f32 / 255.0));
        }
        PixelBuffer::stack(&layers)
    }

    /// Assemble every complete optical key into `sink`.
    ///
    /// Missing counterparts and undecodable patches are skipped and counted.
    /// Sink errors abort the run.
    pub fn run<S, K>(&self, store: &S, sink: &mut K) -> Result<AssemblyReport>
    where
        S: PatchStore + ?Sized,
        K: SampleSink + ?Sized,
    {
        let index = ModalityIndex::build(store)?;
        let mut report = AssemblyReport::default();

        for (key, availability) in index.optical_keys() {
            report.optical += 1;

            if !availability.is_complete() {
                if !availability.elevation {
                    report.missing_elevation += 1;
                }
                if !availability.hillshade {
                    report.missing_hillshade += 1;
                }
                debug!(
                    key = %key,
                    elevation = availability.elevation,
                    hillshade = availability.hillshade,
                    "Skipping unmatched patch"
                );
                continue;
            }

            let sample = match self.assemble(store, key) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to assemble sample");
                    report.failed += 1;
                    continue;
                }
            };
            sink.write(key, &sample)?;
            report.matched += 1;
        }

        info!(
            optical = report.optical,
            matched = report.matched,
            skipped = report.skipped(),
            match_rate = %format!("{:.1}%", report.match_rate() * 100.0),
            "Assembly complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store_with(keys: &[(Modality, &str, usize)]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for &(modality, source, index) in keys {
            store.insert(modality, PatchKey::new(source, index), PixelBuffer::filled(4, 4, 1, 255u8));
        }
        store
    }

    #[test]
    fn test_index_availability() {
        let store = store_with(&[
            (Modality::Optical, "a", 0),
            (Modality::Elevation, "a", 0),
            (Modality::Hillshade, "a", 0),
            (Modality::Optical, "a", 1),
            (Modality::Hillshade, "b", 0),
        ]);
        let index = ModalityIndex::build(&store).unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.get(&PatchKey::new("a", 0)).unwrap().is_complete());
        assert_eq!(
            index.get(&PatchKey::new("a", 1)),
            Some(Availability {
                optical: true,
                elevation: false,
                hillshade: false
            })
        );
        assert_eq!(index.complete_keys(), vec![PatchKey::new("a", 0)]);
        assert_eq!(index.optical_keys().count(), 2);
    }

    #[test]
    fn test_run_counts_skips() {
        let store = store_with(&[
            (Modality::Optical, "a", 0),
            (Modality::Elevation, "a", 0),
            (Modality::Hillshade, "a", 0),
            (Modality::Optical, "a", 1),
            (Modality::Elevation, "a", 1),
            (Modality::Optical, "a", 2),
            (Modality::Hillshade, "a", 2),
        ]);
        let mut samples = Vec::new();
        let report = SampleAssembler::default().run(&store, &mut samples).unwrap();

        assert_eq!(report.optical, 3);
        assert_eq!(report.matched, 1);
        assert_eq!(report.missing_hillshade, 1);
        assert_eq!(report.missing_elevation, 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].0, PatchKey::new("a", 0));
    }

    #[test]
    fn test_sample_resized_to_optical() {
        let mut store = MemoryStore::new();
        let key = PatchKey::new("img", 0);
        store.insert(Modality::Optical, key.clone(), PixelBuffer::filled(8, 6, 3, 255u8));
        store.insert(Modality::Elevation, key.clone(), PixelBuffer::filled(4, 3, 1, 0u8));
        store.insert(Modality::Hillshade, key.clone(), PixelBuffer::filled(16, 12, 1, 51u8));

        let sample = SampleAssembler::default().assemble(&store, &key).unwrap();
        assert_eq!(sample.dimensions(), (8, 6));
        assert_eq!(sample.bands(), 3);
        assert_eq!(sample.get(7, 5, 0), Some(1.0));
        assert_eq!(sample.get(7, 5, 1), Some(0.0));
        assert_eq!(sample.get(0, 0, 2), Some(51.0 / 255.0));
    }

    #[test]
    fn test_visualize_rounds() {
        let sample = PixelBuffer::new(1, 1, 3, vec![0.0f32, 0.5, 1.0]).unwrap();
        assert_eq!(visualize(&sample).data(), &[0, 128, 255]);
    }
}
