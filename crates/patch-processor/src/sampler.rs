//! Group-aware population subsampling.
//!
//! Files are grouped by the text before the first underscore of their name
//! (the source scene). Every group gets the same quota,
//! `floor(target / groups)`: small groups contribute everything, large
//! groups a uniform random subset. Selected files are copied, never moved.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use patch_common::{PatchError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SamplingConfig;
use crate::listing::{list_files, JPEG_EXTENSIONS};

/// Group of a file: its name up to the first underscore.
pub fn group_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('_') {
        Some((group, _)) => group.to_string(),
        None => name,
    }
}

/// Counts for one sampling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleReport {
    /// Files in the input population.
    pub population: usize,
    pub groups: usize,
    /// Files allowed per group.
    pub quota: usize,
    /// Files copied to the output.
    pub selected: usize,
}

/// Draws a reduced, group-balanced population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationSampler {
    pub target: usize,
    pub seed: Option<u64>,
}

impl PopulationSampler {
    pub fn new(target: usize, seed: Option<u64>) -> Self {
        Self { target, seed }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.target, config.seed)
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Choose files from `population`. Returns the selection sorted by path
    /// and the per-group quota.
    ///
    /// An empty population is an error.
    pub fn select(&self, population: &[PathBuf]) -> Result<(Vec<PathBuf>, usize)> {
        if population.is_empty() {
            return Err(PatchError::empty_population("no files to sample from"));
        }

        let mut groups: BTreeMap<String, Vec<&PathBuf>> = BTreeMap::new();
        for path in population {
            groups.entry(group_key(path)).or_default().push(path);
        }

        let quota = self.target / groups.len();
        if quota == 0 {
            warn!(
                target = self.target,
                groups = groups.len(),
                "Target is smaller than the number of groups; nothing will be selected"
            );
        }

        let mut rng = self.rng();
        let mut selected = Vec::new();
        for (group, files) in &groups {
            let picked: Vec<&PathBuf> = if files.len() <= quota {
                files.clone()
            } else {
                files.choose_multiple(&mut rng, quota).copied().collect()
            };
            debug!(group = %group, available = files.len(), picked = picked.len(), "Sampled group");
            selected.extend(picked.into_iter().cloned());
        }
        selected.sort();
        Ok((selected, quota))
    }

    /// Sample the `.jpg` files of `input` and copy the selection to `output`.
    pub fn run(&self, input: &Path, output: &Path) -> Result<SampleReport> {
        let population = list_files(input, JPEG_EXTENSIONS)?;
        let groups = population
            .iter()
            .map(|p| group_key(p))
            .collect::<BTreeSet<_>>()
            .len();

        let (selected, quota) = self.select(&population)?;

        std::fs::create_dir_all(output)?;
        for path in &selected {
            if let Some(name) = path.file_name() {
                std::fs::copy(path, output.join(name))?;
            }
        }

        let report = SampleReport {
            population: population.len(),
            groups,
            quota,
            selected: selected.len(),
        };
        info!(
            population = report.population,
            groups = report.groups,
            quota = report.quota,
            selected = report.selected,
            "Sampling complete"
        );
        Ok(report)
    }
}
