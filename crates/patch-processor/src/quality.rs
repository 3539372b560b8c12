//! Informative-pixel quality filter.
//!
//! A patch is informative in proportion to the pixels brighter than a
//! threshold. Patches below the keep ratio are deleted in place.

use std::path::Path;

use patch_common::{PixelBuffer, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::QualityConfig;
use crate::listing::list_files;

/// Patch files the filter considers.
pub const PATCH_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Fraction of pixels in the first band strictly brighter than `threshold`.
pub fn informative_fraction(patch: &PixelBuffer<u8>, threshold: u8) -> f64 {
    if patch.pixel_count() == 0 {
        return 0.0;
    }
    let bright = patch
        .data()
        .iter()
        .step_by(patch.bands())
        .filter(|&&v| v > threshold)
        .count();
    bright as f64 / patch.pixel_count() as f64
}

/// Counts for one filter run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    /// Patch files examined.
    pub total: usize,
    /// Files deleted (or that would be, in a dry run).
    pub deleted: usize,
    /// Files that could not be decoded; left in place.
    pub unreadable: usize,
    pub dry_run: bool,
}

impl FilterReport {
    pub fn kept(&self) -> usize {
        self.total - self.deleted - self.unreadable
    }

    /// Deleted fraction of the files examined.
    pub fn deletion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.deleted as f64 / self.total as f64
        }
    }
}

/// Deletes low-information patches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityFilter {
    pub brightness_threshold: u8,
    pub keep_ratio: f64,
    /// Report without deleting.
    pub dry_run: bool,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}

impl QualityFilter {
    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            brightness_threshold: config.brightness_threshold,
            keep_ratio: config.keep_ratio,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// True when the patch has enough informative pixels.
    pub fn keeps(&self, patch: &PixelBuffer<u8>) -> bool {
        informative_fraction(patch, self.brightness_threshold) >= self.keep_ratio
    }

    /// Filter every patch file directly inside `dir`.
    pub fn run(&self, dir: &Path) -> Result<FilterReport> {
        let mut report = FilterReport {
            dry_run: self.dry_run,
            ..FilterReport::default()
        };

        for path in list_files(dir, PATCH_EXTENSIONS)? {
            report.total += 1;

            let patch = match codec::load_gray(&path) {
                Ok(patch) => patch,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable patch");
                    report.unreadable += 1;
                    continue;
                }
            };

            if self.keeps(&patch) {
                continue;
            }

            if !self.dry_run {
                std::fs::remove_file(&path)?;
            }
            debug!(path = %path.display(), dry_run = self.dry_run, "Removed low-information patch");
            report.deleted += 1;
        }

        info!(
            dir = %dir.display(),
            total = report.total,
            deleted = report.deleted,
            deletion_rate = %format!("{:.1}%", report.deletion_rate() * 100.0),
            dry_run = self.dry_run,
            "Quality filter complete"
        );
        Ok(report)
    }
}
