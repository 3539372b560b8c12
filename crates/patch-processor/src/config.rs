//! Configuration for the patch pipeline.
//!
//! Every stage takes its constants from an explicit [`PipelineConfig`].
//! Values come from built-in defaults, optionally overridden by a YAML file
//! and then by environment variables; the CLI applies its flags last.

use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;

use patch_common::{PatchError, Result};
use patch_render::{
    ClaheParams, ContrastNormalizer, HillshadeParams, InterpolationMethod, LightSource,
    OverlayCompositor,
};
use serde::{Deserialize, Serialize};

/// How patch indices are minted during a tiling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexScheme {
    /// Gapless counter over emitted patches in visitation order.
    #[default]
    Dense,
    /// `row * cols_per_row + col` of the window in the grid. Skipped
    /// windows leave holes but never shift later indices.
    Grid,
}

impl IndexScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Grid => "grid",
        }
    }
}

impl std::fmt::Display for IndexScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IndexScheme {
    type Err = PatchError;

    /// Case-insensitive. Anything other than `dense` or `grid` is an error.
    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s.trim(), true).map_err(|_| {
            PatchError::invalid_config(format!(
                "unknown index scheme '{}' (expected dense or grid)",
                s
            ))
        })
    }
}

/// Window geometry and index assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Edge length of a full window in pixels.
    pub patch_size: usize,
    /// Pixels shared by neighbouring windows. Must be smaller than `patch_size`.
    pub overlap: usize,
    pub index_scheme: IndexScheme,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            patch_size: 512,
            overlap: 0,
            index_scheme: IndexScheme::Dense,
        }
    }
}

/// Percentile stretch and CLAHE settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContrastConfig {
    pub low_percentile: f64,
    pub high_percentile: f64,
    pub clip_limit: f64,
    /// CLAHE tile grid as (columns, rows).
    pub tile_grid: (usize, usize),
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            low_percentile: 2.0,
            high_percentile: 98.0,
            clip_limit: 3.0,
            tile_grid: (8, 8),
        }
    }
}

impl ContrastConfig {
    pub fn normalizer(&self) -> ContrastNormalizer {
        ContrastNormalizer::new(
            self.low_percentile,
            self.high_percentile,
            ClaheParams {
                clip_limit: self.clip_limit,
                tile_grid: self.tile_grid,
            },
        )
    }
}

/// Light model for hillshade synthesis and the azimuth sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillshadeConfig {
    /// Degrees clockwise from north.
    pub azimuth: f64,
    /// Degrees above the horizon.
    pub altitude: f64,
    pub vert_exag: f64,
    /// Azimuths visited by the sunlight sweep.
    pub sweep_azimuths: Vec<f64>,
}

impl Default for HillshadeConfig {
    fn default() -> Self {
        Self {
            azimuth: 315.0,
            altitude: 45.0,
            vert_exag: 1.0,
            sweep_azimuths: vec![45.0, 135.0, 225.0, 315.0],
        }
    }
}

impl HillshadeConfig {
    /// Shading parameters for the configured light.
    pub fn params(&self) -> HillshadeParams {
        self.params_at(self.azimuth)
    }

    /// Shading parameters with the azimuth replaced.
    pub fn params_at(&self, azimuth: f64) -> HillshadeParams {
        HillshadeParams {
            light: LightSource::new(azimuth, self.altitude),
            vert_exag: self.vert_exag,
        }
    }
}

/// Blend weights for optical/elevation overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub optical_weight: f64,
    pub elevation_weight: f64,
    pub interpolation: InterpolationMethod,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            optical_weight: 0.7,
            elevation_weight: 0.3,
            interpolation: InterpolationMethod::Bilinear,
        }
    }
}

/// Informative-pixel filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Pixels strictly brighter than this count as informative.
    pub brightness_threshold: u8,
    /// Minimum informative fraction for a patch to be kept.
    pub keep_ratio: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 10,
            keep_ratio: 0.10,
        }
    }
}

/// Group-aware subsampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Desired population size across all groups.
    pub target: usize,
    /// Seed for reproducible draws. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target: 3000,
            seed: None,
        }
    }
}

/// All pipeline constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tiling: TilingConfig,
    pub contrast: ContrastConfig,
    pub hillshade: HillshadeConfig,
    pub overlay: OverlayConfig,
    pub quality: QualityConfig,
    pub sampling: SamplingConfig,
}

impl PipelineConfig {
    /// Parse a YAML document. Missing sections and fields keep their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| PatchError::invalid_config(format!("invalid YAML: {}", e)))
    }

    /// Load a YAML configuration file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PatchError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Apply environment variable overrides to this configuration.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup. Unparseable numbers
    /// are ignored; an unknown index scheme is a configuration error.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = lookup("PATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.tiling.patch_size = size;
        }

        if let Some(overlap) = lookup("PATCH_OVERLAP").and_then(|v| v.parse().ok()) {
            self.tiling.overlap = overlap;
        }

        if let Some(val) = lookup("PATCH_INDEX_SCHEME") {
            self.tiling.index_scheme = val.parse()?;
        }

        if let Some(azimuth) = lookup("HILLSHADE_AZIMUTH").and_then(|v| v.parse().ok()) {
            self.hillshade.azimuth = azimuth;
        }

        if let Some(altitude) = lookup("HILLSHADE_ALTITUDE").and_then(|v| v.parse().ok()) {
            self.hillshade.altitude = altitude;
        }

        if let Some(threshold) = lookup("QUALITY_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.quality.brightness_threshold = threshold;
        }

        if let Some(ratio) = lookup("QUALITY_KEEP_RATIO").and_then(|v| v.parse().ok()) {
            self.quality.keep_ratio = ratio;
        }

        if let Some(target) = lookup("SAMPLE_TARGET").and_then(|v| v.parse().ok()) {
            self.sampling.target = target;
        }

        if let Some(seed) = lookup("SAMPLE_SEED").and_then(|v| v.parse().ok()) {
            self.sampling.seed = Some(seed);
        }

        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let tiling = &self.tiling;
        if tiling.patch_size == 0 {
            return Err(PatchError::invalid_config("patch_size must be > 0"));
        }
        if tiling.overlap >= tiling.patch_size {
            return Err(PatchError::invalid_config(format!(
                "overlap ({}) must be smaller than patch_size ({})",
                tiling.overlap, tiling.patch_size
            )));
        }

        let contrast = &self.contrast;
        let in_range = |p: f64| (0.0..=100.0).contains(&p);
        if !in_range(contrast.low_percentile) || !in_range(contrast.high_percentile) {
            return Err(PatchError::invalid_config("percentiles must be within 0-100"));
        }
        if contrast.low_percentile >= contrast.high_percentile {
            return Err(PatchError::invalid_config(
                "low_percentile must be below high_percentile",
            ));
        }
        if contrast.clip_limit <= 0.0 {
            return Err(PatchError::invalid_config("clip_limit must be > 0"));
        }
        if contrast.tile_grid.0 == 0 || contrast.tile_grid.1 == 0 {
            return Err(PatchError::invalid_config("tile_grid must be at least 1x1"));
        }

        if !(0.0..=90.0).contains(&self.hillshade.altitude) {
            return Err(PatchError::invalid_config("altitude must be within 0-90 degrees"));
        }
        if self.hillshade.sweep_azimuths.is_empty() {
            return Err(PatchError::invalid_config("sweep_azimuths must not be empty"));
        }

        if self.overlay.optical_weight < 0.0 || self.overlay.elevation_weight < 0.0 {
            return Err(PatchError::invalid_config("blend weights must be >= 0"));
        }

        if !(0.0..=1.0).contains(&self.quality.keep_ratio) {
            return Err(PatchError::invalid_config("keep_ratio must be within 0-1"));
        }

        Ok(())
    }

    /// Contrast normalizer for tiling.
    pub fn normalizer(&self) -> ContrastNormalizer {
        self.contrast.normalizer()
    }

    /// Overlay compositor sharing the contrast settings.
    pub fn compositor(&self) -> OverlayCompositor {
        OverlayCompositor {
            normalizer: self.contrast.normalizer(),
            optical_weight: self.overlay.optical_weight,
            elevation_weight: self.overlay.elevation_weight,
            interpolation: self.overlay.interpolation,
        }
    }
}
