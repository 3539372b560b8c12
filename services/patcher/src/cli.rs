//! Command-line arguments and how they layer onto the pipeline configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use patch_processor::{IndexScheme, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "patcher")]
#[command(about = "Build multi-modal patch datasets from co-registered rasters")]
pub struct Args {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true, env = "PATCHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs and the final report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Window geometry flags shared by every stage that tiles rasters.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TilingArgs {
    #[arg(long)]
    pub patch_size: Option<usize>,
    #[arg(long)]
    pub overlap: Option<usize>,
    /// Patch numbering
    #[arg(long, value_enum, ignore_case = true)]
    pub index_scheme: Option<IndexScheme>,
}

impl TilingArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        set(&mut config.tiling.patch_size, self.patch_size);
        set(&mut config.tiling.overlap, self.overlap);
        set(&mut config.tiling.index_scheme, self.index_scheme);
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tile rasters into contrast-normalized JPEG patches
    Tile {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        tiling: TilingArgs,
    },

    /// Tile elevation rasters into hillshade PNG patches
    Hillshade {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        tiling: TilingArgs,
        #[arg(long)]
        azimuth: Option<f64>,
        #[arg(long)]
        altitude: Option<f64>,
    },

    /// Shade elevation patches from a sweep of sun azimuths
    Sunlight {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        altitude: Option<f64>,
    },

    /// Composite optical rasters with colorized elevation
    Overlay {
        #[arg(long)]
        optical: PathBuf,
        #[arg(long)]
        elevation: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        tiling: TilingArgs,
    },

    /// Join optical, elevation and hillshade patches into samples
    Assemble {
        #[arg(long)]
        optical: PathBuf,
        #[arg(long)]
        elevation: PathBuf,
        #[arg(long)]
        hillshade: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Delete low-information patches
    Clean {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        threshold: Option<u8>,
        #[arg(long)]
        keep_ratio: Option<f64>,
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Copy a group-balanced random subset of patches
    Sample {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        target: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Command {
    /// Stage name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tile { .. } => "tile",
            Self::Hillshade { .. } => "hillshade",
            Self::Sunlight { .. } => "sunlight",
            Self::Overlay { .. } => "overlay",
            Self::Assemble { .. } => "assemble",
            Self::Clean { .. } => "clean",
            Self::Sample { .. } => "sample",
        }
    }

    /// Apply this command's flags on top of `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        match self {
            Self::Tile { tiling, .. } | Self::Overlay { tiling, .. } => {
                tiling.apply(&mut config);
            }
            Self::Hillshade {
                tiling,
                azimuth,
                altitude,
                ..
            } => {
                tiling.apply(&mut config);
                set(&mut config.hillshade.azimuth, *azimuth);
                set(&mut config.hillshade.altitude, *altitude);
            }
            Self::Sunlight { altitude, .. } => {
                set(&mut config.hillshade.altitude, *altitude);
            }
            Self::Assemble { .. } => {}
            Self::Clean {
                threshold,
                keep_ratio,
                ..
            } => {
                set(&mut config.quality.brightness_threshold, *threshold);
                set(&mut config.quality.keep_ratio, *keep_ratio);
            }
            Self::Sample { target, seed, .. } => {
                set(&mut config.sampling.target, *target);
                if seed.is_some() {
                    config.sampling.seed = *seed;
                }
            }
        }
        config
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_tile_flags_override_config() {
        let args = parse(&[
            "patcher",
            "tile",
            "-i",
            "in",
            "-o",
            "out",
            "--patch-size",
            "256",
            "--index-scheme",
            "grid",
        ]);
        let config = args.command.apply(PipelineConfig::default());
        assert_eq!(config.tiling.patch_size, 256);
        assert_eq!(config.tiling.overlap, 0);
        assert_eq!(config.tiling.index_scheme, IndexScheme::Grid);
    }

    #[test]
    fn test_hillshade_takes_tiling_flags() {
        let args = parse(&[
            "patcher",
            "hillshade",
            "-i",
            "dtm",
            "-o",
            "hill",
            "--overlap",
            "64",
            "--index-scheme",
            "GRID",
            "--azimuth",
            "270",
        ]);
        let config = args.command.apply(PipelineConfig::default());
        assert_eq!(config.tiling.overlap, 64);
        assert_eq!(config.tiling.index_scheme, IndexScheme::Grid);
        assert_eq!(config.hillshade.azimuth, 270.0);
    }

    #[test]
    fn test_unknown_index_scheme_flag_is_rejected() {
        let result = Args::try_parse_from([
            "patcher", "tile", "-i", "in", "-o", "out", "--index-scheme", "grdi",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut base = PipelineConfig::default();
        base.quality.keep_ratio = 0.25;
        let args = parse(&["patcher", "clean", "--input", "patches", "--dry-run"]);
        let config = args.command.apply(base.clone());
        assert_eq!(config, base);
        assert!(matches!(args.command, Command::Clean { dry_run: true, .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&[
            "patcher",
            "sample",
            "-i",
            "a",
            "-o",
            "b",
            "--seed",
            "4",
            "--json",
            "--log-level",
            "debug",
        ]);
        assert!(args.json);
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.command.name(), "sample");
        assert_eq!(args.command.apply(PipelineConfig::default()).sampling.seed, Some(4));
    }

    #[test]
    fn test_missing_required_path_is_rejected() {
        assert!(Args::try_parse_from(["patcher", "assemble", "--optical", "o"]).is_err());
    }
}
