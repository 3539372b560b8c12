//! Multi-modal patch dataset builder.
//!
//! Tiles co-registered optical and elevation rasters into patches, derives
//! hillshade and overlay products, joins the modalities into training
//! samples, and filters or subsamples the resulting patch populations.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cli::{Args, Command};
use patch_processor::{Pipeline, PipelineConfig};

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level, args.json)?;

    let config = load_config(&args)?;
    info!(
        command = args.command.name(),
        patch_size = config.tiling.patch_size,
        overlap = config.tiling.overlap,
        index_scheme = %config.tiling.index_scheme,
        "Loaded configuration"
    );

    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;
    run(&pipeline, &args.command, args.json)
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Defaults, then the YAML file, then environment variables, then flags.
fn load_config(args: &Args) -> Result<PipelineConfig> {
    let base = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let base = base.with_env().context("Invalid environment override")?;
    Ok(args.command.apply(base))
}

fn run(pipeline: &Pipeline, command: &Command, json: bool) -> Result<()> {
    match command {
        Command::Tile { input, output, .. } => {
            let report = pipeline
                .tile_directory(input, output)
                .with_context(|| format!("Tiling {} failed", input.display()))?;
            print_report(&report, json)
        }
        Command::Hillshade { input, output, .. } => {
            let report = pipeline
                .hillshade_directory(input, output)
                .with_context(|| format!("Hillshading {} failed", input.display()))?;
            print_report(&report, json)
        }
        Command::Sunlight { input, output, .. } => {
            let report = pipeline
                .sunlight_sweep(input, output)
                .with_context(|| format!("Sunlight sweep over {} failed", input.display()))?;
            print_report(&report, json)
        }
        Command::Overlay {
            optical,
            elevation,
            output,
            ..
        } => {
            let report = pipeline
                .overlay_directory(optical, elevation, output)
                .with_context(|| format!("Overlay of {} failed", optical.display()))?;
            print_report(&report, json)
        }
        Command::Assemble {
            optical,
            elevation,
            hillshade,
            output,
        } => {
            let report = pipeline
                .assemble_directory(optical, elevation, hillshade, output)
                .with_context(|| format!("Assembly into {} failed", output.display()))?;
            print_report(&report, json)
        }
        Command::Clean { input, dry_run, .. } => {
            let report = pipeline
                .clean_directory(input, *dry_run)
                .with_context(|| format!("Cleaning {} failed", input.display()))?;
            print_report(&report, json)
        }
        Command::Sample { input, output, .. } => {
            let report = pipeline
                .sample_directory(input, output)
                .with_context(|| format!("Sampling {} failed", input.display()))?;
            print_report(&report, json)
        }
    }
}

/// Print the stage report to stdout.
fn print_report<T: Serialize + std::fmt::Debug>(report: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{:#?}", report);
    }
    Ok(())
}
