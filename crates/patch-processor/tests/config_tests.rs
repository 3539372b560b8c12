//! Configuration loading from YAML files and overrides.

use std::collections::HashMap;
use std::fs;

use patch_processor::{IndexScheme, Pipeline, PipelineConfig};
use test_utils::temp_test_dir;

#[test]
fn test_yaml_file_overrides_defaults() {
    let dir = temp_test_dir();
    let path = dir.path().join("pipeline.yaml");
    fs::write(
        &path,
        r#"
tiling:
  patch_size: 256
  overlap: 32
  index_scheme: grid
hillshade:
  sweep_azimuths: [0, 90, 180, 270]
sampling:
  target: 500
  seed: 7
"#,
    )
    .unwrap();

    let config = PipelineConfig::from_yaml_file(&path).unwrap();
    assert_eq!(config.tiling.patch_size, 256);
    assert_eq!(config.tiling.overlap, 32);
    assert_eq!(config.tiling.index_scheme, IndexScheme::Grid);
    assert_eq!(config.hillshade.sweep_azimuths, vec![0.0, 90.0, 180.0, 270.0]);
    assert_eq!(config.sampling.seed, Some(7));

    // Untouched sections keep their defaults.
    assert_eq!(config.hillshade.azimuth, 315.0);
    assert_eq!(config.quality.brightness_threshold, 10);
    assert_eq!(config.contrast.tile_grid, (8, 8));
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = temp_test_dir();
    assert!(PipelineConfig::from_yaml_file(&dir.path().join("absent.yaml")).is_err());
}

#[test]
fn test_overrides_then_validate() {
    let vars: HashMap<&str, &str> = [("PATCH_SIZE", "128"), ("PATCH_OVERLAP", "128")]
        .into_iter()
        .collect();
    let config = PipelineConfig::default()
        .with_overrides(|name| vars.get(name).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.tiling.patch_size, 128);
    assert!(config.validate().is_err());
    assert!(Pipeline::new(config).is_err());
}
