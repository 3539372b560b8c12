//! Quality filter and population sampler on disk.

use std::fs;

use patch_common::{Modality, PatchError, PatchKey};
use patch_processor::{PopulationSampler, QualityFilter};
use test_utils::{create_partial_patch, keys_for, temp_test_dir, PatchTree};

// ============================================================================
// Quality filter
// ============================================================================

#[test]
fn test_keep_ratio_boundary_on_disk() {
    let tree = PatchTree::new();
    let dir = tree.dir(Modality::Hillshade);
    // 100 pixels, keep ratio 0.10: 9 informative pixels fail, 11 pass.
    let below = tree.add(
        Modality::Hillshade,
        &PatchKey::new("img1", 0),
        &create_partial_patch(10, 10, 0.09, 200, 0),
    );
    let above = tree.add(
        Modality::Hillshade,
        &PatchKey::new("img1", 1),
        &create_partial_patch(10, 10, 0.11, 200, 0),
    );

    let report = QualityFilter::default().run(&dir).unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.deletion_rate(), 0.5);
    assert!(!below.exists());
    assert!(above.exists());
}

#[test]
fn test_dry_run_keeps_files() {
    let tree = PatchTree::new();
    tree.add_constant(Modality::Hillshade, &keys_for("dark", 3), 8, 0);

    let report = QualityFilter::default()
        .with_dry_run(true)
        .run(&tree.dir(Modality::Hillshade))
        .unwrap();
    assert_eq!(report.deleted, 3);
    assert!(report.dry_run);
    assert_eq!(fs::read_dir(tree.dir(Modality::Hillshade)).unwrap().count(), 3);
}

#[test]
fn test_bright_jpegs_survive() {
    let tree = PatchTree::new();
    tree.add_constant(Modality::Optical, &keys_for("img1", 4), 16, 180);

    let report = QualityFilter::default()
        .run(&tree.dir(Modality::Optical))
        .unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.kept(), 4);
}

// ============================================================================
// Population sampler
// ============================================================================

#[test]
fn test_sampler_copies_and_preserves_input() {
    let tree = PatchTree::new();
    tree.add_constant(Modality::Optical, &keys_for("img1", 12), 4, 100);
    tree.add_constant(Modality::Optical, &keys_for("img2", 12), 4, 100);
    tree.add_constant(Modality::Optical, &keys_for("img3", 3), 4, 100);

    let output = tree.root().join("reduced");
    let report = PopulationSampler::new(30, Some(3))
        .run(&tree.dir(Modality::Optical), &output)
        .unwrap();

    assert_eq!(report.population, 27);
    assert_eq!(report.groups, 3);
    assert_eq!(report.quota, 10);
    assert_eq!(report.selected, 10 + 10 + 3);
    assert_eq!(fs::read_dir(&output).unwrap().count(), 23);
    assert_eq!(fs::read_dir(tree.dir(Modality::Optical)).unwrap().count(), 27);
}

#[test]
fn test_sampler_empty_directory_is_fatal() {
    let dir = temp_test_dir();
    let err = PopulationSampler::new(10, Some(1))
        .run(dir.path(), &dir.path().join("out"))
        .unwrap_err();
    assert!(matches!(err, PatchError::EmptyPopulation(_)));
}
