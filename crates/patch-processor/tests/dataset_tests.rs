//! Assembly, overlay and sweep stages on disk.

use std::fs;
use std::path::Path;

use ndarray::Array3;
use patch_common::{Modality, PatchKey, PixelBuffer};
use patch_processor::{DirStore, ModalityIndex, Pipeline, PipelineConfig};
use test_utils::{
    create_elevation_grid, create_optical_grid, keys_for, temp_test_dir, write_tiff_f32,
    PatchTree,
};

fn load_sample(path: &Path) -> Array3<f32> {
    ndarray_npy::read_npy(path).unwrap()
}

fn pipeline(patch_size: usize) -> Pipeline {
    let mut config = PipelineConfig::default();
    config.tiling.patch_size = patch_size;
    Pipeline::new(config).unwrap()
}

#[test]
fn test_matched_count_is_intersection() {
    let tree = PatchTree::new();
    // optical: 0..6, elevation: 2..8, hillshade: 0..4 -> common 2, 3
    tree.add_constant(Modality::Optical, &keys_for("img1", 6), 16, 120);
    tree.add_constant(Modality::Elevation, &keys_for("img1", 8)[2..], 16, 60);
    tree.add_constant(Modality::Hillshade, &keys_for("img1", 4), 16, 200);

    let output = tree.root().join("final_dataset");
    let report = pipeline(16)
        .assemble_directory(
            &tree.dir(Modality::Optical),
            &tree.dir(Modality::Elevation),
            &tree.dir(Modality::Hillshade),
            &output,
        )
        .unwrap();

    assert_eq!(report.optical, 6);
    assert_eq!(report.matched, 2);
    assert_eq!(report.missing_elevation, 2);
    assert_eq!(report.missing_hillshade, 2);

    for index in [2, 3] {
        let key = PatchKey::new("img1", index);
        assert!(output.join("jpg").join(key.file_name("jpg")).exists());
        let sample = load_sample(&output.join("npy").join(key.file_name("npy")));
        assert_eq!(sample.shape(), &[16, 16, 3]);
        assert!(sample.iter().all(|v| (0.0..=1.0).contains(v)));
        // Hillshade is lossless PNG.
        assert_eq!(sample[[5, 5, 2]], 200.0 / 255.0);
    }
    assert!(!output.join("npy").join("img1_0.npy").exists());
}

#[test]
fn test_index_over_dir_store() {
    let tree = PatchTree::new();
    tree.add_constant(Modality::Optical, &keys_for("a", 2), 8, 1);
    tree.add_constant(Modality::Elevation, &keys_for("a", 2), 8, 1);
    tree.add_constant(Modality::Hillshade, &keys_for("a", 1), 8, 1);

    let store = DirStore::new(
        tree.dir(Modality::Optical),
        tree.dir(Modality::Elevation),
        tree.dir(Modality::Hillshade),
    );
    let index = ModalityIndex::build(&store).unwrap();
    assert_eq!(index.complete_keys(), vec![PatchKey::new("a", 0)]);
}

#[test]
fn test_hillshade_resized_to_optical() {
    let tree = PatchTree::new();
    let key = PatchKey::new("img2", 0);
    tree.add(Modality::Optical, &key, &PixelBuffer::filled(32, 32, 3, 90u8));
    tree.add(Modality::Elevation, &key, &PixelBuffer::filled(16, 16, 1, 90u8));
    tree.add(Modality::Hillshade, &key, &PixelBuffer::filled(64, 64, 1, 90u8));

    let output = tree.root().join("ds");
    let report = pipeline(32)
        .assemble_directory(
            &tree.dir(Modality::Optical),
            &tree.dir(Modality::Elevation),
            &tree.dir(Modality::Hillshade),
            &output,
        )
        .unwrap();
    assert_eq!(report.matched, 1);
    let sample = load_sample(&output.join("npy/img2_0.npy"));
    assert_eq!(sample.shape(), &[32, 32, 3]);
}

#[test]
fn test_overlay_pairs_by_stem() {
    let dir = temp_test_dir();
    let optical = dir.path().join("tmc");
    let elevation = dir.path().join("dtm");
    fs::create_dir(&optical).unwrap();
    fs::create_dir(&elevation).unwrap();

    write_tiff_f32(&optical.join("scene1.tif"), &create_optical_grid(64, 64, 3, 1));
    write_tiff_f32(&optical.join("scene2.tif"), &create_optical_grid(64, 64, 3, 2));
    write_tiff_f32(&elevation.join("scene1.tif"), &create_elevation_grid(48, 64, 900.0));

    let output = dir.path().join("overlay");
    let report = pipeline(32).overlay_directory(&optical, &elevation, &output).unwrap();

    assert_eq!(report.pairs, 1);
    assert_eq!(report.missing_elevation, 1);
    // Common extent 48x64 with 32px windows: 2 columns x 2 rows.
    assert_eq!(report.emitted(), 4);
    assert!(output.join("scene1_3.jpg").exists());
    assert!(!output.join("scene2_0.jpg").exists());
}

#[test]
fn test_sunlight_sweep_layout() {
    let dir = temp_test_dir();
    let input = dir.path().join("dtm_patches");
    fs::create_dir(&input).unwrap();
    let patch = create_elevation_grid(16, 16, 50.0).map(|&v| v.clamp(0.0, 255.0) as u8);
    test_utils::write_patch_image(&input.join("img1_0.jpg"), &patch);
    fs::write(input.join("img1_1.jpg"), b"garbage").unwrap();

    let output = dir.path().join("sweep");
    let report = pipeline(16).sunlight_sweep(&input, &output).unwrap();

    assert_eq!(report.patches, 2);
    assert_eq!(report.unreadable, 1);
    assert_eq!(report.written, 4);
    for az in [45, 135, 225, 315] {
        assert!(output
            .join(format!("az{}", az))
            .join(format!("img1_0_az{}.png", az))
            .exists());
    }
}
