// tests/pipeline_stages.rs

//! Controller state machine behaviour, exercised with the fake runner:
//! stages run in order, gate on success, and a failure skips everything
//! downstream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeRunner;
use image::{Rgb, RgbImage};
use raypatch::config::{ConfigFile, OutputSection, Parameters};
use raypatch::errors::RaypatchError;
use raypatch::exec::{ProcessRegistry, TaskRunner};
use raypatch::grid::PatchCoord;
use raypatch::pipeline::{Pipeline, Stage, StageTemplates, patch_output_path};

/// 20×20 image in 10×10 patches, default (CMake-shaped) templates, outputs
/// rooted in `dir`.
fn fixture(dir: &std::path::Path) -> (Parameters, StageTemplates, OutputSection) {
    let mut cfg = ConfigFile::default();
    cfg.render.image_width = 20;
    cfg.render.image_height = 20;
    cfg.render.random_seed = Some(1);

    let params = Parameters::resolve(&cfg).unwrap();
    let templates = StageTemplates::from_config(&cfg.stage);
    let output = OutputSection {
        patch_path: dir
            .join("patch_{patch_x}_{patch_y}.ppm")
            .to_string_lossy()
            .into_owned(),
        composite_path: dir.join("image.png").to_string_lossy().into_owned(),
    };
    (params, templates, output)
}

fn write_all_patches(output: &OutputSection) {
    for y in 0..2 {
        for x in 0..2 {
            let tile = RgbImage::from_pixel(10, 10, Rgb([40, 50, 60]));
            tile.save(patch_output_path(
                &output.patch_path,
                PatchCoord::new(x, y),
            ))
            .unwrap();
        }
    }
}

#[tokio::test]
async fn all_stages_succeed_then_composite_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let (params, templates, output) = fixture(dir.path());
    write_all_patches(&output);

    let runner = Arc::new(FakeRunner::new(Duration::from_millis(2)));
    let registry = Arc::new(ProcessRegistry::new());
    let pipeline = Pipeline::new(
        params,
        templates,
        output.clone(),
        registry,
        Arc::clone(&runner) as Arc<dyn TaskRunner>,
    );

    pipeline.run().await.unwrap();

    // Three stages times four patches.
    assert_eq!(runner.started().len(), 12);
    assert!(dir.path().join("image.png").exists());
}

#[tokio::test]
async fn build_failure_skips_the_run_stage() {
    let dir = tempfile::tempdir().unwrap();
    let (params, templates, output) = fixture(dir.path());

    // Fail patch (1, 0) in the build stage only.
    let runner = Arc::new(
        FakeRunner::new(Duration::from_millis(2)).failing("--build", PatchCoord::new(1, 0)),
    );
    let registry = Arc::new(ProcessRegistry::new());
    let pipeline = Pipeline::new(
        params,
        templates,
        output,
        registry,
        Arc::clone(&runner) as Arc<dyn TaskRunner>,
    );

    let err = pipeline.run().await.unwrap_err();
    match err {
        RaypatchError::StageFailed { stage, failed } => {
            assert_eq!(stage, Stage::Build);
            assert_eq!(failed, vec![PatchCoord::new(1, 0)]);
        }
        other => panic!("expected StageFailed, got {other}"),
    }

    let started = runner.started();
    // The configure stage completed for the whole grid before build began.
    let configures = started
        .iter()
        .filter(|(_, cmd)| cmd.contains("CMAKE_BUILD_TYPE"))
        .count();
    assert_eq!(configures, 4);
    // The run stage never started.
    assert!(started.iter().all(|(_, cmd)| !cmd.contains("ray_tracing")));
}

#[tokio::test]
async fn missing_patch_output_fails_the_assemble_state() {
    let dir = tempfile::tempdir().unwrap();
    let (params, templates, output) = fixture(dir.path());
    // All three process stages succeed, but nothing wrote any patch file.

    let runner = Arc::new(FakeRunner::new(Duration::from_millis(2)));
    let registry = Arc::new(ProcessRegistry::new());
    let pipeline = Pipeline::new(
        params,
        templates,
        output,
        Arc::clone(&registry),
        runner as Arc<dyn TaskRunner>,
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, RaypatchError::MissingPatchOutput { .. }));
    // Nothing was ever registered, so nothing was there to clean up.
    assert!(registry.is_empty());
}
