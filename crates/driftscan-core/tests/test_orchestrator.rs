use std::path::Path;

use driftscan_core::error::{DriftscanError, Result};
use driftscan_core::field::DisplacementField;
use driftscan_core::io::ProductStore;
use driftscan_core::pipeline::config::{PipelineConfig, TerrainConfig, TrackingConfig};
use driftscan_core::pipeline::types::{PipelineState, Product, StageKind};
use driftscan_core::pipeline::StageOrchestrator;
use driftscan_core::raster::RasterGrid;
use driftscan_core::terrain::TerrainCorrectionService;

mod common;

/// Region covering the central 160x160 px of the test scenes.
const REGION: &str =
    "POLYGON ((500200 3998200, 501800 3998200, 501800 3999800, 500200 3999800, 500200 3998200))";

/// Feature motion between the two epochs, in pixels.
const SHIFT: (f64, f64) = (1.5, -1.0);

fn write_sources(dir: &Path, swap: bool) -> (std::path::PathBuf, std::path::PathBuf) {
    let store = ProductStore::new();
    let earlier = common::textured_scene(200, 200, 77, "epoch_a", common::MASTER_TS);
    let later = common::shifted_scene(200, 200, 77, SHIFT, "epoch_b", common::SLAVE_TS);

    let earlier_path = dir.join("epoch_a.dsp");
    let later_path = dir.join("epoch_b.dsp");
    store.write(&Product::Scene(earlier), &earlier_path).unwrap();
    store.write(&Product::Scene(later), &later_path).unwrap();

    if swap {
        (later_path, earlier_path)
    } else {
        (earlier_path, later_path)
    }
}

fn pipeline_config(dir: &Path, swap: bool, run_id: &str) -> PipelineConfig {
    let (master, slave) = write_sources(dir, swap);
    let mut config: PipelineConfig = toml::from_str(&format!(
        r#"
        master = "{}"
        slave = "{}"
        output_dir = "{}"
        run_id = "{}"
        region = "{}"
    "#,
        master.display(),
        slave.display(),
        dir.join("out").display(),
        run_id,
        REGION
    ))
    .unwrap();

    // Keep the correlation scan small, and disable the global xcorr so the
    // uniform true motion is not absorbed during coregistration.
    config.coregistration.xcorr = false;
    config.tracking = TrackingConfig {
        window_width: 16,
        window_height: 16,
        oversampling: 4,
        max_velocity: 5.0,
        ..Default::default()
    };
    config.terrain = TerrainConfig {
        pixel_spacing_m: 140.0,
        ..Default::default()
    };
    config
}

fn read_tracking_field(out_dir: &Path, run_id: &str) -> DisplacementField {
    let path = out_dir.join(format!("{}_tracking.dsp", run_id));
    match ProductStore::new().read(&path).unwrap() {
        Product::Field(field) => field,
        other => panic!("expected field artifact, got {}", other.kind_name()),
    }
}

fn mean_valid_offset(field: &DisplacementField) -> (f64, f64) {
    let mut sum = (0.0, 0.0);
    let mut count = 0usize;
    for node in field.iter_valid() {
        sum.0 += node.offset.0;
        sum.1 += node.offset.1;
        count += 1;
    }
    assert!(count > 0, "no valid nodes");
    (sum.0 / count as f64, sum.1 / count as f64)
}

#[test]
fn test_full_pipeline_produces_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = pipeline_config(dir.path(), false, "e2e");
    let out_dir = config.output_dir.clone();

    let mut orchestrator = StageOrchestrator::new(config).unwrap();
    assert_eq!(orchestrator.state(), PipelineState::Pending);

    let outcome = orchestrator.run().unwrap();
    assert_eq!(
        orchestrator.state(),
        PipelineState::Succeeded(StageKind::TerrainCorrect)
    );

    // Two orbit artifacts, one per later stage.
    assert_eq!(outcome.artifacts.len(), 6);
    for (_, path) in &outcome.artifacts {
        assert!(path.exists(), "missing artifact {}", path.display());
    }
    for name in [
        "e2e_orbit_master.dsp",
        "e2e_orbit_slave.dsp",
        "e2e_coreg.dsp",
        "e2e_subset.dsp",
        "e2e_tracking.dsp",
        "e2e_terrain.dsp",
    ] {
        assert!(out_dir.join(name).exists(), "missing {}", name);
    }

    // The tracked motion matches the synthetic displacement.
    let field = read_tracking_field(&out_dir, "e2e");
    assert!(field.valid_fraction() > 0.5);
    let (mean_az, mean_rg) = mean_valid_offset(&field);
    assert!((mean_az - SHIFT.0).abs() < 0.3, "mean az offset {}", mean_az);
    assert!((mean_rg - SHIFT.1).abs() < 0.3, "mean rg offset {}", mean_rg);

    // Final product is a ground-projected velocity raster.
    let final_raster = match ProductStore::new().read(&outcome.final_product).unwrap() {
        Product::Scene(raster) => raster,
        other => panic!("expected scene, got {}", other.kind_name()),
    };
    let expected_velocity = (15.0f64.powi(2) + 10.0f64.powi(2)).sqrt() / 12.0;
    let mask = final_raster.mask.as_ref().unwrap();
    let mut checked = 0;
    for ((r, c), &v) in final_raster.data.indexed_iter() {
        if mask[[r, c]] {
            assert!(
                (v as f64 - expected_velocity).abs() < 0.5,
                "velocity {} vs {}",
                v,
                expected_velocity
            );
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_swapped_inputs_invert_the_displacement_sign() {
    let dir = tempfile::tempdir().unwrap();

    let forward = pipeline_config(dir.path(), false, "fwd");
    let out_fwd = forward.output_dir.clone();
    StageOrchestrator::new(forward).unwrap().run().unwrap();

    let reverse = pipeline_config(dir.path(), true, "rev");
    let out_rev = reverse.output_dir.clone();
    StageOrchestrator::new(reverse).unwrap().run().unwrap();

    let (fwd_az, fwd_rg) = mean_valid_offset(&read_tracking_field(&out_fwd, "fwd"));
    let (rev_az, rev_rg) = mean_valid_offset(&read_tracking_field(&out_rev, "rev"));

    assert!((fwd_az + rev_az).abs() < 0.3, "{} vs {}", fwd_az, rev_az);
    assert!((fwd_rg + rev_rg).abs() < 0.3, "{} vs {}", fwd_rg, rev_rg);
}

#[test]
fn test_disjoint_region_halts_at_subset() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pipeline_config(dir.path(), false, "offmap");
    config.region =
        "POLYGON ((600000 3998200, 601000 3998200, 601000 3999000, 600000 3999000, 600000 3998200))"
            .to_string();
    let out_dir = config.output_dir.clone();

    let mut orchestrator = StageOrchestrator::new(config).unwrap();
    let err = orchestrator.run().unwrap_err();

    match err {
        DriftscanError::Stage { stage, source } => {
            assert_eq!(stage, StageKind::Subset);
            assert!(matches!(*source, DriftscanError::Coverage(_)));
        }
        other => panic!("expected stage failure, got {}", other),
    }
    assert_eq!(orchestrator.state(), PipelineState::Failed(StageKind::Subset));

    // Artifacts exist only for the stages that ran before the failure.
    assert!(out_dir.join("offmap_orbit_master.dsp").exists());
    assert!(out_dir.join("offmap_orbit_slave.dsp").exists());
    assert!(out_dir.join("offmap_coreg.dsp").exists());
    assert!(!out_dir.join("offmap_subset.dsp").exists());
    assert!(!out_dir.join("offmap_tracking.dsp").exists());
    assert!(!out_dir.join("offmap_terrain.dsp").exists());
}

#[test]
fn test_textureless_pair_halts_at_tracking() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProductStore::new();
    let master_path = dir.path().join("flat_a.dsp");
    let slave_path = dir.path().join("flat_b.dsp");
    store
        .write(
            &Product::Scene(common::constant_scene(200, 200, 0.4, "flat_a", common::MASTER_TS)),
            &master_path,
        )
        .unwrap();
    store
        .write(
            &Product::Scene(common::constant_scene(200, 200, 0.4, "flat_b", common::SLAVE_TS)),
            &slave_path,
        )
        .unwrap();

    let mut config = pipeline_config(dir.path(), false, "flat");
    config.master = master_path;
    config.slave = slave_path;
    let out_dir = config.output_dir.clone();

    let mut orchestrator = StageOrchestrator::new(config).unwrap();
    let err = orchestrator.run().unwrap_err();

    match err {
        DriftscanError::Stage { stage, source } => {
            assert_eq!(stage, StageKind::OffsetTrack);
            assert!(matches!(*source, DriftscanError::Correlation { .. }));
        }
        other => panic!("expected tracking failure, got {}", other),
    }
    assert!(out_dir.join("flat_subset.dsp").exists());
    assert!(!out_dir.join("flat_tracking.dsp").exists());
    assert!(!out_dir.join("flat_terrain.dsp").exists());
}

/// Terrain service that always fails, standing in for a missing DEM tile.
struct FailingTerrain;

impl TerrainCorrectionService for FailingTerrain {
    fn correct(
        &self,
        _field: &DisplacementField,
        _config: &TerrainConfig,
    ) -> Result<RasterGrid> {
        Err(DriftscanError::Coverage("DEM tile not on disk".into()))
    }
}

#[test]
fn test_failing_service_is_reported_with_its_stage() {
    use driftscan_core::coregister::XcorrCoregistration;
    use driftscan_core::orbit::ResidualOrbit;

    let dir = tempfile::tempdir().unwrap();
    let config = pipeline_config(dir.path(), false, "noterr");
    let out_dir = config.output_dir.clone();

    let mut orchestrator = StageOrchestrator::with_services(
        config,
        Box::new(ResidualOrbit::new((0.0, 0.0))),
        Box::new(XcorrCoregistration::new()),
        Box::new(FailingTerrain),
    )
    .unwrap();

    let err = orchestrator.run().unwrap_err();
    match err {
        DriftscanError::Stage { stage, .. } => assert_eq!(stage, StageKind::TerrainCorrect),
        other => panic!("expected stage failure, got {}", other),
    }
    assert_eq!(
        orchestrator.state(),
        PipelineState::Failed(StageKind::TerrainCorrect)
    );

    assert!(out_dir.join("noterr_tracking.dsp").exists());
    assert!(!out_dir.join("noterr_terrain.dsp").exists());
}

#[test]
fn test_invalid_config_is_rejected_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pipeline_config(dir.path(), false, "badcfg");
    config.tracking.correlation_threshold = 2.0;

    assert!(matches!(
        StageOrchestrator::new(config),
        Err(DriftscanError::Config(_))
    ));

    let mut config = pipeline_config(dir.path(), false, "badwkt");
    config.region = "CIRCLE (0 0 5)".to_string();
    assert!(matches!(
        StageOrchestrator::new(config),
        Err(DriftscanError::Input(_))
    ));
}

#[test]
fn test_unknown_dem_halts_at_coregistration() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pipeline_config(dir.path(), false, "nodem");
    config.coregistration.dem = "No Such DEM".to_string();
    let out_dir = config.output_dir.clone();

    let mut orchestrator = StageOrchestrator::new(config).unwrap();
    let err = orchestrator.run().unwrap_err();

    match err {
        DriftscanError::Stage { stage, source } => {
            assert_eq!(stage, StageKind::Coregister);
            assert!(matches!(*source, DriftscanError::Coverage(_)));
        }
        other => panic!("expected stage failure, got {}", other),
    }
    assert!(out_dir.join("nodem_orbit_master.dsp").exists());
    assert!(!out_dir.join("nodem_coreg.dsp").exists());
}
