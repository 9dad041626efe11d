use std::fs;

use ndarray::Array2;

use driftscan_core::error::DriftscanError;
use driftscan_core::field::{DisplacementField, DisplacementNode};
use driftscan_core::io::product::peek_header;
use driftscan_core::io::ProductStore;
use driftscan_core::pipeline::types::{Product, ScenePair};

mod common;

#[test]
fn test_scene_roundtrip_preserves_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.dsp");
    let store = ProductStore::new();

    let mut scene = common::textured_scene(32, 48, 1, "S1A_20181003", common::MASTER_TS);
    let mut mask = Array2::from_elem((32, 48), true);
    mask[[3, 7]] = false;
    mask[[31, 47]] = false;
    scene = scene.with_mask(mask).unwrap();

    store.write(&Product::Scene(scene.clone()), &path).unwrap();
    let read = store.read_scene(&path).unwrap();

    assert_eq!(read.data, scene.data);
    assert_eq!(read.geo, scene.geo);
    assert_eq!(read.mask, scene.mask);
    assert_eq!(read.meta.scene_id, "S1A_20181003");
    assert_eq!(read.meta.timestamp_us, Some(common::MASTER_TS));
}

#[test]
fn test_stack_roundtrip_preserves_roles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.dsp");
    let store = ProductStore::new();

    let pair = ScenePair::new(
        common::textured_scene(20, 20, 2, "master", common::MASTER_TS),
        common::textured_scene(20, 20, 3, "slave", common::SLAVE_TS),
    );
    store.write(&Product::Stack(pair.clone()), &path).unwrap();

    let read = store.read_stack(&path).unwrap();
    assert_eq!(read.master.meta.scene_id, "master");
    assert_eq!(read.slave.meta.scene_id, "slave");
    assert_eq!(read.master.data, pair.master.data);
    assert_eq!(read.slave.data, pair.slave.data);
    assert_eq!(read.master.meta.timestamp_us, Some(common::MASTER_TS));
    assert_eq!(read.slave.meta.timestamp_us, Some(common::SLAVE_TS));
}

#[test]
fn test_field_roundtrip_preserves_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("field.dsp");
    let store = ProductStore::new();

    let spacing = 14;
    let mut nodes = Vec::new();
    for az_index in 0..3 {
        for rg_index in 0..4 {
            let mut node = DisplacementNode::invalid(
                az_index,
                rg_index,
                (az_index * spacing + 7, rg_index * spacing + 7),
            );
            if (az_index + rg_index) % 2 == 0 {
                node.offset = (az_index as f64 * 0.5, rg_index as f64 * -0.25);
                node.velocity = 1.25;
                node.quality = 0.75;
                node.valid = true;
            }
            nodes.push(node);
        }
    }
    let field = DisplacementField::new(nodes, 3, 4, spacing, spacing, common::default_geo());

    store.write(&Product::Field(field.clone()), &path).unwrap();
    let read = match store.read(&path).unwrap() {
        Product::Field(f) => f,
        other => panic!("expected field, got {}", other.kind_name()),
    };

    assert_eq!(read.rows(), 3);
    assert_eq!(read.cols(), 4);
    assert_eq!(read.az_spacing, spacing);
    assert_eq!(read.geo, field.geo);
    for (a, b) in field.nodes().iter().zip(read.nodes()) {
        assert_eq!(a.valid, b.valid);
        assert_eq!(a.position, b.position);
        assert!((a.offset.0 - b.offset.0).abs() < 1e-6);
        assert!((a.offset.1 - b.offset.1).abs() < 1e-6);
        assert!((a.velocity - b.velocity).abs() < 1e-6);
        assert!((a.quality - b.quality).abs() < 1e-6);
    }
}

#[test]
fn test_wrong_magic_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.dsp");
    fs::write(&path, b"LUCAM-RECORDER and then some padding to pass the size check......").unwrap();

    let store = ProductStore::new();
    assert!(matches!(
        store.read(&path),
        Err(DriftscanError::InvalidProduct(_))
    ));
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.dsp");
    let store = ProductStore::new();

    let scene = common::textured_scene(16, 16, 1, "s", common::MASTER_TS);
    store.write(&Product::Scene(scene), &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(
        store.read(&path),
        Err(DriftscanError::InvalidProduct(_))
    ));
}

#[test]
fn test_tiny_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.dsp");
    fs::write(&path, b"DSP").unwrap();

    let store = ProductStore::new();
    assert!(matches!(
        store.read(&path),
        Err(DriftscanError::InvalidProduct(_))
    ));
}

#[test]
fn test_kind_mismatch_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.dsp");
    let store = ProductStore::new();

    let scene = common::textured_scene(16, 16, 1, "s", common::MASTER_TS);
    store.write(&Product::Scene(scene), &path).unwrap();

    assert!(matches!(
        store.read_stack(&path),
        Err(DriftscanError::InvalidProduct(_))
    ));
}

#[test]
fn test_peek_header_reports_kind_and_extent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.dsp");
    let store = ProductStore::new();

    let pair = ScenePair::new(
        common::textured_scene(24, 36, 2, "m", common::MASTER_TS),
        common::textured_scene(24, 36, 3, "s", common::SLAVE_TS),
    );
    store.write(&Product::Stack(pair), &path).unwrap();

    let header = peek_header(&path).unwrap();
    assert_eq!(header.kind_name(), "stack");
    assert_eq!((header.width, header.height), (36, 24));
    assert_eq!(header.band_count, 2);
    assert_eq!(header.scene_ids[0], "m");
    assert_eq!(header.scene_ids[1], "s");
    assert_eq!(header.timestamps[1], Some(common::SLAVE_TS));
}
