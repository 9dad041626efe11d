use driftscan_core::field::{DisplacementField, DisplacementNode};
use driftscan_core::track::{fill_holes, spatial_average};

mod common;

/// Build a field where `valid` carries (offset, quality) per node and
/// `None` marks holes.
fn build_field(rows: usize, cols: usize, spec: &[Option<((f64, f64), f64)>]) -> DisplacementField {
    assert_eq!(spec.len(), rows * cols);
    let spacing = 14;
    let mut nodes = Vec::with_capacity(spec.len());
    for (i, entry) in spec.iter().enumerate() {
        let az_index = i / cols;
        let rg_index = i % cols;
        let mut node = DisplacementNode::invalid(
            az_index,
            rg_index,
            (az_index * spacing + 7, rg_index * spacing + 7),
        );
        if let Some((offset, quality)) = entry {
            node.offset = *offset;
            node.quality = *quality;
            node.valid = true;
        }
        nodes.push(node);
    }
    DisplacementField::new(nodes, rows, cols, spacing, spacing, common::default_geo())
}

#[test]
fn test_hole_filling_uses_distance_weighted_neighbors() {
    // A hole at the center of a 3x3 ring of valid nodes.
    let v = Some(((2.0, -1.0), 0.8));
    let field = build_field(
        3,
        3,
        &[v, v, v, v, None, v, v, v, v],
    );

    let filled = fill_holes(&field, 2);
    let center = filled.node(1, 1);
    assert!(center.valid);
    assert!((center.offset.0 - 2.0).abs() < 1e-9);
    assert!((center.offset.1 + 1.0).abs() < 1e-9);
    assert!((center.quality - 0.8).abs() < 1e-9);
}

#[test]
fn test_hole_filling_weights_closer_neighbors_higher() {
    // One neighbor at distance 1, one at distance 2, different offsets.
    let field = build_field(
        1,
        4,
        &[
            None,
            Some(((3.0, 0.0), 1.0)),
            Some(((6.0, 0.0), 1.0)),
            None,
        ],
    );

    let filled = fill_holes(&field, 2);
    let hole = filled.node(0, 0);
    assert!(hole.valid);
    // Weights 1 and 1/2: (3*1 + 6*0.5) / 1.5 = 4.
    assert!((hole.offset.0 - 4.0).abs() < 1e-9, "got {}", hole.offset.0);

    // Index 3 sees (0,2) at distance 1 and (0,1) at distance 2.
    let far = filled.node(0, 3);
    assert!(far.valid);
    assert!((far.offset.0 - 5.0).abs() < 1e-9, "got {}", far.offset.0);
}

#[test]
fn test_hole_filling_leaves_isolated_holes_invalid() {
    let field = build_field(
        1,
        5,
        &[Some(((1.0, 1.0), 0.9)), None, None, None, None],
    );

    let filled = fill_holes(&field, 1);
    assert!(filled.node(0, 1).valid, "adjacent hole should fill");
    assert!(!filled.node(0, 3).valid, "distant hole must stay invalid");
    assert!(!filled.node(0, 4).valid, "distant hole must stay invalid");
}

#[test]
fn test_hole_filling_never_alters_valid_nodes() {
    let a = Some(((1.0, 2.0), 0.5));
    let b = Some(((-3.0, 4.0), 0.9));
    let field = build_field(2, 2, &[a, None, None, b]);

    let filled = fill_holes(&field, 3);
    assert_eq!(*filled.node(0, 0), *field.node(0, 0));
    assert_eq!(*filled.node(1, 1), *field.node(1, 1));
}

#[test]
fn test_zero_radius_is_a_no_op() {
    let field = build_field(1, 3, &[Some(((1.0, 0.0), 1.0)), None, None]);
    let filled = fill_holes(&field, 0);
    for (before, after) in field.nodes().iter().zip(filled.nodes()) {
        assert_eq!(before, after);
    }
}

#[test]
fn test_spatial_average_is_the_boxed_mean_of_valid_nodes() {
    let field = build_field(
        1,
        3,
        &[
            Some(((1.0, 10.0), 1.0)),
            Some(((2.0, 20.0), 1.0)),
            Some(((6.0, 30.0), 1.0)),
        ],
    );

    let smoothed = spatial_average(&field, 3);
    // Node (0,1) averages all three.
    assert!((smoothed.node(0, 1).offset.0 - 3.0).abs() < 1e-9);
    assert!((smoothed.node(0, 1).offset.1 - 20.0).abs() < 1e-9);
    // Edge node (0,0) averages itself and its right neighbor.
    assert!((smoothed.node(0, 0).offset.0 - 1.5).abs() < 1e-9);
}

#[test]
fn test_spatial_average_skips_invalid_nodes_entirely() {
    let field = build_field(
        1,
        3,
        &[
            Some(((1.0, 0.0), 1.0)),
            None,
            Some(((5.0, 0.0), 1.0)),
        ],
    );

    let smoothed = spatial_average(&field, 3);
    // The hole contributes nothing and receives nothing.
    assert!(!smoothed.node(0, 1).valid);
    assert_eq!(smoothed.node(0, 1).offset, (0.0, 0.0));
    // Valid neighbors average over valid nodes only.
    assert!((smoothed.node(0, 0).offset.0 - 3.0).abs() < 1e-9);
    assert!((smoothed.node(0, 2).offset.0 - 3.0).abs() < 1e-9);
}

#[test]
fn test_isolated_valid_node_is_unchanged_by_averaging() {
    let field = build_field(3, 3, &[
        None, None, None,
        None, Some(((2.5, -1.5), 0.7)), None,
        None, None, None,
    ]);

    let smoothed = spatial_average(&field, 3);
    assert_eq!(*smoothed.node(1, 1), *field.node(1, 1));
}
