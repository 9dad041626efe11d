use ndarray::Array2;

use crate::raster::{GeoTransform, RasterGrid, SceneMeta};

/// Pixel-center row/col of lattice node `index` at the given spacing.
pub fn lattice_position(index: usize, spacing: usize) -> usize {
    index * spacing + spacing / 2
}

/// Lattice dimension covering `extent` pixels at the given spacing.
pub fn lattice_len(extent: usize, spacing: usize) -> usize {
    extent.div_ceil(spacing)
}

/// One displacement estimate on the tracking lattice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplacementNode {
    pub az_index: usize,
    pub rg_index: usize,
    /// Pixel-center position (row, col) in the tracked scene.
    pub position: (usize, usize),
    /// Estimated offset in pixels, (Δazimuth, Δrange), sub-pixel resolution.
    pub offset: (f64, f64),
    /// Ground velocity magnitude in meters/day, set by unit conversion.
    pub velocity: f64,
    /// Peak normalized cross-correlation in [0, 1].
    pub quality: f64,
    pub valid: bool,
}

impl DisplacementNode {
    /// A node that was never (or unsuccessfully) correlated.
    pub fn invalid(az_index: usize, rg_index: usize, position: (usize, usize)) -> Self {
        Self {
            az_index,
            rg_index,
            position,
            offset: (0.0, 0.0),
            velocity: 0.0,
            quality: 0.0,
            valid: false,
        }
    }
}

/// Regular lattice of displacement estimates over an image pair.
///
/// Row-major node storage; dimensions are ceil(image extent / spacing)
/// in each axis.
#[derive(Clone, Debug)]
pub struct DisplacementField {
    nodes: Vec<DisplacementNode>,
    rows: usize,
    cols: usize,
    pub az_spacing: usize,
    pub rg_spacing: usize,
    /// Georeference of the tracked scene (pixel resolution, not lattice).
    pub geo: GeoTransform,
}

impl DisplacementField {
    pub fn new(
        nodes: Vec<DisplacementNode>,
        rows: usize,
        cols: usize,
        az_spacing: usize,
        rg_spacing: usize,
        geo: GeoTransform,
    ) -> Self {
        debug_assert_eq!(nodes.len(), rows * cols);
        Self {
            nodes,
            rows,
            cols,
            az_spacing,
            rg_spacing,
            geo,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, row: usize, col: usize) -> &DisplacementNode {
        &self.nodes[row * self.cols + col]
    }

    pub fn node_mut(&mut self, row: usize, col: usize) -> &mut DisplacementNode {
        &mut self.nodes[row * self.cols + col]
    }

    pub fn nodes(&self) -> &[DisplacementNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [DisplacementNode] {
        &mut self.nodes
    }

    pub fn iter_valid(&self) -> impl Iterator<Item = &DisplacementNode> {
        self.nodes.iter().filter(|n| n.valid)
    }

    pub fn valid_fraction(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let valid = self.nodes.iter().filter(|n| n.valid).count();
        valid as f64 / self.nodes.len() as f64
    }

    /// Georeference of the node lattice itself (one pixel per node).
    pub fn lattice_geo(&self) -> GeoTransform {
        self.geo.scaled(
            (self.az_spacing / 2) as f64,
            (self.rg_spacing / 2) as f64,
            self.az_spacing as f64,
            self.rg_spacing as f64,
        )
    }

    /// Render the velocity magnitudes as a raster at node resolution.
    /// Invalid nodes become NaN samples with a false mask bit.
    pub fn velocity_raster(&self) -> RasterGrid {
        let mut data = Array2::<f32>::zeros((self.rows, self.cols));
        let mut mask = Array2::<bool>::from_elem((self.rows, self.cols), false);
        for node in &self.nodes {
            if node.valid {
                data[[node.az_index, node.rg_index]] = node.velocity as f32;
                mask[[node.az_index, node.rg_index]] = true;
            } else {
                data[[node.az_index, node.rg_index]] = f32::NAN;
            }
        }
        RasterGrid {
            data,
            geo: self.lattice_geo(),
            mask: Some(mask),
            meta: SceneMeta::new("velocity"),
        }
    }
}
