use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::{
    MAX_SEARCH_MARGIN, MIN_SEARCH_MARGIN, MIN_VALID_FRACTION, PARALLEL_NODE_THRESHOLD,
    SEARCH_GUARD,
};
use crate::error::{DriftscanError, Result};
use crate::field::{lattice_len, lattice_position, DisplacementField, DisplacementNode};
use crate::pipeline::config::TrackingConfig;
use crate::raster::RasterGrid;

mod correlation;
mod filter;

pub use correlation::{CorrelationWindow, PeakEstimate};
pub use filter::{fill_holes, spatial_average};

/// A lattice node candidate before correlation.
#[derive(Clone, Copy, Debug)]
pub struct NodeSeed {
    pub az_index: usize,
    pub rg_index: usize,
    /// Pixel-center position (row, col).
    pub position: (usize, usize),
    /// Whether the full search area (window, margin and guard) fits inside
    /// the image. Border nodes that do not fit are never correlated.
    pub usable: bool,
}

/// Lay a regular node lattice over an image extent.
///
/// `pad` is the extra border each search window needs beyond the reference
/// patch (search margin plus interpolation guard). Returns the seeds in
/// row-major order together with the lattice dimensions.
pub fn node_lattice(
    height: usize,
    width: usize,
    az_spacing: usize,
    rg_spacing: usize,
    window_height: usize,
    window_width: usize,
    pad: usize,
) -> (Vec<NodeSeed>, usize, usize) {
    let rows = lattice_len(height, az_spacing);
    let cols = lattice_len(width, rg_spacing);
    let half_h = (window_height / 2) as i64;
    let half_w = (window_width / 2) as i64;
    let pad = pad as i64;

    let mut seeds = Vec::with_capacity(rows * cols);
    for az_index in 0..rows {
        let row = lattice_position(az_index, az_spacing);
        let top = row as i64 - half_h;
        let row_fits =
            top - pad >= 0 && top + window_height as i64 + pad <= height as i64;
        for rg_index in 0..cols {
            let col = lattice_position(rg_index, rg_spacing);
            let left = col as i64 - half_w;
            let col_fits =
                left - pad >= 0 && left + window_width as i64 + pad <= width as i64;
            seeds.push(NodeSeed {
                az_index,
                rg_index,
                position: (row, col),
                usable: row_fits && col_fits,
            });
        }
    }
    (seeds, rows, cols)
}

/// Estimates a dense displacement field between a coregistered image pair
/// by patch correlation on a regular lattice, then filters, fills and
/// smooths the field and converts it to ground velocity.
pub struct OffsetTracker {
    config: TrackingConfig,
}

impl OffsetTracker {
    pub fn new(config: &TrackingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Slave search margin in pixels for the given epoch separation.
    /// The plausible-motion ceiling bounds the scan, clamped so a long
    /// baseline cannot make the search explode.
    fn search_margin(&self, separation_days: f64, ground_spacing: (f64, f64)) -> usize {
        let finest = ground_spacing.0.min(ground_spacing.1);
        let pixels = (self.config.max_velocity * separation_days / finest).ceil() as usize;
        pixels.clamp(MIN_SEARCH_MARGIN, MAX_SEARCH_MARGIN)
    }

    pub fn track(&self, master: &RasterGrid, slave: &RasterGrid) -> Result<DisplacementField> {
        if !master.same_shape(slave) {
            return Err(DriftscanError::DimensionMismatch {
                master: master.data.dim(),
                slave: slave.data.dim(),
            });
        }
        let (height, width) = master.data.dim();
        let cfg = &self.config;
        if cfg.window_height > height || cfg.window_width > width {
            return Err(DriftscanError::Config(format!(
                "registration window {}x{} exceeds image extent {}x{}",
                cfg.window_width, cfg.window_height, width, height
            )));
        }

        let separation_days = master.separation_days(slave)?;
        let spacing = master.geo.ground_spacing();
        if spacing.0 <= 0.0 || spacing.1 <= 0.0 {
            return Err(DriftscanError::Input(
                "georeference has zero ground spacing".into(),
            ));
        }
        let margin = self.search_margin(separation_days, spacing);
        let pad = margin + SEARCH_GUARD;

        let (seeds, rows, cols) = node_lattice(
            height,
            width,
            cfg.grid_azimuth_spacing,
            cfg.grid_range_spacing,
            cfg.window_height,
            cfg.window_width,
            pad,
        );
        debug!(rows, cols, margin, separation_days, "tracking lattice ready");

        let evaluate = |seed: &NodeSeed| -> DisplacementNode {
            let mut node = DisplacementNode::invalid(seed.az_index, seed.rg_index, seed.position);
            if !seed.usable || !search_area_valid(master, slave, seed, cfg, pad) {
                return node;
            }
            let window = CorrelationWindow::new(
                &master.data,
                &slave.data,
                seed.position,
                cfg.window_width,
                cfg.window_height,
                margin,
                cfg.oversampling,
                cfg.kernel,
            );
            let peak = window.evaluate();
            node.quality = peak.quality;
            if peak.quality >= cfg.correlation_threshold {
                node.offset = peak.offset;
                node.valid = true;
            }
            node
        };

        let nodes: Vec<DisplacementNode> = if seeds.len() >= PARALLEL_NODE_THRESHOLD {
            seeds.par_iter().map(evaluate).collect()
        } else {
            seeds.iter().map(evaluate).collect()
        };

        let mut field = DisplacementField::new(
            nodes,
            rows,
            cols,
            cfg.grid_azimuth_spacing,
            cfg.grid_range_spacing,
            master.geo,
        );
        let measured_fraction = field.valid_fraction();

        if cfg.fill_holes && cfg.hole_fill_radius > 0 {
            field = fill_holes(&field, cfg.hole_fill_radius);
        }
        if cfg.spatial_average && cfg.average_box_size > 1 {
            field = spatial_average(&field, cfg.average_box_size);
        }
        self.convert_to_velocity(&mut field, separation_days, spacing);

        let valid_fraction = field.valid_fraction();
        info!(
            nodes = field.len(),
            measured_fraction, valid_fraction, "offset tracking complete"
        );
        if valid_fraction < MIN_VALID_FRACTION {
            return Err(DriftscanError::Correlation {
                valid_fraction,
                minimum: MIN_VALID_FRACTION,
            });
        }
        Ok(field)
    }

    /// Pixel offsets to ground velocity; implausibly fast nodes are
    /// invalidated outright rather than clamped.
    fn convert_to_velocity(
        &self,
        field: &mut DisplacementField,
        separation_days: f64,
        spacing: (f64, f64),
    ) {
        for node in field.nodes_mut() {
            if !node.valid {
                continue;
            }
            let d_az = node.offset.0 * spacing.0;
            let d_rg = node.offset.1 * spacing.1;
            let velocity = (d_az * d_az + d_rg * d_rg).sqrt() / separation_days;
            if velocity > self.config.max_velocity {
                node.valid = false;
                node.velocity = 0.0;
            } else {
                node.velocity = velocity;
            }
        }
    }
}

/// A node is only correlated when every sample its search area touches is
/// valid in both scenes.
fn search_area_valid(
    master: &RasterGrid,
    slave: &RasterGrid,
    seed: &NodeSeed,
    cfg: &TrackingConfig,
    pad: usize,
) -> bool {
    if master.mask.is_none() && slave.mask.is_none() {
        return true;
    }
    let top = seed.position.0 - cfg.window_height / 2;
    let left = seed.position.1 - cfg.window_width / 2;

    for row in top..top + cfg.window_height {
        for col in left..left + cfg.window_width {
            if !master.is_valid(row, col) {
                return false;
            }
        }
    }
    for row in top - pad..top + cfg.window_height + pad {
        for col in left - pad..left + cfg.window_width + pad {
            if !slave.is_valid(row, col) {
                return false;
            }
        }
    }
    true
}
