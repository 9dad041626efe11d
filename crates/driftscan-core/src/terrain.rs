use ndarray::Array2;
use tracing::{debug, info};

use crate::dem::DemCatalog;
use crate::error::{DriftscanError, Result};
use crate::field::DisplacementField;
use crate::pipeline::config::TerrainConfig;
use crate::raster::{GeoTransform, RasterGrid, SceneMeta};

/// Orthorectifies a displacement field onto a ground-referenced grid.
pub trait TerrainCorrectionService: Send + Sync {
    fn correct(&self, field: &DisplacementField, config: &TerrainConfig) -> Result<RasterGrid>;
}

/// Projects the velocity lattice onto a north-up grid at the configured
/// spacing. Output cells are inverse-mapped into lattice coordinates and
/// interpolated from valid nodes only; cells with no valid support stay
/// masked out.
pub struct GroundProjection {
    catalog: DemCatalog,
}

impl GroundProjection {
    pub fn new() -> Self {
        Self {
            catalog: DemCatalog::builtin(),
        }
    }

    pub fn with_catalog(catalog: DemCatalog) -> Self {
        Self { catalog }
    }
}

impl Default for GroundProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainCorrectionService for GroundProjection {
    fn correct(&self, field: &DisplacementField, config: &TerrainConfig) -> Result<RasterGrid> {
        config.validate()?;
        let dem = self.catalog.lookup(&config.dem)?;

        let velocity = field.velocity_raster();
        let (min_x, min_y, max_x, max_y) = velocity.bounding_box();
        let spacing = config.pixel_spacing_m;
        if spacing < dem.posting_m {
            debug!(
                spacing_m = spacing,
                posting_m = dem.posting_m,
                "output spacing is finer than the DEM posting"
            );
        }

        let out_w = ((max_x - min_x) / spacing).ceil() as usize;
        let out_h = ((max_y - min_y) / spacing).ceil() as usize;
        if out_w == 0 || out_h == 0 {
            return Err(DriftscanError::Coverage(
                "displacement field footprint is smaller than one output pixel".into(),
            ));
        }

        let geo = GeoTransform::north_up(min_x, max_y, spacing, -spacing);
        let mut data = Array2::<f32>::from_elem((out_h, out_w), f32::NAN);
        let mut mask = Array2::<bool>::from_elem((out_h, out_w), false);

        for row in 0..out_h {
            for col in 0..out_w {
                let (x, y) = geo.pixel_to_ground(row as f64 + 0.5, col as f64 + 0.5);
                let (lr, lc) = velocity.geo.ground_to_pixel(x, y)?;
                if let Some(value) = masked_bilinear(&velocity, lr, lc) {
                    data[[row, col]] = value;
                    mask[[row, col]] = true;
                }
            }
        }

        info!(
            width = out_w,
            height = out_h,
            dem = %dem.name,
            spacing_m = spacing,
            "terrain correction complete"
        );

        Ok(RasterGrid {
            data,
            geo,
            mask: Some(mask),
            meta: SceneMeta::new("velocity_tc"),
        })
    }
}

/// Bilinear interpolation that skips invalid lattice nodes and
/// renormalizes the remaining weights. `None` when no valid node supports
/// the position.
fn masked_bilinear(raster: &RasterGrid, y: f64, x: f64) -> Option<f32> {
    let (h, w) = raster.data.dim();
    let y0 = y.floor() as i64;
    let x0 = x.floor() as i64;
    let fy = y - y0 as f64;
    let fx = x - x0 as f64;

    let mut acc = 0.0f64;
    let mut weight_sum = 0.0f64;
    for (dr, dc, weight) in [
        (0i64, 0i64, (1.0 - fy) * (1.0 - fx)),
        (0, 1, (1.0 - fy) * fx),
        (1, 0, fy * (1.0 - fx)),
        (1, 1, fy * fx),
    ] {
        let r = y0 + dr;
        let c = x0 + dc;
        if r < 0 || c < 0 || r >= h as i64 || c >= w as i64 {
            continue;
        }
        let (r, c) = (r as usize, c as usize);
        if !raster.is_valid(r, c) {
            continue;
        }
        acc += weight * raster.data[[r, c]] as f64;
        weight_sum += weight;
    }

    if weight_sum > 1e-12 {
        Some((acc / weight_sum) as f32)
    } else {
        None
    }
}
