use ndarray::s;
use tracing::info;

use crate::error::{DriftscanError, Result};
use crate::geo::GeoRegion;
use crate::pipeline::types::ScenePair;
use crate::raster::RasterGrid;

/// Clip a coregistered pair to a geographic region.
///
/// The clip window is the region's bounding box mapped through the master
/// georeference and intersected with the image extent. A region that does
/// not intersect the scene fails with a coverage error; a clip never
/// produces an empty product.
pub fn subset(pair: &ScenePair, region: &GeoRegion, copy_metadata: bool) -> Result<ScenePair> {
    let scene = &pair.master;
    let (height, width) = scene.data.dim();
    let (min_x, min_y, max_x, max_y) = region.bounding_box();

    let corners = [
        (min_x, min_y),
        (min_x, max_y),
        (max_x, min_y),
        (max_x, max_y),
    ];
    let mut row_lo = f64::INFINITY;
    let mut row_hi = f64::NEG_INFINITY;
    let mut col_lo = f64::INFINITY;
    let mut col_hi = f64::NEG_INFINITY;
    for (x, y) in corners {
        let (row, col) = scene.geo.ground_to_pixel(x, y)?;
        row_lo = row_lo.min(row);
        row_hi = row_hi.max(row);
        col_lo = col_lo.min(col);
        col_hi = col_hi.max(col);
    }

    let row0 = row_lo.floor().max(0.0) as usize;
    let col0 = col_lo.floor().max(0.0) as usize;
    let row1 = (row_hi.ceil().min(height as f64)).max(0.0) as usize;
    let col1 = (col_hi.ceil().min(width as f64)).max(0.0) as usize;

    if row_hi < 0.0 || col_hi < 0.0 || row0 >= row1 || col0 >= col1 {
        return Err(DriftscanError::Coverage(
            "region does not intersect the scene extent".into(),
        ));
    }

    info!(
        rows = row1 - row0,
        cols = col1 - col0,
        row0,
        col0,
        "subset window resolved"
    );

    Ok(ScenePair::new(
        clip_scene(&pair.master, row0, row1, col0, col1, copy_metadata),
        clip_scene(&pair.slave, row0, row1, col0, col1, copy_metadata),
    ))
}

fn clip_scene(
    scene: &RasterGrid,
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
    copy_metadata: bool,
) -> RasterGrid {
    let data = scene.data.slice(s![row0..row1, col0..col1]).to_owned();
    let mask = scene
        .mask
        .as_ref()
        .map(|m| m.slice(s![row0..row1, col0..col1]).to_owned());

    let mut meta = scene.meta.clone();
    if !copy_metadata {
        // Acquisition epochs always survive a clip; velocity needs them.
        meta.scene_id = "subset".to_string();
    }

    RasterGrid {
        data,
        geo: scene.geo.translated(row0, col0),
        mask,
        meta,
    }
}
