use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{DriftscanError, Result};

/// Six-coefficient affine georeference transform (GDAL coefficient order).
///
/// Maps (row, col) pixel positions to projected ground coordinates in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub origin_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Axis-aligned transform with the given origin and pixel size.
    /// `pixel_height` is typically negative (rows grow southward).
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            rotation_x: 0.0,
            origin_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    /// Map a fractional (row, col) pixel position to ground coordinates.
    pub fn pixel_to_ground(&self, row: f64, col: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.rotation_x;
        let y = self.origin_y + col * self.rotation_y + row * self.pixel_height;
        (x, y)
    }

    /// Inverse mapping from ground coordinates to a fractional (row, col).
    ///
    /// Fails if the transform is singular (zero-area pixels).
    pub fn ground_to_pixel(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det.abs() < f64::EPSILON {
            return Err(DriftscanError::Input(
                "georeference transform is singular".into(),
            ));
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (dx * self.pixel_height - dy * self.rotation_x) / det;
        let row = (dy * self.pixel_width - dx * self.rotation_y) / det;
        Ok((row, col))
    }

    /// Ground meters traversed per single-pixel step, as (azimuth, range) =
    /// (per row, per column).
    pub fn ground_spacing(&self) -> (f64, f64) {
        let azimuth = (self.rotation_x * self.rotation_x + self.pixel_height * self.pixel_height)
            .sqrt();
        let range =
            (self.pixel_width * self.pixel_width + self.rotation_y * self.rotation_y).sqrt();
        (azimuth, range)
    }

    /// The same transform re-anchored at pixel (row, col) of the original grid.
    pub fn translated(&self, row: usize, col: usize) -> Self {
        let (x, y) = self.pixel_to_ground(row as f64, col as f64);
        Self {
            origin_x: x,
            origin_y: y,
            ..*self
        }
    }

    /// The same transform with its origin moved by (dx, dy) ground meters.
    pub fn shifted_origin(&self, dx: f64, dy: f64) -> Self {
        Self {
            origin_x: self.origin_x + dx,
            origin_y: self.origin_y + dy,
            ..*self
        }
    }

    /// A transform whose pixel step is `az_step` rows / `rg_step` cols of this
    /// one, anchored at pixel (row0, col0). Used for derived lattice grids.
    pub fn scaled(&self, row0: f64, col0: f64, az_step: f64, rg_step: f64) -> Self {
        let (x, y) = self.pixel_to_ground(row0, col0);
        Self {
            origin_x: x,
            pixel_width: self.pixel_width * rg_step,
            rotation_x: self.rotation_x * az_step,
            origin_y: y,
            rotation_y: self.rotation_y * rg_step,
            pixel_height: self.pixel_height * az_step,
        }
    }
}

/// Per-scene acquisition metadata carried alongside the samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneMeta {
    pub scene_id: String,
    /// Acquisition time in microseconds since the Unix epoch.
    pub timestamp_us: Option<u64>,
}

impl SceneMeta {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            timestamp_us: None,
        }
    }

    pub fn with_timestamp(scene_id: impl Into<String>, timestamp_us: u64) -> Self {
        Self {
            scene_id: scene_id.into(),
            timestamp_us: Some(timestamp_us),
        }
    }
}

/// A single-band georeferenced sample grid, the common currency between
/// pipeline stages. Samples are f32, row-major, shape = (height, width).
#[derive(Clone, Debug)]
pub struct RasterGrid {
    pub data: Array2<f32>,
    pub geo: GeoTransform,
    /// Per-pixel validity; `None` means every sample is valid.
    pub mask: Option<Array2<bool>>,
    pub meta: SceneMeta,
}

impl RasterGrid {
    pub fn new(data: Array2<f32>, geo: GeoTransform, meta: SceneMeta) -> Result<Self> {
        let (h, w) = data.dim();
        if h == 0 || w == 0 {
            return Err(DriftscanError::Input(format!(
                "raster '{}' has empty extent {}x{}",
                meta.scene_id, w, h
            )));
        }
        Ok(Self {
            data,
            geo,
            mask: None,
            meta,
        })
    }

    pub fn with_mask(mut self, mask: Array2<bool>) -> Result<Self> {
        if mask.dim() != self.data.dim() {
            return Err(DriftscanError::Input(format!(
                "mask shape {:?} does not match raster shape {:?}",
                mask.dim(),
                self.data.dim()
            )));
        }
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.height() && (col as usize) < self.width()
    }

    /// Whether the sample at (row, col) is valid per the mask.
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        match &self.mask {
            Some(mask) => mask[[row, col]],
            None => true,
        }
    }

    pub fn same_shape(&self, other: &RasterGrid) -> bool {
        self.data.dim() == other.data.dim()
    }

    /// Ground-coordinate bounding box of the pixel extent, as
    /// (min_x, min_y, max_x, max_y).
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let h = self.height() as f64;
        let w = self.width() as f64;
        let corners = [
            self.geo.pixel_to_ground(0.0, 0.0),
            self.geo.pixel_to_ground(0.0, w),
            self.geo.pixel_to_ground(h, 0.0),
            self.geo.pixel_to_ground(h, w),
        ];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }

    /// Epoch separation in days between two acquisitions.
    ///
    /// Always the magnitude; pair order fixes the displacement sign, not
    /// the baseline length. Fails if either timestamp is missing or the
    /// two are identical.
    pub fn separation_days(&self, other: &RasterGrid) -> Result<f64> {
        let t0 = self.meta.timestamp_us.ok_or_else(|| {
            DriftscanError::Input(format!(
                "scene '{}' has no acquisition timestamp",
                self.meta.scene_id
            ))
        })?;
        let t1 = other.meta.timestamp_us.ok_or_else(|| {
            DriftscanError::Input(format!(
                "scene '{}' has no acquisition timestamp",
                other.meta.scene_id
            ))
        })?;
        if t0 == t1 {
            return Err(DriftscanError::Input(
                "acquisition epochs are identical; velocity is undefined".into(),
            ));
        }
        let dt = t1.abs_diff(t0) as f64;
        Ok(dt / crate::consts::MICROS_PER_DAY)
    }
}
