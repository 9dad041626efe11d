use tracing::debug;

use crate::error::Result;
use crate::raster::RasterGrid;

/// Refines a scene's geolocation from precise orbit data. Pure and
/// deterministic for a given input scene.
pub trait OrbitService: Send + Sync {
    fn apply(&self, scene: &RasterGrid) -> Result<RasterGrid>;
}

/// Applies a fixed residual geolocation correction to the georeference
/// origin, standing in for a precise orbit-file solution.
pub struct ResidualOrbit {
    residual_m: (f64, f64),
}

impl ResidualOrbit {
    pub fn new(residual_m: (f64, f64)) -> Self {
        Self { residual_m }
    }
}

impl OrbitService for ResidualOrbit {
    fn apply(&self, scene: &RasterGrid) -> Result<RasterGrid> {
        let mut refined = scene.clone();
        refined.geo = scene
            .geo
            .shifted_origin(self.residual_m.0, self.residual_m.1);
        debug!(
            scene = %scene.meta.scene_id,
            dx_m = self.residual_m.0,
            dy_m = self.residual_m.1,
            "orbit residual applied"
        );
        Ok(refined)
    }
}
