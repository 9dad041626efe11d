use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_AVERAGE_BOX_SIZE, DEFAULT_CORRELATION_THRESHOLD, DEFAULT_DEM, DEFAULT_GRID_SPACING,
    DEFAULT_HOLE_FILL_RADIUS, DEFAULT_MAX_VELOCITY, DEFAULT_OVERSAMPLING,
    DEFAULT_TERRAIN_PIXEL_SPACING, DEFAULT_WINDOW_SIZE,
};
use crate::error::{DriftscanError, Result};
use crate::resample::ResamplingKernel;

/// Full pipeline configuration: constructed once at run start, read-only
/// thereafter. Loadable from TOML; every section has defaults matching the
/// standard GRD offset-tracking parameterization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub master: PathBuf,
    pub slave: PathBuf,
    pub output_dir: PathBuf,
    /// Prefix for every persisted artifact name.
    #[serde(default = "default_run_id")]
    pub run_id: String,
    /// Region of interest as a WKT POLYGON.
    pub region: String,
    #[serde(default)]
    pub orbit: OrbitConfig,
    #[serde(default)]
    pub coregistration: CoregistrationConfig,
    #[serde(default)]
    pub subset: SubsetConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
}

fn default_run_id() -> String {
    "run".to_string()
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.run_id.is_empty() {
            return Err(DriftscanError::Config("run_id must not be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(DriftscanError::Config(
                "a region polygon is required".into(),
            ));
        }
        self.tracking.validate()?;
        self.terrain.validate()?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrbitConfig {
    /// Apply the orbit-file geolocation refinement.
    pub apply: bool,
    /// Residual geolocation correction in ground meters (x, y).
    pub residual_m: (f64, f64),
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            apply: true,
            residual_m: (0.0, 0.0),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoregistrationConfig {
    pub dem: String,
    pub kernel: ResamplingKernel,
    /// Refine the alignment with an FFT cross-correlation estimate.
    pub xcorr: bool,
    /// Mask pixels without DEM coverage instead of failing on them.
    pub mask_no_elevation: bool,
}

impl Default for CoregistrationConfig {
    fn default() -> Self {
        Self {
            dem: DEFAULT_DEM.to_string(),
            kernel: ResamplingKernel::Bilinear,
            xcorr: true,
            mask_no_elevation: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubsetConfig {
    pub copy_metadata: bool,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            copy_metadata: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Node spacing along azimuth (rows), in pixels.
    pub grid_azimuth_spacing: usize,
    /// Node spacing along range (columns), in pixels.
    pub grid_range_spacing: usize,
    pub window_width: usize,
    pub window_height: usize,
    /// Sub-pixel oversampling factor for the correlation peak search.
    pub oversampling: usize,
    /// Minimum peak cross-correlation for a node to be kept, in [0, 1].
    pub correlation_threshold: f64,
    /// Plausible-motion ceiling in meters/day; faster nodes are discarded.
    pub max_velocity: f64,
    /// Box edge (in nodes) for the spatial-averaging pass.
    pub average_box_size: usize,
    /// Hole-filling neighbor radius in lattice steps.
    pub hole_fill_radius: usize,
    pub spatial_average: bool,
    pub fill_holes: bool,
    pub kernel: ResamplingKernel,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            grid_azimuth_spacing: DEFAULT_GRID_SPACING,
            grid_range_spacing: DEFAULT_GRID_SPACING,
            window_width: DEFAULT_WINDOW_SIZE,
            window_height: DEFAULT_WINDOW_SIZE,
            oversampling: DEFAULT_OVERSAMPLING,
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
            max_velocity: DEFAULT_MAX_VELOCITY,
            average_box_size: DEFAULT_AVERAGE_BOX_SIZE,
            hole_fill_radius: DEFAULT_HOLE_FILL_RADIUS,
            spatial_average: true,
            fill_holes: true,
            kernel: ResamplingKernel::Bicubic,
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid_azimuth_spacing == 0 || self.grid_range_spacing == 0 {
            return Err(DriftscanError::Config(
                "grid spacing must be positive".into(),
            ));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(DriftscanError::Config(
                "registration window must be positive".into(),
            ));
        }
        if self.oversampling == 0 {
            return Err(DriftscanError::Config(
                "oversampling factor must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(DriftscanError::Config(format!(
                "correlation threshold {} outside [0, 1]",
                self.correlation_threshold
            )));
        }
        if self.max_velocity <= 0.0 {
            return Err(DriftscanError::Config(format!(
                "max velocity {} must be positive",
                self.max_velocity
            )));
        }
        if self.average_box_size == 0 {
            return Err(DriftscanError::Config(
                "averaging box must be at least 1 node".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainConfig {
    pub dem: String,
    pub pixel_spacing_m: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            dem: DEFAULT_DEM.to_string(),
            pixel_spacing_m: DEFAULT_TERRAIN_PIXEL_SPACING,
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pixel_spacing_m <= 0.0 {
            return Err(DriftscanError::Config(format!(
                "terrain pixel spacing {} must be positive",
                self.pixel_spacing_m
            )));
        }
        Ok(())
    }
}
