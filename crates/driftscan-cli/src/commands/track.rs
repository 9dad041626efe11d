use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use driftscan_core::consts::{
    DEFAULT_AVERAGE_BOX_SIZE, DEFAULT_CORRELATION_THRESHOLD, DEFAULT_GRID_SPACING,
    DEFAULT_HOLE_FILL_RADIUS, DEFAULT_MAX_VELOCITY, DEFAULT_OVERSAMPLING, DEFAULT_WINDOW_SIZE,
};
use driftscan_core::io::ProductStore;
use driftscan_core::pipeline::config::TrackingConfig;
use driftscan_core::pipeline::types::Product;
use driftscan_core::resample::ResamplingKernel;
use driftscan_core::track::OffsetTracker;

/// Offset-tracking tunables shared by `run` and `track`.
#[derive(Args)]
pub struct TrackingOpts {
    /// Tracking lattice spacing in pixels, both axes
    #[arg(long, default_value_t = DEFAULT_GRID_SPACING)]
    pub grid_spacing: usize,

    /// Registration window edge in pixels
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window: usize,

    /// Sub-pixel oversampling factor
    #[arg(long, default_value_t = DEFAULT_OVERSAMPLING)]
    pub oversampling: usize,

    /// Minimum peak cross-correlation to keep a node
    #[arg(long, default_value_t = DEFAULT_CORRELATION_THRESHOLD)]
    pub threshold: f64,

    /// Plausible-motion ceiling in meters/day
    #[arg(long, default_value_t = DEFAULT_MAX_VELOCITY)]
    pub max_velocity: f64,

    /// Box edge in nodes for spatial averaging
    #[arg(long, default_value_t = DEFAULT_AVERAGE_BOX_SIZE)]
    pub box_size: usize,

    /// Hole-filling radius in lattice steps
    #[arg(long, default_value_t = DEFAULT_HOLE_FILL_RADIUS)]
    pub hole_radius: usize,

    /// Disable the spatial-averaging pass
    #[arg(long)]
    pub no_spatial_average: bool,

    /// Disable hole filling
    #[arg(long)]
    pub no_fill_holes: bool,

    /// Use bilinear instead of bicubic patch interpolation
    #[arg(long)]
    pub bilinear: bool,
}

impl TrackingOpts {
    pub fn to_config(&self) -> TrackingConfig {
        TrackingConfig {
            grid_azimuth_spacing: self.grid_spacing,
            grid_range_spacing: self.grid_spacing,
            window_width: self.window,
            window_height: self.window,
            oversampling: self.oversampling,
            correlation_threshold: self.threshold,
            max_velocity: self.max_velocity,
            average_box_size: self.box_size,
            hole_fill_radius: self.hole_radius,
            spatial_average: !self.no_spatial_average,
            fill_holes: !self.no_fill_holes,
            kernel: if self.bilinear {
                ResamplingKernel::Bilinear
            } else {
                ResamplingKernel::Bicubic
            },
        }
    }
}

#[derive(Args)]
pub struct TrackArgs {
    /// Coregistered stack product (.dsp)
    pub stack: PathBuf,

    /// Output displacement-field product
    #[arg(short, long, default_value = "field.dsp")]
    pub output: PathBuf,

    #[command(flatten)]
    pub tracking: TrackingOpts,
}

pub fn run(args: &TrackArgs) -> Result<()> {
    let store = ProductStore::new();
    let pair = store.read_stack(&args.stack)?;

    let config = args.tracking.to_config();
    let tracker = OffsetTracker::new(&config)?;
    let field = tracker.track(&pair.master, &pair.slave)?;

    println!(
        "Tracked {} nodes ({}x{} lattice), {:.0}% valid",
        field.len(),
        field.cols(),
        field.rows(),
        field.valid_fraction() * 100.0
    );

    store.write(&Product::Field(field), &args.output)?;
    println!("Field saved to {}", args.output.display());
    Ok(())
}
