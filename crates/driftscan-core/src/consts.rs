/// Minimum grid-node count to use Rayon parallelism for per-node correlation.
pub const PARALLEL_NODE_THRESHOLD: usize = 64;

/// Small epsilon guarding normalized-correlation denominators.
pub const EPSILON: f64 = 1e-10;

/// Minimum fraction of valid nodes a displacement field must retain after
/// filtering for the tracking stage to succeed.
pub const MIN_VALID_FRACTION: f64 = 0.10;

/// Lower clamp (pixels) on the slave search margin derived from max velocity.
pub const MIN_SEARCH_MARGIN: usize = 4;

/// Upper clamp (pixels) on the slave search margin derived from max velocity.
pub const MAX_SEARCH_MARGIN: usize = 32;

/// Extra border (pixels) a search window needs beyond the margin: one pixel
/// for the sub-pixel scan plus two for the outer bicubic taps.
pub const SEARCH_GUARD: usize = 3;

/// Microseconds per day, for epoch-separation arithmetic.
pub const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Default tracking-lattice spacing in pixels, both axes.
pub const DEFAULT_GRID_SPACING: usize = 14;

/// Default registration window edge length in pixels.
pub const DEFAULT_WINDOW_SIZE: usize = 64;

/// Default sub-pixel oversampling factor for the correlation peak search.
pub const DEFAULT_OVERSAMPLING: usize = 16;

/// Default minimum peak cross-correlation for a node to be kept.
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.1;

/// Default box edge (in nodes) for the spatial-averaging pass.
pub const DEFAULT_AVERAGE_BOX_SIZE: usize = 5;

/// Default plausible-motion ceiling in meters/day.
pub const DEFAULT_MAX_VELOCITY: f64 = 50.0;

/// Default hole-filling neighbor radius in lattice steps.
pub const DEFAULT_HOLE_FILL_RADIUS: usize = 10;

/// Default orthorectified output pixel spacing in meters.
pub const DEFAULT_TERRAIN_PIXEL_SPACING: f64 = 10.0;

/// Default DEM identifier for coregistration and terrain correction.
pub const DEFAULT_DEM: &str = "SRTM 3Sec";
