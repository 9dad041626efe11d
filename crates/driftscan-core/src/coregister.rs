use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;
use tracing::{debug, info};

use crate::dem::{DemCatalog, DemDescriptor};
use crate::error::{DriftscanError, Result};
use crate::pipeline::config::CoregistrationConfig;
use crate::pipeline::types::ScenePair;
use crate::raster::RasterGrid;
use crate::resample::ResamplingKernel;

/// Geometrically aligns the slave scene onto the master grid.
pub trait CoregistrationService: Send + Sync {
    fn align(
        &self,
        master: &RasterGrid,
        slave: &RasterGrid,
        config: &CoregistrationConfig,
    ) -> Result<ScenePair>;
}

/// DEM-checked coregistration with an optional global FFT
/// cross-correlation refinement of the alignment.
pub struct XcorrCoregistration {
    catalog: DemCatalog,
}

impl XcorrCoregistration {
    pub fn new() -> Self {
        Self {
            catalog: DemCatalog::builtin(),
        }
    }

    pub fn with_catalog(catalog: DemCatalog) -> Self {
        Self { catalog }
    }
}

impl Default for XcorrCoregistration {
    fn default() -> Self {
        Self::new()
    }
}

impl CoregistrationService for XcorrCoregistration {
    fn align(
        &self,
        master: &RasterGrid,
        slave: &RasterGrid,
        config: &CoregistrationConfig,
    ) -> Result<ScenePair> {
        if !master.same_shape(slave) {
            return Err(DriftscanError::DimensionMismatch {
                master: master.data.dim(),
                slave: slave.data.dim(),
            });
        }
        let dem = self.catalog.lookup(&config.dem)?;
        let covered = dem.covers(master.bounding_box());
        if !covered && !config.mask_no_elevation {
            return Err(DriftscanError::Coverage(format!(
                "DEM '{}' does not cover the scene and elevation masking is disabled",
                dem.name
            )));
        }

        let shift = if config.xcorr {
            estimate_global_shift(&master.data, &slave.data)?
        } else {
            (0.0, 0.0)
        };
        info!(dy = shift.0, dx = shift.1, xcorr = config.xcorr, "coregistration shift");

        let mut aligned_master = master.clone();
        let mut aligned_slave = resample_to_master(master, slave, shift, config.kernel);

        if !covered {
            debug!(dem = %dem.name, "masking samples without elevation");
            apply_elevation_mask(&mut aligned_master, dem);
            apply_elevation_mask(&mut aligned_slave, dem);
        }

        Ok(ScenePair::new(aligned_master, aligned_slave))
    }
}

/// Estimate the global (dy, dx) translation of `target` relative to
/// `reference` with FFT phase correlation: Hann window, normalized
/// cross-power spectrum, wrap-around peak and paraboloid refinement.
pub fn estimate_global_shift(
    reference: &Array2<f32>,
    target: &Array2<f32>,
) -> Result<(f64, f64)> {
    let (h, w) = reference.dim();
    if h != target.dim().0 || w != target.dim().1 {
        return Err(DriftscanError::Input(format!(
            "cross-correlation inputs differ: {}x{} vs {}x{}",
            w,
            h,
            target.dim().1,
            target.dim().0
        )));
    }

    let ref_fft = fft2d(&apply_hann(reference));
    let tgt_fft = fft2d(&apply_hann(target));
    let cross_power = normalized_cross_power(&ref_fft, &tgt_fft);
    let correlation = ifft2d(&cross_power);

    let (peak_row, peak_col) = find_peak(&correlation);

    // Wrap-around: peaks past the midpoint are negative shifts.
    let dy = if peak_row > h / 2 {
        peak_row as f64 - h as f64
    } else {
        peak_row as f64
    };
    let dx = if peak_col > w / 2 {
        peak_col as f64 - w as f64
    } else {
        peak_col as f64
    };

    let (sub_dy, sub_dx) = refine_peak_paraboloid(&correlation, peak_row, peak_col);
    Ok((dy + sub_dy, dx + sub_dx))
}

/// Resample the slave onto the master grid, undoing the estimated shift.
/// Samples that fall outside the slave extent, or on invalid slave pixels,
/// are masked out.
fn resample_to_master(
    master: &RasterGrid,
    slave: &RasterGrid,
    shift: (f64, f64),
    kernel: ResamplingKernel,
) -> RasterGrid {
    let (h, w) = slave.data.dim();
    let mut data = Array2::<f32>::zeros((h, w));
    let mut mask = Array2::<bool>::from_elem((h, w), true);

    for row in 0..h {
        let src_y = row as f64 - shift.0;
        for col in 0..w {
            let src_x = col as f64 - shift.1;
            data[[row, col]] = kernel.sample(&slave.data, src_y, src_x);

            let nearest_r = src_y.round() as i64;
            let nearest_c = src_x.round() as i64;
            let inside = slave.in_bounds(nearest_r, nearest_c);
            mask[[row, col]] = inside
                && slave.is_valid(nearest_r as usize, nearest_c as usize);
        }
    }

    RasterGrid {
        data,
        geo: master.geo,
        mask: Some(mask),
        meta: slave.meta.clone(),
    }
}

/// AND the DEM's coverage into the scene mask.
fn apply_elevation_mask(scene: &mut RasterGrid, dem: &DemDescriptor) {
    let (h, w) = scene.data.dim();
    let mut mask = scene
        .mask
        .take()
        .unwrap_or_else(|| Array2::from_elem((h, w), true));
    for row in 0..h {
        for col in 0..w {
            if !mask[[row, col]] {
                continue;
            }
            let (x, y) = scene.geo.pixel_to_ground(row as f64 + 0.5, col as f64 + 0.5);
            mask[[row, col]] = dem.contains(x, y);
        }
    }
    scene.mask = Some(mask);
}

fn apply_hann(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        let wy = 0.5 * (1.0 - (std::f64::consts::TAU * row as f64 / h as f64).cos());
        for col in 0..w {
            let wx = 0.5 * (1.0 - (std::f64::consts::TAU * col as f64 / w as f64).cos());
            result[[row, col]] = data[[row, col]] * (wy * wx) as f32;
        }
    }
    result
}

/// 2D FFT: row-wise then column-wise.
fn fft2d(data: &Array2<f32>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft_forward(w);
    let fft_col = planner.plan_fft_forward(h);

    let mut result = Array2::<Complex<f64>>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            result[[row, col]] = Complex::new(data[[row, col]] as f64, 0.0);
        }
    }

    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| result[[row, c]]).collect();
        fft_row.process(&mut row_data);
        for col in 0..w {
            result[[row, col]] = row_data[col];
        }
    }
    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| result[[r, col]]).collect();
        fft_col.process(&mut col_data);
        for row in 0..h {
            result[[row, col]] = col_data[row];
        }
    }
    result
}

fn ifft2d(data: &Array2<Complex<f64>>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let ifft_row = planner.plan_fft_inverse(w);
    let ifft_col = planner.plan_fft_inverse(h);

    let mut work = data.clone();
    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| work[[r, col]]).collect();
        ifft_col.process(&mut col_data);
        for row in 0..h {
            work[[row, col]] = col_data[row];
        }
    }
    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| work[[row, c]]).collect();
        ifft_row.process(&mut row_data);
        for col in 0..w {
            work[[row, col]] = row_data[col];
        }
    }

    let scale = 1.0 / (h * w) as f64;
    let mut result = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            result[[row, col]] = work[[row, col]].re * scale;
        }
    }
    result
}

fn normalized_cross_power(
    ref_fft: &Array2<Complex<f64>>,
    tgt_fft: &Array2<Complex<f64>>,
) -> Array2<Complex<f64>> {
    let (h, w) = ref_fft.dim();
    let mut result = Array2::<Complex<f64>>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let cross = ref_fft[[row, col]] * tgt_fft[[row, col]].conj();
            let mag = cross.norm();
            result[[row, col]] = if mag > 1e-12 {
                cross / mag
            } else {
                Complex::new(0.0, 0.0)
            };
        }
    }
    result
}

fn find_peak(data: &Array2<f64>) -> (usize, usize) {
    let (h, w) = data.dim();
    let mut best_row = 0;
    let mut best_col = 0;
    let mut best_val = f64::NEG_INFINITY;
    for row in 0..h {
        for col in 0..w {
            if data[[row, col]] > best_val {
                best_val = data[[row, col]];
                best_row = row;
                best_col = col;
            }
        }
    }
    (best_row, best_col)
}

/// Parabola fit through the peak's 3x3 neighborhood, one axis at a time.
/// Skipped at the array edge.
fn refine_peak_paraboloid(
    correlation: &Array2<f64>,
    peak_row: usize,
    peak_col: usize,
) -> (f64, f64) {
    let (h, w) = correlation.dim();
    if peak_row == 0 || peak_row >= h - 1 || peak_col == 0 || peak_col >= w - 1 {
        return (0.0, 0.0);
    }

    let y_prev = correlation[[peak_row - 1, peak_col]];
    let y_curr = correlation[[peak_row, peak_col]];
    let y_next = correlation[[peak_row + 1, peak_col]];
    let delta_row = if (y_prev - 2.0 * y_curr + y_next).abs() > 1e-12 {
        (y_prev - y_next) / (2.0 * (y_prev - 2.0 * y_curr + y_next))
    } else {
        0.0
    };

    let x_prev = correlation[[peak_row, peak_col - 1]];
    let x_curr = correlation[[peak_row, peak_col]];
    let x_next = correlation[[peak_row, peak_col + 1]];
    let delta_col = if (x_prev - 2.0 * x_curr + x_next).abs() > 1e-12 {
        (x_prev - x_next) / (2.0 * (x_prev - 2.0 * x_curr + x_next))
    } else {
        0.0
    };

    (delta_row.clamp(-0.5, 0.5), delta_col.clamp(-0.5, 0.5))
}
