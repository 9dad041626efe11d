use ndarray::Array2;

use crate::consts::EPSILON;
use crate::resample::ResamplingKernel;

/// Result of evaluating one correlation window.
#[derive(Clone, Copy, Debug)]
pub struct PeakEstimate {
    /// (Δazimuth, Δrange) in pixels, slave relative to master.
    pub offset: (f64, f64),
    /// Peak normalized cross-correlation, clamped to [0, 1].
    pub quality: f64,
}

/// A single displacement-estimation unit: one reference patch from the
/// master matched against a larger search area in the slave, both centered
/// at the same pixel.
///
/// Two passes: an integer scan of the search margin, then a sub-pixel scan
/// at 1/oversampling steps within one pixel of the coarse peak, reading the
/// slave through an upsampled patch built with the configured kernel.
pub struct CorrelationWindow<'a> {
    master: &'a Array2<f32>,
    slave: &'a Array2<f32>,
    center: (usize, usize),
    width: usize,
    height: usize,
    margin: usize,
    oversampling: usize,
    kernel: ResamplingKernel,
}

impl<'a> CorrelationWindow<'a> {
    /// Caller guarantees the search area (margin plus guard pixels) fits
    /// inside both images; see the lattice construction in the tracker.
    pub fn new(
        master: &'a Array2<f32>,
        slave: &'a Array2<f32>,
        center: (usize, usize),
        width: usize,
        height: usize,
        margin: usize,
        oversampling: usize,
        kernel: ResamplingKernel,
    ) -> Self {
        Self {
            master,
            slave,
            center,
            width,
            height,
            margin,
            oversampling,
            kernel,
        }
    }

    pub fn evaluate(&self) -> PeakEstimate {
        let h = self.height;
        let w = self.width;
        let top = self.center.0 - h / 2;
        let left = self.center.1 - w / 2;
        let n = (h * w) as f64;

        // Mean-subtracted reference patch; a flat patch scores zero so the
        // threshold filter rejects it rather than dividing by zero.
        let mut reference = vec![0.0f64; h * w];
        let mut mean = 0.0f64;
        for p in 0..h {
            for q in 0..w {
                let v = self.master[[top + p, left + q]] as f64;
                reference[p * w + q] = v;
                mean += v;
            }
        }
        mean /= n;
        let mut ref_norm_sq = 0.0f64;
        for v in reference.iter_mut() {
            *v -= mean;
            ref_norm_sq += *v * *v;
        }
        if ref_norm_sq < EPSILON {
            return PeakEstimate {
                offset: (0.0, 0.0),
                quality: 0.0,
            };
        }
        let ref_norm = ref_norm_sq.sqrt();

        // Pass 1: integer scan over the search margin.
        let m = self.margin as i64;
        let mut best = f64::NEG_INFINITY;
        let mut best_dy = 0i64;
        let mut best_dx = 0i64;
        for dy in -m..=m {
            for dx in -m..=m {
                let mut sum = 0.0f64;
                let mut sum_sq = 0.0f64;
                let mut cross = 0.0f64;
                for p in 0..h {
                    let row = (top as i64 + p as i64 + dy) as usize;
                    for q in 0..w {
                        let col = (left as i64 + q as i64 + dx) as usize;
                        let s = self.slave[[row, col]] as f64;
                        sum += s;
                        sum_sq += s * s;
                        cross += reference[p * w + q] * s;
                    }
                }
                let score = normalized_score(cross, sum, sum_sq, n, ref_norm);
                if score > best {
                    best = score;
                    best_dy = dy;
                    best_dx = dx;
                }
            }
        }

        if self.oversampling <= 1 {
            return PeakEstimate {
                offset: (best_dy as f64, best_dx as f64),
                quality: best.clamp(0.0, 1.0),
            };
        }

        // Pass 2: upsample the slave search patch around the coarse peak and
        // re-scan at 1/oversampling steps within one pixel of it.
        let ov = self.oversampling;
        let up_rows = (h + 2) * ov + 1;
        let up_cols = (w + 2) * ov + 1;
        let base_row = (top as i64 + best_dy - 1) as f64;
        let base_col = (left as i64 + best_dx - 1) as f64;
        let step = 1.0 / ov as f64;

        let mut upsampled = Array2::<f64>::zeros((up_rows, up_cols));
        for i in 0..up_rows {
            let y = base_row + i as f64 * step;
            for j in 0..up_cols {
                let x = base_col + j as f64 * step;
                upsampled[[i, j]] = self.kernel.sample(self.slave, y, x) as f64;
            }
        }

        let ov_i = ov as i64;
        let mut fine_best = best;
        let mut fine_u = 0i64;
        let mut fine_v = 0i64;
        for u in -ov_i..=ov_i {
            for v in -ov_i..=ov_i {
                let mut sum = 0.0f64;
                let mut sum_sq = 0.0f64;
                let mut cross = 0.0f64;
                for p in 0..h {
                    let i = ((p + 1) as i64 * ov_i + u) as usize;
                    for q in 0..w {
                        let j = ((q + 1) as i64 * ov_i + v) as usize;
                        let s = upsampled[[i, j]];
                        sum += s;
                        sum_sq += s * s;
                        cross += reference[p * w + q] * s;
                    }
                }
                let score = normalized_score(cross, sum, sum_sq, n, ref_norm);
                if score > fine_best {
                    fine_best = score;
                    fine_u = u;
                    fine_v = v;
                }
            }
        }

        PeakEstimate {
            offset: (
                best_dy as f64 + fine_u as f64 * step,
                best_dx as f64 + fine_v as f64 * step,
            ),
            quality: fine_best.clamp(0.0, 1.0),
        }
    }
}

/// Zero-mean normalized cross-correlation from running sums.
/// The reference patch is already mean-subtracted, so the cross term only
/// needs the search patch's mean removed implicitly via its own norm.
fn normalized_score(cross: f64, sum: f64, sum_sq: f64, n: f64, ref_norm: f64) -> f64 {
    let search_norm_sq = sum_sq - sum * sum / n;
    if search_norm_sq < EPSILON {
        return 0.0;
    }
    cross / (ref_norm * search_norm_sq.sqrt())
}
