use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Interpolation kernel used when sampling a grid at fractional positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResamplingKernel {
    Bilinear,
    #[default]
    Bicubic,
}

impl ResamplingKernel {
    pub fn sample(&self, data: &Array2<f32>, y: f64, x: f64) -> f32 {
        match self {
            Self::Bilinear => bilinear_sample(data, y, x),
            Self::Bicubic => bicubic_sample(data, y, x),
        }
    }
}

impl std::fmt::Display for ResamplingKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bilinear => write!(f, "bilinear"),
            Self::Bicubic => write!(f, "bicubic"),
        }
    }
}

/// Sample at a fractional position with bilinear weights.
/// Out-of-bounds taps read as 0.
pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let sample = |r: i64, c: i64| -> f32 {
        if r >= 0 && r < h as i64 && c >= 0 && c < w as i64 {
            data[[r as usize, c as usize]]
        } else {
            0.0
        }
    };

    let v00 = sample(y0, x0);
    let v10 = sample(y0, x1);
    let v01 = sample(y1, x0);
    let v11 = sample(y1, x1);

    v00 * (1.0 - fx) * (1.0 - fy)
        + v10 * fx * (1.0 - fy)
        + v01 * (1.0 - fx) * fy
        + v11 * fx * fy
}

/// Catmull-Rom style cubic convolution weight (a = -0.5).
fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (A + 2.0) * t * t * t - (A + 3.0) * t * t + 1.0
    } else if t < 2.0 {
        A * t * t * t - 5.0 * A * t * t + 8.0 * A * t - 4.0 * A
    } else {
        0.0
    }
}

/// Sample at a fractional position with 4x4 cubic convolution.
/// Out-of-bounds taps read as 0.
pub fn bicubic_sample(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();

    let y0 = y.floor() as i64;
    let x0 = x.floor() as i64;
    let fy = y - y0 as f64;
    let fx = x - x0 as f64;

    let mut wy = [0.0f64; 4];
    let mut wx = [0.0f64; 4];
    for i in 0..4 {
        wy[i] = cubic_weight(fy - (i as f64 - 1.0));
        wx[i] = cubic_weight(fx - (i as f64 - 1.0));
    }

    let mut acc = 0.0f64;
    for (i, &row_w) in wy.iter().enumerate() {
        let r = y0 - 1 + i as i64;
        if r < 0 || r >= h as i64 {
            continue;
        }
        for (j, &col_w) in wx.iter().enumerate() {
            let c = x0 - 1 + j as i64;
            if c < 0 || c >= w as i64 {
                continue;
            }
            acc += row_w * col_w * data[[r as usize, c as usize]] as f64;
        }
    }
    acc as f32
}
