use std::f64::consts::TAU;

use ndarray::Array2;

use driftscan_core::raster::{GeoTransform, RasterGrid, SceneMeta};

pub const DAY_US: u64 = 86_400_000_000;

/// Acquisition epochs twelve days apart, the usual repeat-pass baseline in
/// these tests.
pub const MASTER_TS: u64 = 1_000 * DAY_US;
pub const SLAVE_TS: u64 = 1_012 * DAY_US;

/// North-up georeference with 10 m pixels, somewhere in UTM space.
pub fn default_geo() -> GeoTransform {
    GeoTransform::north_up(500_000.0, 4_000_000.0, 10.0, -10.0)
}

/// Deterministic band-limited texture: a seeded sum of sinusoids that can
/// be sampled at fractional positions, so a shifted scene is exact rather
/// than resampled.
pub struct Texture {
    components: Vec<(f64, f64, f64, f64)>,
}

impl Texture {
    pub fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };

        let mut components = Vec::with_capacity(24);
        for _ in 0..24 {
            // Frequencies capped at 0.25 cycles/px so interpolation kernels
            // stay accurate.
            let u = (next() - 0.5) * 0.5;
            let v = (next() - 0.5) * 0.5;
            let phase = next() * TAU;
            let amp = 0.5 + next();
            components.push((u, v, phase, amp));
        }
        Self { components }
    }

    pub fn sample(&self, row: f64, col: f64) -> f32 {
        let mut acc = 0.0;
        for &(u, v, phase, amp) in &self.components {
            acc += amp * (TAU * (u * row + v * col) + phase).sin();
        }
        (0.5 + 0.08 * acc) as f32
    }
}

/// Textured scene sampled at integer pixel positions.
pub fn textured_scene(
    height: usize,
    width: usize,
    seed: u64,
    scene_id: &str,
    timestamp_us: u64,
) -> RasterGrid {
    shifted_scene(height, width, seed, (0.0, 0.0), scene_id, timestamp_us)
}

/// Textured scene whose features moved by (dy, dx) pixels relative to the
/// unshifted scene with the same seed.
pub fn shifted_scene(
    height: usize,
    width: usize,
    seed: u64,
    shift: (f64, f64),
    scene_id: &str,
    timestamp_us: u64,
) -> RasterGrid {
    let texture = Texture::new(seed);
    let data = Array2::from_shape_fn((height, width), |(r, c)| {
        texture.sample(r as f64 - shift.0, c as f64 - shift.1)
    });
    RasterGrid::new(
        data,
        default_geo(),
        SceneMeta::with_timestamp(scene_id, timestamp_us),
    )
    .expect("non-empty scene")
}

/// Constant-valued (textureless) scene.
pub fn constant_scene(
    height: usize,
    width: usize,
    value: f32,
    scene_id: &str,
    timestamp_us: u64,
) -> RasterGrid {
    RasterGrid::new(
        Array2::from_elem((height, width), value),
        default_geo(),
        SceneMeta::with_timestamp(scene_id, timestamp_us),
    )
    .expect("non-empty scene")
}
