use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};

use crate::error::Result;
use crate::raster::RasterGrid;

/// Linear stretch over the valid samples, as (low, span).
fn stretch_range(raster: &RasterGrid) -> (f32, f32) {
    let mut low = f32::INFINITY;
    let mut high = f32::NEG_INFINITY;
    for ((row, col), &v) in raster.data.indexed_iter() {
        if !raster.is_valid(row, col) || !v.is_finite() {
            continue;
        }
        low = low.min(v);
        high = high.max(v);
    }
    if !low.is_finite() || high <= low {
        return (0.0, 1.0);
    }
    (low, high - low)
}

/// Save a quicklook as 8-bit grayscale PNG. Invalid samples render black.
pub fn save_png(raster: &RasterGrid, path: &Path) -> Result<()> {
    let (low, span) = stretch_range(raster);
    let h = raster.height();
    let w = raster.width();

    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let v = raster.data[[row, col]];
            let val = if raster.is_valid(row, col) && v.is_finite() {
                (((v - low) / span).clamp(0.0, 1.0) * 255.0) as u8
            } else {
                0
            };
            img.put_pixel(col as u32, row as u32, Luma([val]));
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a quicklook as 16-bit grayscale TIFF. Invalid samples render black.
pub fn save_tiff(raster: &RasterGrid, path: &Path) -> Result<()> {
    let (low, span) = stretch_range(raster);
    let h = raster.height();
    let w = raster.width();

    let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
    for row in 0..h {
        for col in 0..w {
            let v = raster.data[[row, col]];
            let val = if raster.is_valid(row, col) && v.is_finite() {
                (((v - low) / span).clamp(0.0, 1.0) * 65535.0) as u16
            } else {
                0
            };
            pixels.push(val);
        }
    }

    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .expect("buffer size matches dimensions");
    img.save(path)?;
    Ok(())
}

/// Save a quicklook, choosing the format from the file extension.
pub fn save_quicklook(raster: &RasterGrid, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(raster, path),
        Some("tiff" | "tif") => save_tiff(raster, path),
        _ => save_png(raster, path),
    }
}
