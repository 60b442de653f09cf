//! Raster rendering of decoded icon bitmaps.

use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};

use super::IconBitmap;
use crate::error::{Result, StoreError};

/// Output pixels per source pixel along each axis.
pub const SCALE: u32 = 2;

/// Gray level (0 = black, 255 = white) of one source pixel.
///
/// Packed pixels are read most-significant bits first. Pixels whose bytes
/// are missing from `data` are white.
fn gray_at(bitmap: &IconBitmap, x: usize, y: usize) -> u8 {
    let bpp = usize::from(bitmap.pixel_size);
    let per_byte = 8 / bpp;
    let index = y * usize::from(bitmap.row_bytes) + x / per_byte;
    let Some(&byte) = bitmap.data.get(index) else {
        return 255;
    };

    let shift = 8 - bpp * (x % per_byte + 1);
    let max = (1u16 << bpp) - 1;
    let value = (u16::from(byte) >> shift) & max;
    // 0 is white, the highest value is black
    u8::try_from(255 - value * 255 / max).unwrap_or(0)
}

fn check_depth(bitmap: &IconBitmap) -> Result<()> {
    match bitmap.pixel_size {
        1 | 2 | 4 => Ok(()),
        other => Err(StoreError::ImageProcessing(format!(
            "Unsupported icon depth: {other} bits per pixel"
        ))),
    }
}

/// Render at 2x: every source pixel becomes an opaque 2x2 gray block.
pub fn render_icon(bitmap: &IconBitmap) -> Result<RgbaImage> {
    check_depth(bitmap)?;
    let width = u32::from(bitmap.width);
    let height = u32::from(bitmap.height);
    let mut img = RgbaImage::new(width * SCALE, height * SCALE);

    for y in 0..height {
        for x in 0..width {
            let g = gray_at(bitmap, x as usize, y as usize);
            let pixel = Rgba([g, g, g, 255]);
            for dy in 0..SCALE {
                for dx in 0..SCALE {
                    img.put_pixel(x * SCALE + dx, y * SCALE + dy, pixel);
                }
            }
        }
    }
    Ok(img)
}

/// Render and write a PNG.
pub fn save_icon_png(bitmap: &IconBitmap, path: &Path) -> Result<()> {
    render_icon(bitmap)?
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| StoreError::ImageProcessing(format!("{}: {e}", path.display())))
}

/// One character per source pixel: `#` for dark, `.` for light.
pub fn ascii_art(bitmap: &IconBitmap) -> Result<String> {
    check_depth(bitmap)?;
    let rows: Vec<String> = (0..usize::from(bitmap.height))
        .map(|y| {
            (0..usize::from(bitmap.width))
                .map(|x| if gray_at(bitmap, x, y) < 128 { '#' } else { '.' })
                .collect()
        })
        .collect();
    Ok(rows.join("\n"))
}
