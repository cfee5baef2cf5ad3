//! Per-style raster operations over one bounding box.

use image::{Rgb, RgbImage};
use profile_engine::{PatternId, StyleSpec};
use shared_types::BoundingBox;

use crate::RedactionError;

/// Hatch geometry for the pattern style.
const HATCH_STRIDE: u32 = 8;
const HATCH_THICKNESS: u32 = 2;

/// Render one style into `canvas` over `bbox`.
///
/// The bbox must already be clipped to the canvas; rendering is
/// deterministic for identical inputs.
pub fn apply_style(
    canvas: &mut RgbImage,
    bbox: BoundingBox,
    style: &StyleSpec,
) -> Result<(), RedactionError> {
    let (width, height) = canvas.dimensions();
    if !bbox.fits_page(width, height) {
        return Err(RedactionError::OutOfBounds);
    }

    match style {
        StyleSpec::Solid { color } => {
            fill_solid(canvas, bbox, *color);
            Ok(())
        }
        StyleSpec::Pixelate { block_px } => pixelate(canvas, bbox, *block_px),
        StyleSpec::Blur {
            radius_px,
            iterations,
        } => blur(canvas, bbox, *radius_px, *iterations),
        StyleSpec::Pattern { id } => {
            match id {
                PatternId::DiagonalHatch => diagonal_hatch(canvas, bbox),
            }
            Ok(())
        }
    }
}

fn fill_solid(canvas: &mut RgbImage, bbox: BoundingBox, color: [u8; 3]) {
    let pixel = Rgb(color);
    for y in bbox.y..bbox.bottom() {
        for x in bbox.x..bbox.right() {
            canvas.put_pixel(x, y, pixel);
        }
    }
}

/// Nearest-neighbor mosaic: downsample the region to `block_px` blocks and
/// upsample back.
fn pixelate(canvas: &mut RgbImage, bbox: BoundingBox, block_px: u32) -> Result<(), RedactionError> {
    if block_px == 0 {
        return Err(RedactionError::InvalidStyle("pixelate block_px = 0".into()));
    }
    let region =
        image::imageops::crop_imm(canvas, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
    let blocks_w = bbox.width.div_ceil(block_px).max(1);
    let blocks_h = bbox.height.div_ceil(block_px).max(1);

    let down = image::imageops::resize(
        &region,
        blocks_w,
        blocks_h,
        image::imageops::FilterType::Nearest,
    );
    let up = image::imageops::resize(
        &down,
        bbox.width,
        bbox.height,
        image::imageops::FilterType::Nearest,
    );
    image::imageops::replace(canvas, &up, bbox.x as i64, bbox.y as i64);
    Ok(())
}

/// Separable box blur: per iteration one horizontal and one vertical pass,
/// window `2 * radius + 1`, edges clamped to the region.
fn blur(
    canvas: &mut RgbImage,
    bbox: BoundingBox,
    radius_px: u32,
    iterations: u32,
) -> Result<(), RedactionError> {
    if radius_px == 0 || iterations == 0 {
        return Err(RedactionError::InvalidStyle(
            "blur radius_px and iterations must be positive".into(),
        ));
    }
    let radius = radius_px as i64;
    let (w, h) = (bbox.width as i64, bbox.height as i64);
    let mut region: Vec<[f32; 3]> = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let px = canvas.get_pixel(bbox.x + x as u32, bbox.y + y as u32);
            region.push([px[0] as f32, px[1] as f32, px[2] as f32]);
        }
    }

    let mut scratch = region.clone();
    for _ in 0..iterations {
        // Horizontal pass.
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                let mut count = 0.0f32;
                for dx in -radius..=radius {
                    let sx = (x + dx).clamp(0, w - 1);
                    let sample = region[(y * w + sx) as usize];
                    acc[0] += sample[0];
                    acc[1] += sample[1];
                    acc[2] += sample[2];
                    count += 1.0;
                }
                scratch[(y * w + x) as usize] = [acc[0] / count, acc[1] / count, acc[2] / count];
            }
        }
        // Vertical pass.
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                let mut count = 0.0f32;
                for dy in -radius..=radius {
                    let sy = (y + dy).clamp(0, h - 1);
                    let sample = scratch[(sy * w + x) as usize];
                    acc[0] += sample[0];
                    acc[1] += sample[1];
                    acc[2] += sample[2];
                    count += 1.0;
                }
                region[(y * w + x) as usize] = [acc[0] / count, acc[1] / count, acc[2] / count];
            }
        }
    }

    for y in 0..h {
        for x in 0..w {
            let sample = region[(y * w + x) as usize];
            canvas.put_pixel(
                bbox.x + x as u32,
                bbox.y + y as u32,
                Rgb([
                    sample[0].round() as u8,
                    sample[1].round() as u8,
                    sample[2].round() as u8,
                ]),
            );
        }
    }
    Ok(())
}

/// Black-on-white diagonal hatch at full opacity.
fn diagonal_hatch(canvas: &mut RgbImage, bbox: BoundingBox) {
    for y in bbox.y..bbox.bottom() {
        for x in bbox.x..bbox.right() {
            let on_stripe = (x + y) % HATCH_STRIDE < HATCH_THICKNESS;
            let pixel = if on_stripe {
                Rgb([0, 0, 0])
            } else {
                Rgb([0xff, 0xff, 0xff])
            };
            canvas.put_pixel(x, y, pixel);
        }
    }
}
