//! Host renderer: evaluates every pixel with rayon, one row per task.

use rayon::prelude::*;

use crate::gpu::backend::TexelSource;

use super::gradient::{shade, GradientImage, RgbaImage};
use super::subdivision::{evaluate, LogicalCoordinate};
use super::FractalParameters;

/// Render a `width`×`height` raster on the host. The output does not depend
/// on the number of worker threads.
#[must_use]
pub fn render_reference<T: TexelSource + Sync + ?Sized>(
    params: &FractalParameters,
    gradient: &GradientImage,
    table: &T,
    width: u32,
    height: u32,
) -> RgbaImage {
    let mut pixels = vec![0u8; width as usize * height as usize * 4];
    if width > 0 {
        pixels
            .par_chunks_mut(width as usize * 4)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let coord = LogicalCoordinate::from_pixel(x as u32, y as u32, width, height);
                    px.copy_from_slice(&shade(evaluate(coord, params, table), gradient));
                }
            });
    }
    RgbaImage::from_parts(width, height, pixels)
}
