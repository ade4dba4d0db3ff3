//! Gradient images and the height→color mapping.

use crate::gpu::backend::{f32_to_unorm, unorm_to_f32, TexelData, TexelSource};

/// RGBA8 color ramp. Only the first row is sampled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradientImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GradientImage {
    /// Wrap row-major RGBA8 pixels. Returns `None` for empty images or a
    /// pixel buffer of the wrong length.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        (width > 0 && height > 0 && pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// One-row ramp interpolating `from` → `to` across `width` texels, with
    /// the end texels exactly `from` and `to`.
    #[must_use]
    pub fn linear(width: u32, from: [u8; 4], to: [u8; 4]) -> Self {
        let width = width.max(1);
        let span = width.saturating_sub(1).max(1);
        let pixels = (0..width)
            .flat_map(|i| {
                let i = i.min(span);
                (0..4).map(move |c| {
                    let (a, b) = (u32::from(from[c]), u32::from(to[c]));
                    ((a * (span - i) + b * i + span / 2) / span) as u8
                })
            })
            .collect();
        Self {
            width,
            height: 1,
            pixels,
        }
    }

    /// Opaque white on the left fading to opaque black on the right.
    #[must_use]
    pub fn white_to_black(width: u32) -> Self {
        Self::linear(width, [255, 255, 255, 255], [0, 0, 0, 255])
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major RGBA8 pixels.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Texel data for upload.
    #[must_use]
    pub fn to_texel_data(&self) -> TexelData {
        TexelData::Rgba8(self.pixels.clone())
    }
}

impl TexelSource for GradientImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        std::array::from_fn(|c| unorm_to_f32(self.pixels[offset + c]))
    }
}

/// Color for `height`, clamped to `[0, 1]`, sampled from the first row of
/// `gradient` with linear interpolation between texel centres and
/// clamp-to-edge addressing.
#[must_use]
pub fn shade_color<G: TexelSource + ?Sized>(height: f32, gradient: &G) -> [f32; 4] {
    let (width, _) = gradient.dimensions();
    let last = width as i32 - 1;
    let x = height.clamp(0.0, 1.0) * width as f32 - 0.5;
    let x0 = x.floor();
    let f = x - x0;
    let i0 = (x0 as i32).clamp(0, last) as u32;
    let i1 = (x0 as i32 + 1).clamp(0, last) as u32;
    let a = gradient.texel(i0, 0);
    let b = gradient.texel(i1, 0);
    std::array::from_fn(|c| a[c] + (b[c] - a[c]) * f)
}

/// [`shade_color`] quantized to RGBA8.
#[must_use]
pub fn shade(height: f32, gradient: &GradientImage) -> [u8; 4] {
    shade_color(height, gradient).map(f32_to_unorm)
}

/// A produced RGBA8 raster, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaImage {
    /// Wrap row-major RGBA8 pixels. Returns `None` if the length does not
    /// match the dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize * 4).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }

    /// Row-major RGBA8 pixels.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume into the pixel buffer.
    #[must_use]
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_to_black_steps_by_one() {
        let ramp = GradientImage::white_to_black(256);
        assert_eq!(ramp.dimensions(), (256, 1));
        assert_eq!(&ramp.pixels()[..8], &[255, 255, 255, 255, 254, 254, 254, 255]);
        assert_eq!(&ramp.pixels()[255 * 4..], &[0, 0, 0, 255]);
    }

    #[test]
    fn heights_outside_the_unit_range_clamp_to_the_ends() {
        let ramp = GradientImage::white_to_black(256);
        assert_eq!(shade(-0.9, &ramp), [255, 255, 255, 255]);
        assert_eq!(shade(3.0, &ramp), [0, 0, 0, 255]);
    }

    #[test]
    fn interpolates_between_texel_centres() {
        let ramp = GradientImage::linear(2, [0, 0, 0, 255], [200, 100, 0, 255]);
        // Centre of the image lies halfway between the two texel centres.
        assert_eq!(shade(0.5, &ramp), [100, 50, 0, 255]);
        // Inside the outer half-texels the edge color holds.
        assert_eq!(shade(0.2, &ramp), [0, 0, 0, 255]);
    }

    #[test]
    fn single_texel_gradient_is_constant() {
        let ramp = GradientImage::linear(1, [9, 8, 7, 6], [0, 0, 0, 0]);
        assert_eq!(shade(0.0, &ramp), [9, 8, 7, 6]);
        assert_eq!(shade(1.0, &ramp), [9, 8, 7, 6]);
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        assert!(GradientImage::new(2, 1, vec![0; 7]).is_none());
        assert!(GradientImage::new(0, 1, Vec::new()).is_none());
        assert!(RgbaImage::new(1, 1, vec![0; 4]).is_some());
    }
}
