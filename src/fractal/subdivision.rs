//! Per-coordinate midpoint displacement.
//!
//! Every coordinate walks its own path from the root square down `depth`
//! levels. The generator is reseeded from the quadrant path at each level, so
//! coordinates sharing a path prefix draw identical displacements along it.

use crate::gpu::backend::TexelSource;
use crate::normal_table::lookup_nearest;

use super::xorwow::Xorwow;
use super::FractalParameters;

/// Bits of the logical coordinate space per axis.
pub const COORDINATE_BITS: u32 = 16;
/// Deepest subdivision the quadrant path can encode.
pub const MAX_DEPTH: u32 = 15;
/// Second seed word of the root generator.
pub const ROOT_STREAM: i32 = 0x4000_0000;

/// A position in the square's `[0, 2^16)²` logical space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicalCoordinate {
    /// Horizontal position.
    pub x: u32,
    /// Vertical position, growing downwards.
    pub y: u32,
}

impl LogicalCoordinate {
    /// Map the centre of pixel `(px, py)` of a `width`×`height` target into
    /// logical space. The square spans the longer axis; the shorter axis sees
    /// its centred slice.
    #[must_use]
    pub fn from_pixel(px: u32, py: u32, width: u32, height: u32) -> Self {
        let scale = width.max(height) as f32;
        Self {
            x: axis(px, width, scale),
            y: axis(py, height, scale),
        }
    }

    /// Quadrant of the square at bit `mask`: 0 top-left, 1 top-right,
    /// 2 bottom-right, 3 bottom-left.
    #[must_use]
    pub fn quadrant(self, mask: u32) -> u32 {
        u32::from(self.x & mask != 0) ^ (3 * u32::from(self.y & mask != 0))
    }
}

fn axis(p: u32, extent: u32, scale: f32) -> u32 {
    let centred = ((p as f32 + 0.5) - 0.5 * extent as f32) / scale;
    let logical = (0.5 + centred) * (1u32 << COORDINATE_BITS) as f32;
    logical.floor().clamp(0.0, ((1u32 << COORDINATE_BITS) - 1) as f32) as u32
}

/// One level of a coordinate's descent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    /// Zero-based level number.
    pub index: u32,
    /// Quadrant the coordinate fell into.
    pub quadrant: u32,
    /// Quadrant path of the square that was split, which seeded this level.
    pub path: u32,
    /// Corners of the chosen sub-square, clockwise from top-left.
    pub corners: [f32; 4],
}

/// Root-square corners for `seed`.
#[must_use]
pub fn root_corners(seed: u32) -> [f32; 4] {
    let mut rng = Xorwow::new(seed as i32, ROOT_STREAM);
    std::array::from_fn(|_| rng.next_unit())
}

/// Iterator over the levels of one coordinate's descent.
#[derive(Debug, Clone)]
pub struct Subdivision<'a, T: ?Sized> {
    coord: LogicalCoordinate,
    seed: i32,
    table: &'a T,
    corners: [f32; 4],
    sigma: f32,
    mu: f32,
    attenuation: f32,
    mask: u32,
    path: u32,
    index: u32,
    depth: u32,
}

impl<'a, T: TexelSource + ?Sized> Subdivision<'a, T> {
    /// Start at the root square. Depth is capped at [`MAX_DEPTH`].
    #[must_use]
    pub fn new(coord: LogicalCoordinate, params: &FractalParameters, table: &'a T) -> Self {
        Self {
            coord,
            seed: params.seed as i32,
            table,
            corners: root_corners(params.seed),
            sigma: params.sigma_initial,
            mu: params.mu_initial,
            attenuation: params.attenuation,
            mask: 1 << (COORDINATE_BITS - 1),
            path: 1,
            index: 0,
            depth: params.depth.min(MAX_DEPTH),
        }
    }

    /// Current corners: the root before the first level, the final square
    /// once exhausted.
    #[must_use]
    pub fn corners(&self) -> [f32; 4] {
        self.corners
    }

    /// Height at the coordinate: the corner of the current square that lies
    /// in its quadrant at the next mask.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.corners[self.coord.quadrant(self.mask) as usize]
    }
}

impl<T: TexelSource + ?Sized> Iterator for Subdivision<'_, T> {
    type Item = Level;

    fn next(&mut self) -> Option<Level> {
        if self.index >= self.depth {
            return None;
        }

        let q = self.coord.quadrant(self.mask) as usize;
        let c = self.corners;
        let mut sub = [
            c[q],
            (c[q] + c[(q + 1) % 4]) / 2.0,
            (c[0] + c[1] + c[2] + c[3]) / 4.0,
            (c[(q + 3) % 4] + c[q]) / 2.0,
        ];

        let mut rng = Xorwow::new(self.seed, self.path as i32);
        let u1 = rng.next_uniform();
        let u2 = rng.next_uniform();
        sub[2] += self.sigma * lookup_nearest(self.table, u1, u2) + self.mu;
        self.sigma *= self.attenuation;
        self.mu *= self.attenuation;

        let level = Level {
            index: self.index,
            quadrant: q as u32,
            path: self.path,
            corners: std::array::from_fn(|j| sub[(j + 4 - q) % 4]),
        };
        self.path = (self.path << 2) | q as u32;
        self.corners = level.corners;
        self.mask >>= 1;
        self.index += 1;
        Some(level)
    }
}

/// Height of the fractal at `coord`. Not clamped.
#[must_use]
pub fn evaluate<T: TexelSource + ?Sized>(
    coord: LogicalCoordinate,
    params: &FractalParameters,
    table: &T,
) -> f32 {
    let mut descent = Subdivision::new(coord, params, table);
    for _ in descent.by_ref() {}
    descent.height()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normal_table::NormalTable;

    #[test]
    fn pixel_centres_map_to_known_coordinates() {
        assert_eq!(
            LogicalCoordinate::from_pixel(0, 0, 64, 64),
            LogicalCoordinate { x: 512, y: 512 }
        );
        assert_eq!(
            LogicalCoordinate::from_pixel(63, 63, 64, 64),
            LogicalCoordinate { x: 65024, y: 65024 }
        );
        assert_eq!(
            LogicalCoordinate::from_pixel(17, 40, 64, 64),
            LogicalCoordinate { x: 17920, y: 41472 }
        );
    }

    #[test]
    fn shorter_axis_sees_the_centred_slice() {
        // 128x64: the vertical axis covers the middle half of the square.
        let top = LogicalCoordinate::from_pixel(0, 0, 128, 64);
        let bottom = LogicalCoordinate::from_pixel(0, 63, 128, 64);
        assert_eq!(top.x, 256);
        assert_eq!(top.y, 16384 + 256);
        assert_eq!(bottom.y, 49152 - 256);
    }

    #[test]
    fn quadrants_run_clockwise() {
        let mask = 1 << 15;
        let at = |x, y| LogicalCoordinate { x, y }.quadrant(mask);
        assert_eq!(at(0, 0), 0);
        assert_eq!(at(mask, 0), 1);
        assert_eq!(at(mask, mask), 2);
        assert_eq!(at(0, mask), 3);
    }

    #[test]
    fn paths_carry_a_sentinel_bit() {
        let table = NormalTable::build_sequential();
        let params = FractalParameters {
            depth: MAX_DEPTH,
            ..FractalParameters::default()
        };
        let coord = LogicalCoordinate { x: 0xffff, y: 0 };
        let levels: Vec<Level> = Subdivision::new(coord, &params, &table).collect();
        assert_eq!(levels.len(), MAX_DEPTH as usize);
        for (k, level) in levels.iter().enumerate() {
            // Quadrant 1 at every level: path is 1 followed by k copies of 01.
            assert_eq!(level.quadrant, 1);
            assert_eq!(32 - level.path.leading_zeros(), 1 + 2 * k as u32);
        }
    }

    #[test]
    fn depth_is_capped() {
        let table = NormalTable::build_sequential();
        let params = FractalParameters {
            depth: 40,
            ..FractalParameters::default()
        };
        let descent = Subdivision::new(LogicalCoordinate { x: 1, y: 2 }, &params, &table);
        assert_eq!(descent.count(), MAX_DEPTH as usize);
    }

    #[test]
    fn zero_depth_picks_a_root_corner() {
        let table = NormalTable::build_sequential();
        let params = FractalParameters {
            depth: 0,
            ..FractalParameters::default()
        };
        let corners = root_corners(params.seed);
        let height = evaluate(LogicalCoordinate { x: 0xffff, y: 0xffff }, &params, &table);
        assert_eq!(height, corners[2]);
    }
}
