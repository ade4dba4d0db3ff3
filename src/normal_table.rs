//! Standard-normal lookup table.
//!
//! Texel `(i, j)` holds the Box-Muller transform of
//! `u1 = (i + 1) / (N + 2)`, `u2 = (j + 1) / (N + 2)`, so two uniform samples
//! turn into one normal sample with a single nearest-texel fetch. The table
//! is built once per session: on the device when it can render float
//! targets, otherwise on the host and uploaded.

use std::f64::consts::TAU;
use std::sync::Arc;

use crate::gpu::backend::{Backend, TexelData, TexelSource};
use crate::gpu::draw::{RenderError, UniformValue};
use crate::gpu::manager::ResourceManager;
use crate::gpu::quad::QuadPipeline;
use crate::gpu::resource::{ResourceError, Texture, TextureKind};
use crate::gpu::shader_composer::NORMAL_TABLE_FRAGMENT;
use crate::gpu::software::{Fragment, FragmentKernel, KernelInputs};

/// Texels per side.
pub const TABLE_SIZE: u32 = 1024;

/// Table value at texel `(i, j)` of a `size`-wide table.
#[must_use]
pub fn normal_value(i: u32, j: u32, size: u32) -> f32 {
    let denominator = f64::from(size) + 2.0;
    let u1 = (f64::from(i) + 1.0) / denominator;
    let u2 = (f64::from(j) + 1.0) / denominator;
    ((-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()) as f32
}

/// Nearest texel of `table` for uniforms `(u1, u2)`, with `u1` selecting the
/// column and `u2` the row. Out-of-range uniforms clamp to the edge.
#[must_use]
pub fn lookup_nearest<T: TexelSource + ?Sized>(table: &T, u1: f32, u2: f32) -> f32 {
    let (width, height) = table.dimensions();
    table.texel(nearest(u1, width), nearest(u2, height))[0]
}

fn nearest(u: f32, extent: u32) -> u32 {
    ((u * extent as f32).floor().max(0.0) as u32).min(extent - 1)
}

/// Host-side table.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalTable {
    size: u32,
    values: Vec<f32>,
}

impl NormalTable {
    /// Compute the full table on the calling thread.
    #[must_use]
    pub fn build_sequential() -> Self {
        let size = TABLE_SIZE;
        let values = (0..size)
            .flat_map(|j| (0..size).map(move |i| normal_value(i, j, size)))
            .collect();
        Self { size, values }
    }

    /// Wrap values read back from a table texture. Returns `None` unless the
    /// image is square and non-empty.
    #[must_use]
    pub fn from_texels(width: u32, height: u32, data: &TexelData) -> Option<Self> {
        let values = data.red_channel();
        (width > 0 && width == height && values.len() == width as usize * height as usize)
            .then_some(Self {
                size: width,
                values,
            })
    }

    /// Texels per side.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Row-major values, `values[j * size + i]`.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at texel `(i, j)`.
    #[must_use]
    pub fn value(&self, i: u32, j: u32) -> f32 {
        self.values[(j * self.size + i) as usize]
    }

    /// Normal sample for uniforms `(u1, u2)`.
    #[must_use]
    pub fn lookup(&self, u1: f32, u2: f32) -> f32 {
        lookup_nearest(self, u1, u2)
    }

    /// Texel data for upload.
    #[must_use]
    pub fn to_texel_data(&self) -> TexelData {
        TexelData::R32Float(self.values.clone())
    }

    /// Sample mean and standard deviation.
    #[must_use]
    pub fn statistics(&self) -> (f64, f64) {
        statistics(&self.values)
    }

    /// Upload to a `Float32` texture.
    ///
    /// # Errors
    ///
    /// Returns the [`ResourceError`] of texture creation.
    pub fn upload<B: Backend>(
        &self,
        manager: &mut ResourceManager<B>,
    ) -> Result<Texture<B>, ResourceError> {
        manager.create_texture(
            TextureKind::Float32,
            self.size,
            self.size,
            Some(&self.to_texel_data()),
        )
    }
}

impl TexelSource for NormalTable {
    fn dimensions(&self) -> (u32, u32) {
        (self.size, self.size)
    }

    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        [self.value(x, y), 0.0, 0.0, 1.0]
    }
}

/// Mean and population standard deviation of `values`.
#[must_use]
pub fn statistics(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Host kernel of `normal_table.wgsl`.
struct NormalTableKernel;

impl FragmentKernel for NormalTableKernel {
    fn shade(&self, fragment: Fragment, inputs: &KernelInputs<'_>) -> [f32; 4] {
        let size = inputs.f32("size") as u32;
        [normal_value(fragment.x, fragment.y, size), 0.0, 0.0, 1.0]
    }
}

/// Render the table into a `Float32` texture.
///
/// Returns `Ok(None)` when the device cannot render float targets.
///
/// # Errors
///
/// Returns a [`RenderError`] if the table program fails to build or draw.
/// Nothing stays allocated in that case.
pub fn build_parallel<B: Backend>(
    manager: &mut ResourceManager<B>,
) -> Result<Option<Texture<B>>, RenderError> {
    manager.render_to_texture(TextureKind::Float32, TABLE_SIZE, TABLE_SIZE, |target| {
        let pipeline = QuadPipeline::create(
            target.manager(),
            "Normal Table",
            NORMAL_TABLE_FRAGMENT,
            "normal_table.wgsl",
            Arc::new(NormalTableKernel),
            TextureKind::Float32,
        )?;
        let drawn = pipeline.draw(
            target,
            &[("size", UniformValue::F32(TABLE_SIZE as f32))],
            &[],
        );
        pipeline.release(target.manager());
        drawn.map_err(RenderError::from)
    })
}

/// Which way a table was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePath {
    /// Rendered on the device.
    Parallel,
    /// Computed on the host and uploaded.
    Sequential,
}

/// A table texture and how it was made.
pub struct BuiltTable<B: Backend> {
    /// `Float32` texture of `TABLE_SIZE`² values.
    pub texture: Texture<B>,
    /// Path taken.
    pub path: TablePath,
}

/// Picks the table construction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalTableBuilder {
    allow_parallel: bool,
}

impl Default for NormalTableBuilder {
    fn default() -> Self {
        Self {
            allow_parallel: true,
        }
    }
}

impl NormalTableBuilder {
    /// Builder that tries the device path first when `allow_parallel`.
    #[must_use]
    pub fn new(allow_parallel: bool) -> Self {
        Self { allow_parallel }
    }

    /// Build the table, rendering it when possible and falling back to the
    /// host computation otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if the upload of the host table fails. A
    /// failed device render is logged and falls back.
    pub fn build<B: Backend>(
        &self,
        manager: &mut ResourceManager<B>,
    ) -> Result<BuiltTable<B>, RenderError> {
        if self.allow_parallel {
            match build_parallel(manager) {
                Ok(Some(texture)) => {
                    log::info!("Normal table rendered on the device");
                    return Ok(BuiltTable {
                        texture,
                        path: TablePath::Parallel,
                    });
                }
                Ok(None) => log::info!("Float render targets unavailable"),
                Err(e) => log::warn!("Device table render failed: {e}"),
            }
        }
        let texture = NormalTable::build_sequential().upload(manager)?;
        log::info!("Normal table computed on the host");
        Ok(BuiltTable {
            texture,
            path: TablePath::Sequential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::capabilities::DeviceQuirks;
    use crate::gpu::resource::Resource;
    use crate::gpu::software::SoftwareBackend;

    #[test]
    fn sequential_table_is_standard_normal() {
        let table = NormalTable::build_sequential();
        assert_eq!(table.size(), TABLE_SIZE);
        let (mean, sd) = table.statistics();
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((sd - 1.0).abs() < 0.05, "sd {sd}");
    }

    #[test]
    fn lookup_clamps_to_the_edges() {
        let table = NormalTable::build_sequential();
        assert_eq!(table.lookup(1.0, 1.0), table.value(1023, 1023));
        assert_eq!(table.lookup(-0.1, 0.0), table.value(0, 0));
        assert_eq!(table.lookup(0.5, 0.25), table.value(512, 256));
    }

    #[test]
    fn columns_follow_the_first_uniform() {
        let table = NormalTable::build_sequential();
        // u2 = 1/1026 makes cos(2 pi u2) close to one, leaving the radius.
        assert!(table.value(0, 0) > table.value(1023, 0));
        assert!(table.value(0, 0) > 3.5);
    }

    #[test]
    fn texel_tables_must_be_square_and_non_empty() {
        assert!(NormalTable::from_texels(0, 0, &TexelData::R32Float(Vec::new())).is_none());
        assert!(NormalTable::from_texels(2, 1, &TexelData::R32Float(vec![0.0; 2])).is_none());
        let table = NormalTable::from_texels(1, 1, &TexelData::R32Float(vec![0.5])).unwrap();
        assert_eq!(table.lookup(0.0, 1.0), 0.5);
    }

    #[test]
    fn builder_falls_back_without_float_targets() {
        let backend = SoftwareBackend::new().with_float_targets(false, false);
        let mut manager = ResourceManager::new(backend, &DeviceQuirks::none()).unwrap();
        assert!(build_parallel(&mut manager).unwrap().is_none());
        let built = NormalTableBuilder::default().build(&mut manager).unwrap();
        assert_eq!(built.path, TablePath::Sequential);
        assert_eq!(built.texture.dimensions(), (TABLE_SIZE, TABLE_SIZE));
        manager.destroy([Resource::from(built.texture)]);
        assert_eq!(manager.live_resources(), 0);
    }

    #[test]
    fn builder_renders_when_allowed() {
        let mut manager =
            ResourceManager::new(SoftwareBackend::new(), &DeviceQuirks::none()).unwrap();
        let built = NormalTableBuilder::new(true).build(&mut manager).unwrap();
        assert_eq!(built.path, TablePath::Parallel);
        let image = manager.read_texture(&built.texture).unwrap();
        let table = NormalTable::from_texels(image.width, image.height, &image.data).unwrap();
        assert_eq!(table, NormalTable::build_sequential());
        manager.destroy([Resource::from(built.texture)]);
        assert_eq!(manager.live_resources(), 0);
    }
}
