//! Device renderer: runs the plasma fragment program over an off-screen RGBA
//! target and reads the raster back.

use std::sync::Arc;

use crate::gpu::backend::{Backend, TexelData, TextureFormat};
use crate::gpu::draw::{RenderError, UniformValue};
use crate::gpu::manager::ResourceManager;
use crate::gpu::quad::QuadPipeline;
use crate::gpu::resource::{Resource, ResourceError, Texture, TextureKind};
use crate::gpu::shader_composer::PLASMA_FRAGMENT;
use crate::gpu::software::{Fragment, FragmentKernel, KernelInputs};

use super::gradient::{shade_color, GradientImage, RgbaImage};
use super::subdivision::{evaluate, LogicalCoordinate};
use super::FractalParameters;

/// Host kernel of `plasma.wgsl`.
struct PlasmaKernel;

impl FragmentKernel for PlasmaKernel {
    fn shade(&self, fragment: Fragment, inputs: &KernelInputs<'_>) -> [f32; 4] {
        let (Some(gradient), Some(table)) =
            (inputs.texture("gradient"), inputs.texture("normal_table"))
        else {
            return [0.0; 4];
        };
        let params = FractalParameters {
            seed: inputs.i32("seed") as u32,
            sigma_initial: inputs.f32("sigma_initial"),
            mu_initial: inputs.f32("mu_initial"),
            attenuation: inputs.f32("attenuation"),
            depth: inputs.u32("depth"),
        };
        let [width, height] = inputs.vec2("output_size");
        let coord = LogicalCoordinate::from_pixel(fragment.x, fragment.y, width as u32, height as u32);
        shade_color(evaluate(coord, &params, table), gradient)
    }
}

/// The plasma program plus the gradient texture it samples.
pub struct PlasmaRenderer<B: Backend> {
    pipeline: QuadPipeline<B>,
    gradient: Texture<B>,
}

impl<B: Backend> PlasmaRenderer<B> {
    /// Build the program and upload `gradient`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError`]; nothing stays allocated.
    pub fn new(
        manager: &mut ResourceManager<B>,
        gradient: &GradientImage,
    ) -> Result<Self, ResourceError> {
        let pipeline = QuadPipeline::create(
            manager,
            "Plasma",
            PLASMA_FRAGMENT,
            "plasma.wgsl",
            Arc::new(PlasmaKernel),
            TextureKind::Rgba8,
        )?;
        match upload_gradient(manager, gradient) {
            Ok(texture) => Ok(Self {
                pipeline,
                gradient: texture,
            }),
            Err(e) => {
                pipeline.release(manager);
                Err(e)
            }
        }
    }

    /// Replace the gradient. Same-sized gradients are written in place.
    ///
    /// # Errors
    ///
    /// Returns the [`ResourceError`] of the upload; the previous gradient
    /// stays in use.
    pub fn set_gradient(
        &mut self,
        manager: &mut ResourceManager<B>,
        gradient: &GradientImage,
    ) -> Result<(), ResourceError> {
        if self.gradient.dimensions() == gradient.dimensions() {
            return manager.load_texture(&self.gradient, &gradient.to_texel_data());
        }
        let texture = upload_gradient(manager, gradient)?;
        let old = std::mem::replace(&mut self.gradient, texture);
        manager.destroy([Resource::from(old)]);
        Ok(())
    }

    /// Render a `width`×`height` raster with `table` as the normal table.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::TargetUnavailable`] if no RGBA target of that
    /// size can be made, or the draw/readback error. The intermediate
    /// texture is always released.
    pub fn render(
        &self,
        manager: &mut ResourceManager<B>,
        params: &FractalParameters,
        table: &Texture<B>,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RenderError> {
        let uniforms = [
            ("seed", UniformValue::I32(params.seed as i32)),
            ("depth", UniformValue::U32(params.effective_depth())),
            ("sigma_initial", UniformValue::F32(params.sigma_initial)),
            ("mu_initial", UniformValue::F32(params.mu_initial)),
            ("attenuation", UniformValue::F32(params.attenuation)),
            (
                "output_size",
                UniformValue::Vec2([width as f32, height as f32]),
            ),
        ];
        let textures = [("gradient", &self.gradient), ("normal_table", table)];

        let output = manager
            .render_to_texture(TextureKind::Rgba8, width, height, |target| {
                self.pipeline.draw(target, &uniforms, &textures)
            })?
            .ok_or(RenderError::TargetUnavailable { width, height })?;

        let image = manager.read_texture(&output);
        manager.destroy([Resource::from(output)]);
        match image?.data {
            TexelData::Rgba8(pixels) => Ok(RgbaImage::from_parts(width, height, pixels)),
            other => Err(RenderError::Resource(ResourceError::FormatMismatch {
                expected: TextureFormat::Rgba8Unorm,
                actual: other.format(),
            })),
        }
    }

    /// Destroy the program and the gradient texture.
    pub fn release(self, manager: &mut ResourceManager<B>) {
        manager.destroy([Resource::from(self.gradient)]);
        self.pipeline.release(manager);
    }
}

fn upload_gradient<B: Backend>(
    manager: &mut ResourceManager<B>,
    gradient: &GradientImage,
) -> Result<Texture<B>, ResourceError> {
    let (width, height) = gradient.dimensions();
    manager.create_texture(
        TextureKind::Rgba8,
        width,
        height,
        Some(&gradient.to_texel_data()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractal::render_reference;
    use crate::gpu::capabilities::DeviceQuirks;
    use crate::gpu::software::SoftwareBackend;
    use crate::normal_table::NormalTable;

    #[test]
    fn software_render_matches_the_reference() {
        let mut manager =
            ResourceManager::new(SoftwareBackend::new(), &DeviceQuirks::none()).unwrap();
        let table = NormalTable::build_sequential();
        let table_texture = table.upload(&mut manager).unwrap();
        let gradient = GradientImage::white_to_black(256);
        let renderer = PlasmaRenderer::new(&mut manager, &gradient).unwrap();
        let params = FractalParameters {
            seed: 7,
            ..FractalParameters::default()
        };

        let rendered = renderer
            .render(&mut manager, &params, &table_texture, 40, 24)
            .unwrap();
        let reference = render_reference(&params, &gradient, &table, 40, 24);
        assert_eq!(rendered, reference);

        renderer.release(&mut manager);
        manager.destroy([Resource::from(table_texture)]);
        assert_eq!(manager.live_resources(), 0);
    }

    #[test]
    fn gradient_swaps_reuse_or_replace_the_texture() {
        let mut manager =
            ResourceManager::new(SoftwareBackend::new(), &DeviceQuirks::none()).unwrap();
        let mut renderer =
            PlasmaRenderer::new(&mut manager, &GradientImage::white_to_black(16)).unwrap();
        let live = manager.live_resources();

        let red = GradientImage::linear(16, [255, 0, 0, 255], [255, 0, 0, 255]);
        renderer.set_gradient(&mut manager, &red).unwrap();
        assert_eq!(manager.live_resources(), live);

        let wide = GradientImage::white_to_black(64);
        renderer.set_gradient(&mut manager, &wide).unwrap();
        assert_eq!(manager.live_resources(), live);
        assert_eq!(renderer.gradient.dimensions(), (64, 1));

        renderer.release(&mut manager);
        assert_eq!(manager.live_resources(), 0);
    }

    #[test]
    fn empty_targets_are_unavailable() {
        let mut manager =
            ResourceManager::new(SoftwareBackend::new(), &DeviceQuirks::none()).unwrap();
        let table = NormalTable::build_sequential().upload(&mut manager).unwrap();
        let renderer = PlasmaRenderer::new(&mut manager, &GradientImage::white_to_black(4)).unwrap();
        let err = renderer
            .render(&mut manager, &FractalParameters::default(), &table, 0, 8)
            .unwrap_err();
        assert_eq!(err, RenderError::TargetUnavailable { width: 0, height: 8 });
        renderer.release(&mut manager);
        manager.destroy([Resource::from(table)]);
        assert_eq!(manager.live_resources(), 0);
    }
}
