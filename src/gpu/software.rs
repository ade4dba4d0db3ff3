//! Host-side backend: validates shaders like any other backend but executes
//! fragment stages as Rust [`FragmentKernel`]s, one rayon task per texel.
//!
//! Used for headless runs, for machines without a GPU adapter, and for tests
//! that need to steer capability detection.

use std::sync::{Arc, RwLock};

use rayon::prelude::*;

use super::backend::{
    AdapterReport, Backend, BoundDraw, PlatformInfo, ProgramLink, ShaderStage, TexelData,
    TexelImage, TextureAlloc, TextureFormat, ValidatedShader,
};
use super::reflection::ProgramInterface;

/// Pixel a fragment invocation covers. Its center is at `(x + 0.5, y + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Column, from the left.
    pub x: u32,
    /// Row, from the top.
    pub y: u32,
}

/// Everything a fragment kernel may read: the packed uniform block and the
/// bound textures, addressed by the names the shader declares.
pub struct KernelInputs<'a> {
    interface: &'a ProgramInterface,
    uniforms: &'a [u8],
    textures: Vec<(&'a str, &'a TexelImage)>,
    target_size: (u32, u32),
}

impl<'a> KernelInputs<'a> {
    /// `f32` uniform by name; unset or mistyped names read as zero.
    #[must_use]
    pub fn f32(&self, name: &str) -> f32 {
        self.interface.read_f32(self.uniforms, name).unwrap_or(0.0)
    }

    /// `i32` uniform by name; unset or mistyped names read as zero.
    #[must_use]
    pub fn i32(&self, name: &str) -> i32 {
        self.interface.read_i32(self.uniforms, name).unwrap_or(0)
    }

    /// `u32` uniform by name; unset or mistyped names read as zero.
    #[must_use]
    pub fn u32(&self, name: &str) -> u32 {
        self.interface.read_u32(self.uniforms, name).unwrap_or(0)
    }

    /// `vec2<f32>` uniform by name; unset or mistyped names read as zero.
    #[must_use]
    pub fn vec2(&self, name: &str) -> [f32; 2] {
        self.interface
            .read_vec2(self.uniforms, name)
            .unwrap_or([0.0; 2])
    }

    /// Texture bound under `name`.
    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&'a TexelImage> {
        self.textures
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, image)| *image)
    }

    /// `(width, height)` of the render target.
    #[must_use]
    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }
}

/// Host implementation of a fragment stage.
///
/// Kernels are attached to the WGSL they mirror through
/// [`ShaderDescriptor::host`](super::resource::ShaderDescriptor::host) and run
/// for every texel of the target.
pub trait FragmentKernel: Send + Sync {
    /// Color written to the target at `fragment`.
    fn shade(&self, fragment: Fragment, inputs: &KernelInputs<'_>) -> [f32; 4];
}

/// Shader handle: the validated stage plus its optional host kernel.
pub struct SoftwareShader {
    label: String,
    stage: ShaderStage,
    host: Option<Arc<dyn FragmentKernel>>,
}

/// Program handle: the fragment kernel that executes it.
pub struct SoftwareProgram {
    kernel: Arc<dyn FragmentKernel>,
    format: TextureFormat,
}

/// Shared texel storage; targets alias the texture they render into.
pub type SoftwareTexture = Arc<RwLock<TexelImage>>;

/// Off-screen target over a software texture.
pub struct SoftwareTarget {
    texture: SoftwareTexture,
}

/// The host-side [`Backend`].
pub struct SoftwareBackend {
    report: AdapterReport,
    complete_targets: bool,
    live_handles: usize,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    /// A backend advertising full float render support.
    #[must_use]
    pub fn new() -> Self {
        Self {
            report: AdapterReport {
                platform: PlatformInfo {
                    os: std::env::consts::OS.to_owned(),
                    adapter_name: "Software Rasterizer".to_owned(),
                    backend: "Software".to_owned(),
                },
                renders_r32float: true,
                renders_r16float: true,
                filters_r32float: true,
                max_texture_dimension: 8192,
            },
            complete_targets: true,
            live_handles: 0,
        }
    }

    /// Report the given platform identification instead of the host's.
    #[must_use]
    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.report.platform = platform;
        self
    }

    /// Set which float formats the backend advertises as renderable.
    #[must_use]
    pub fn with_float_targets(mut self, r32float: bool, r16float: bool) -> Self {
        self.report.renders_r32float = r32float;
        self.report.renders_r16float = r16float;
        self.report.filters_r32float = r32float;
        self
    }

    /// Make every off-screen target report itself incomplete.
    #[must_use]
    pub fn with_incomplete_targets(mut self) -> Self {
        self.complete_targets = false;
        self
    }

    /// Native handles (shaders, programs, buffers, textures, targets)
    /// currently allocated.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.live_handles
    }
}

fn read_lock(texture: &SoftwareTexture) -> Result<std::sync::RwLockReadGuard<'_, TexelImage>, String> {
    texture
        .read()
        .map_err(|_| "texture storage poisoned".to_owned())
}

fn write_lock(texture: &SoftwareTexture) -> Result<std::sync::RwLockWriteGuard<'_, TexelImage>, String> {
    texture
        .write()
        .map_err(|_| "texture storage poisoned".to_owned())
}

impl Backend for SoftwareBackend {
    type Shader = SoftwareShader;
    type Program = SoftwareProgram;
    type Buffer = Vec<f32>;
    type Texture = SoftwareTexture;
    type Target = SoftwareTarget;

    fn adapter_report(&self) -> AdapterReport {
        self.report.clone()
    }

    fn create_shader(&mut self, shader: ValidatedShader<'_>) -> Result<Self::Shader, String> {
        self.live_handles += 1;
        Ok(SoftwareShader {
            label: shader.label.to_owned(),
            stage: shader.stage,
            host: shader.host,
        })
    }

    fn release_shader(&mut self, _shader: Self::Shader) {
        self.live_handles -= 1;
    }

    fn create_program(&mut self, link: ProgramLink<'_, Self>) -> Result<Self::Program, String> {
        if link.vertex.stage != ShaderStage::Vertex || link.fragment.stage != ShaderStage::Fragment {
            return Err("program needs one vertex and one fragment shader".to_owned());
        }
        let kernel = link.fragment.host.clone().ok_or_else(|| {
            format!(
                "fragment shader '{}' has no host kernel and cannot run on the software backend",
                link.fragment.label
            )
        })?;
        self.live_handles += 1;
        Ok(SoftwareProgram {
            kernel,
            format: link.format,
        })
    }

    fn release_program(&mut self, _program: Self::Program) {
        self.live_handles -= 1;
    }

    fn create_buffer(&mut self, _label: &str, data: &[f32]) -> Self::Buffer {
        self.live_handles += 1;
        data.to_vec()
    }

    fn release_buffer(&mut self, _buffer: Self::Buffer) {
        self.live_handles -= 1;
    }

    fn create_texture(&mut self, alloc: &TextureAlloc<'_>) -> Self::Texture {
        self.live_handles += 1;
        let count = alloc.width as usize * alloc.height as usize;
        Arc::new(RwLock::new(TexelImage {
            width: alloc.width,
            height: alloc.height,
            data: TexelData::zeroed(alloc.format, count),
        }))
    }

    fn write_texture(&mut self, texture: &Self::Texture, data: &TexelData) -> Result<(), String> {
        let mut image = write_lock(texture)?;
        if data.format() != image.data.format() {
            return Err(format!(
                "cannot write {:?} texels into a {:?} texture",
                data.format(),
                image.data.format()
            ));
        }
        image.data = data.clone();
        Ok(())
    }

    fn read_texture(&mut self, texture: &Self::Texture) -> Result<TexelImage, String> {
        Ok(read_lock(texture)?.clone())
    }

    fn release_texture(&mut self, _texture: Self::Texture) {
        self.live_handles -= 1;
    }

    fn create_target(&mut self, texture: &Self::Texture) -> Option<Self::Target> {
        if !self.complete_targets {
            return None;
        }
        self.live_handles += 1;
        Some(SoftwareTarget {
            texture: Arc::clone(texture),
        })
    }

    fn release_target(&mut self, _target: Self::Target) {
        self.live_handles -= 1;
    }

    fn clear(&mut self, target: &Self::Target, color: [f32; 4]) {
        if let Ok(mut image) = write_lock(&target.texture) {
            let count = image.data.texel_count();
            for index in 0..count {
                image.data.store(index, color);
            }
        }
    }

    fn draw(&mut self, target: &Self::Target, draw: BoundDraw<'_, Self>) -> Result<(), String> {
        if draw.vertex_count < 3 {
            return Ok(());
        }
        if draw
            .textures
            .iter()
            .any(|t| Arc::ptr_eq(t.texture, &target.texture))
        {
            return Err("render target is bound as an input texture".to_owned());
        }

        let guards = draw
            .textures
            .iter()
            .map(|t| Ok((t.name, read_lock(t.texture)?)))
            .collect::<Result<Vec<_>, String>>()?;
        let (width, height) = {
            let image = read_lock(&target.texture)?;
            if image.data.format() != draw.program.format {
                return Err(format!(
                    "program renders {:?} but the target holds {:?}",
                    draw.program.format,
                    image.data.format()
                ));
            }
            (image.width, image.height)
        };

        let inputs = KernelInputs {
            interface: draw.interface,
            uniforms: draw.uniforms,
            textures: guards.iter().map(|(name, image)| (*name, &**image)).collect(),
            target_size: (width, height),
        };
        let kernel = &draw.program.kernel;
        let colors: Vec<[f32; 4]> = (0..width * height)
            .into_par_iter()
            .map(|index| {
                let fragment = Fragment {
                    x: index % width,
                    y: index / width,
                };
                kernel.shade(fragment, &inputs)
            })
            .collect();
        drop(inputs);
        drop(guards);

        let mut image = write_lock(&target.texture)?;
        for (index, color) in colors.into_iter().enumerate() {
            image.data.store(index, color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::reflection::ShaderInterface;

    struct Gradient;

    impl FragmentKernel for Gradient {
        fn shade(&self, fragment: Fragment, inputs: &KernelInputs<'_>) -> [f32; 4] {
            let (width, _) = inputs.target_size();
            [fragment.x as f32 / width as f32, 0.0, 0.0, 1.0]
        }
    }

    #[test]
    fn incomplete_targets_are_reported() {
        let mut backend = SoftwareBackend::new().with_incomplete_targets();
        let texture = backend.create_texture(&TextureAlloc {
            label: "t",
            format: TextureFormat::R32Float,
            width: 2,
            height: 2,
            renderable: true,
        });
        assert!(backend.create_target(&texture).is_none());
        backend.release_texture(texture);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn clear_fills_every_texel() {
        let mut backend = SoftwareBackend::new();
        let texture = backend.create_texture(&TextureAlloc {
            label: "t",
            format: TextureFormat::Rgba8Unorm,
            width: 3,
            height: 2,
            renderable: true,
        });
        let target = backend.create_target(&texture).unwrap();
        backend.clear(&target, [1.0, 0.0, 0.0, 1.0]);
        let image = backend.read_texture(&texture).unwrap();
        assert_eq!(image.data, TexelData::Rgba8([255, 0, 0, 255].repeat(6)));
        backend.release_target(target);
        backend.release_texture(texture);
    }

    #[test]
    fn kernels_see_pixel_indices() {
        let kernel = Gradient;
        let interface_source = r"
            @fragment
            fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(0.0); }
        ";
        let module = naga::front::wgsl::parse_str(interface_source).unwrap();
        let fs = ShaderInterface::reflect(&module, ShaderStage::Fragment).unwrap();
        let vs_module = naga::front::wgsl::parse_str(
            "@vertex fn vs_main(@location(0) corner: vec2<f32>) -> @builtin(position) vec4<f32> \
             { return vec4<f32>(corner, 0.0, 1.0); }",
        )
        .unwrap();
        let vs = ShaderInterface::reflect(&vs_module, ShaderStage::Vertex).unwrap();
        let interface = ProgramInterface::link(&vs, &fs).unwrap();
        let inputs = KernelInputs {
            interface: &interface,
            uniforms: &[],
            textures: Vec::new(),
            target_size: (4, 1),
        };
        assert_eq!(kernel.shade(Fragment { x: 2, y: 0 }, &inputs)[0], 0.5);
        assert_eq!(inputs.f32("missing"), 0.0);
        assert!(inputs.texture("missing").is_none());
    }
}
