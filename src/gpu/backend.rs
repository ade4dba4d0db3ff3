//! The native graphics API seam driven by [`ResourceManager`].
//!
//! A backend owns raw handles and knows nothing about resource kinds,
//! reflection or lifetimes; those live in the manager. Two implementations
//! ship with the crate: [`WgpuBackend`](super::wgpu_backend::WgpuBackend) and
//! [`SoftwareBackend`](super::software::SoftwareBackend).
//!
//! [`ResourceManager`]: super::manager::ResourceManager

use std::sync::Arc;

use half::f16;

use super::reflection::ProgramInterface;
use super::software::FragmentKernel;

/// Pipeline stage a shader module provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
}

/// Texel formats the crate allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA (gradients, output rasters).
    Rgba8Unorm,
    /// Single-channel 32-bit float.
    R32Float,
    /// Single-channel 16-bit float.
    R16Float,
}

impl TextureFormat {
    /// Bytes per texel.
    #[must_use]
    pub const fn texel_size(self) -> u32 {
        match self {
            Self::Rgba8Unorm | Self::R32Float => 4,
            Self::R16Float => 2,
        }
    }
}

/// Host-side texel storage, tagged by format.
#[derive(Debug, Clone, PartialEq)]
pub enum TexelData {
    /// Four bytes per texel.
    Rgba8(Vec<u8>),
    /// One `f32` per texel.
    R32Float(Vec<f32>),
    /// One `f16` per texel.
    R16Float(Vec<f16>),
}

impl TexelData {
    /// Zero-filled storage for `count` texels.
    #[must_use]
    pub fn zeroed(format: TextureFormat, count: usize) -> Self {
        match format {
            TextureFormat::Rgba8Unorm => Self::Rgba8(vec![0; count * 4]),
            TextureFormat::R32Float => Self::R32Float(vec![0.0; count]),
            TextureFormat::R16Float => Self::R16Float(vec![f16::ZERO; count]),
        }
    }

    /// Format of the stored texels.
    #[must_use]
    pub const fn format(&self) -> TextureFormat {
        match self {
            Self::Rgba8(_) => TextureFormat::Rgba8Unorm,
            Self::R32Float(_) => TextureFormat::R32Float,
            Self::R16Float(_) => TextureFormat::R16Float,
        }
    }

    /// Number of texels stored.
    #[must_use]
    pub fn texel_count(&self) -> usize {
        match self {
            Self::Rgba8(bytes) => bytes.len() / 4,
            Self::R32Float(values) => values.len(),
            Self::R16Float(values) => values.len(),
        }
    }

    /// Convert into `format`. Float formats convert into each other; RGBA
    /// and float data are not interchangeable and yield `None`.
    #[must_use]
    pub fn converted(&self, format: TextureFormat) -> Option<Self> {
        match (self, format) {
            (data, f) if data.format() == f => Some(data.clone()),
            (Self::R32Float(values), TextureFormat::R16Float) => Some(
                Self::R16Float(values.iter().copied().map(f16::from_f32).collect()),
            ),
            (Self::R16Float(values), TextureFormat::R32Float) => Some(
                Self::R32Float(values.iter().copied().map(f16::to_f32).collect()),
            ),
            _ => None,
        }
    }

    /// First channel of every texel as `f32`, normalizing RGBA bytes.
    #[must_use]
    pub fn red_channel(&self) -> Vec<f32> {
        match self {
            Self::Rgba8(bytes) => {
                bytes.chunks_exact(4).map(|px| unorm_to_f32(px[0])).collect()
            }
            Self::R32Float(values) => values.clone(),
            Self::R16Float(values) => values.iter().copied().map(f16::to_f32).collect(),
        }
    }

    /// Raw little-endian bytes, as uploaded to a GPU texture.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Rgba8(bytes) => bytes,
            Self::R32Float(values) => bytemuck::cast_slice(values),
            Self::R16Float(values) => bytemuck::cast_slice(values),
        }
    }

    /// Rebuild texel storage from tightly packed bytes.
    #[must_use]
    pub fn from_bytes(format: TextureFormat, bytes: &[u8]) -> Self {
        match format {
            TextureFormat::Rgba8Unorm => Self::Rgba8(bytes.to_vec()),
            TextureFormat::R32Float => Self::R32Float(
                bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            ),
            TextureFormat::R16Float => Self::R16Float(
                bytes
                    .chunks_exact(2)
                    .map(|b| f16::from_le_bytes([b[0], b[1]]))
                    .collect(),
            ),
        }
    }

    /// Store a shaded fragment color at texel `index`.
    pub fn store(&mut self, index: usize, color: [f32; 4]) {
        match self {
            Self::Rgba8(bytes) => {
                let px = &mut bytes[index * 4..index * 4 + 4];
                for (dst, c) in px.iter_mut().zip(color) {
                    *dst = f32_to_unorm(c);
                }
            }
            Self::R32Float(values) => values[index] = color[0],
            Self::R16Float(values) => values[index] = f16::from_f32(color[0]),
        }
    }
}

/// Convert a normalized channel to an 8-bit value, rounding to nearest.
#[must_use]
pub fn f32_to_unorm(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert an 8-bit channel to `[0, 1]`.
#[must_use]
pub fn unorm_to_f32(c: u8) -> f32 {
    f32::from(c) / 255.0
}

/// Anything that can be read texel-by-texel like a 2D texture.
pub trait TexelSource {
    /// `(width, height)` in texels.
    fn dimensions(&self) -> (u32, u32);
    /// RGBA value at `(x, y)`. Single-channel sources return `[v, 0, 0, 1]`.
    fn texel(&self, x: u32, y: u32) -> [f32; 4];
}

/// A sized block of texels.
#[derive(Debug, Clone, PartialEq)]
pub struct TexelImage {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Row-major texel storage.
    pub data: TexelData,
}

impl TexelSource for TexelImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let index = (y * self.width + x) as usize;
        match &self.data {
            TexelData::Rgba8(bytes) => {
                let px = &bytes[index * 4..index * 4 + 4];
                [
                    unorm_to_f32(px[0]),
                    unorm_to_f32(px[1]),
                    unorm_to_f32(px[2]),
                    unorm_to_f32(px[3]),
                ]
            }
            TexelData::R32Float(values) => [values[index], 0.0, 0.0, 1.0],
            TexelData::R16Float(values) => [values[index].to_f32(), 0.0, 0.0, 1.0],
        }
    }
}

/// Identification of the platform and adapter a backend runs on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformInfo {
    /// Operating system (`std::env::consts::OS` style, e.g. `"ios"`).
    pub os: String,
    /// Adapter name as reported by the driver.
    pub adapter_name: String,
    /// Graphics API in use (e.g. `"Metal"`, `"Gl"`, `"Software"`).
    pub backend: String,
}

/// Raw capabilities as advertised by the adapter, before quirks are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterReport {
    /// Where the report came from.
    pub platform: PlatformInfo,
    /// `R32Float` can be used as a render attachment.
    pub renders_r32float: bool,
    /// `R16Float` can be used as a render attachment.
    pub renders_r16float: bool,
    /// `R32Float` supports linear filtering.
    pub filters_r32float: bool,
    /// Largest 2D texture dimension.
    pub max_texture_dimension: u32,
}

/// A shader module that passed composition and validation.
pub struct ValidatedShader<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Stage the module provides.
    pub stage: ShaderStage,
    /// Validated naga IR.
    pub module: naga::Module,
    /// Host implementation of the fragment stage, if any.
    pub host: Option<Arc<dyn FragmentKernel>>,
}

/// Everything a backend needs to link a vertex and fragment shader.
pub struct ProgramLink<'a, B: Backend + ?Sized> {
    /// Debug label.
    pub label: &'a str,
    /// Vertex stage.
    pub vertex: &'a B::Shader,
    /// Fragment stage.
    pub fragment: &'a B::Shader,
    /// Reflected interface of both stages.
    pub interface: &'a ProgramInterface,
    /// Format of the color attachment the program renders into.
    pub format: TextureFormat,
}

/// Parameters for a texture allocation.
#[derive(Debug, Clone, Copy)]
pub struct TextureAlloc<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Texel format.
    pub format: TextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Whether the texture will be attached to an off-screen target.
    pub renderable: bool,
}

/// A texture bound to a named program input.
pub struct BoundTexture<'a, B: Backend + ?Sized> {
    /// Name of the texture variable in the shader.
    pub name: &'a str,
    /// Bind group slot.
    pub binding: u32,
    /// Native texture.
    pub texture: &'a B::Texture,
}

/// A fully resolved draw: names already mapped to slots.
pub struct BoundDraw<'a, B: Backend + ?Sized> {
    /// Program to run.
    pub program: &'a B::Program,
    /// Program interface (uniform layout and bindings).
    pub interface: &'a ProgramInterface,
    /// One buffer per vertex attribute, ordered by shader location.
    pub vertex_buffers: Vec<&'a B::Buffer>,
    /// Number of strip vertices to draw.
    pub vertex_count: u32,
    /// Packed uniform block, laid out per `interface`.
    pub uniforms: &'a [u8],
    /// Bound textures.
    pub textures: Vec<BoundTexture<'a, B>>,
}

/// Native graphics API operations.
///
/// Handles are plain values; the caller guarantees each is released exactly
/// once through the matching `release_*` method. Errors are diagnostic
/// strings that the manager wraps into its own error types.
pub trait Backend {
    /// Compiled shader module.
    type Shader;
    /// Linked program.
    type Program;
    /// Vertex buffer.
    type Buffer;
    /// 2D texture.
    type Texture;
    /// Off-screen render target wrapping a texture.
    type Target;

    /// Capabilities as advertised by the adapter.
    fn adapter_report(&self) -> AdapterReport;

    /// Create a shader module from validated IR.
    ///
    /// # Errors
    ///
    /// Returns the driver diagnostic if the module is rejected.
    fn create_shader(&mut self, shader: ValidatedShader<'_>) -> Result<Self::Shader, String>;
    /// Release a shader module.
    fn release_shader(&mut self, shader: Self::Shader);

    /// Link a program.
    ///
    /// # Errors
    ///
    /// Returns the linker diagnostic if the stages cannot be linked.
    fn create_program(&mut self, link: ProgramLink<'_, Self>) -> Result<Self::Program, String>;
    /// Release a program.
    fn release_program(&mut self, program: Self::Program);

    /// Create a vertex buffer holding `data`.
    fn create_buffer(&mut self, label: &str, data: &[f32]) -> Self::Buffer;
    /// Release a vertex buffer.
    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Allocate an uninitialized texture.
    fn create_texture(&mut self, alloc: &TextureAlloc<'_>) -> Self::Texture;
    /// Replace the texture's contents. `data` already matches its format.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if the upload is rejected.
    fn write_texture(&mut self, texture: &Self::Texture, data: &TexelData) -> Result<(), String>;
    /// Read the texture's contents back to the host.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if the readback fails.
    fn read_texture(&mut self, texture: &Self::Texture) -> Result<TexelImage, String>;
    /// Release a texture.
    fn release_texture(&mut self, texture: Self::Texture);

    /// Attach `texture` to a new off-screen target. Returns `None` if the
    /// resulting target is incomplete.
    fn create_target(&mut self, texture: &Self::Texture) -> Option<Self::Target>;
    /// Release an off-screen target. The attached texture is unaffected.
    fn release_target(&mut self, target: Self::Target);

    /// Fill the whole target with `color`.
    fn clear(&mut self, target: &Self::Target, color: [f32; 4]);
    /// Execute a draw into the target.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if the draw is rejected.
    fn draw(&mut self, target: &Self::Target, draw: BoundDraw<'_, Self>) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_formats_convert_but_rgba_does_not() {
        let data = TexelData::R32Float(vec![0.5, -1.25, 2.0]);
        let half = data.converted(TextureFormat::R16Float).unwrap();
        assert_eq!(half.format(), TextureFormat::R16Float);
        assert_eq!(half.red_channel(), vec![0.5, -1.25, 2.0]);
        assert!(data.converted(TextureFormat::Rgba8Unorm).is_none());
        assert!(TexelData::Rgba8(vec![0; 4])
            .converted(TextureFormat::R32Float)
            .is_none());
    }

    #[test]
    fn bytes_round_trip_per_format() {
        let data = TexelData::R32Float(vec![1.5, -3.0]);
        let rebuilt = TexelData::from_bytes(TextureFormat::R32Float, data.as_bytes());
        assert_eq!(rebuilt, data);
        assert_eq!(data.texel_count(), 2);
    }

    #[test]
    fn store_quantizes_rgba() {
        let mut data = TexelData::zeroed(TextureFormat::Rgba8Unorm, 1);
        data.store(0, [1.0, 0.5, -0.2, 2.0]);
        assert_eq!(data, TexelData::Rgba8(vec![255, 128, 0, 255]));
    }
}
