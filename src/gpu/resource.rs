//! Typed graphics resources owned by the [`ResourceManager`].
//!
//! Every resource is a move-only value without `Clone` or `Drop`. Handing one
//! to [`ResourceManager::destroy`] consumes it, so a handle cannot be released
//! twice; dropping one without destroying it leaks the native handle and shows
//! up in [`ResourceManager::live_resources`].
//!
//! [`ResourceManager`]: super::manager::ResourceManager
//! [`ResourceManager::destroy`]: super::manager::ResourceManager::destroy
//! [`ResourceManager::live_resources`]: super::manager::ResourceManager::live_resources

use std::fmt;
use std::sync::Arc;

use super::backend::{Backend, ShaderStage, TexelData, TextureFormat};
use super::reflection::{ProgramInterface, ShaderInterface};
use super::software::FragmentKernel;

/// Unique id assigned to every resource by its manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

/// Resource kinds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A compiled shader stage.
    Shader,
    /// A linked vertex + fragment program.
    Program,
    /// A buffer of `f32` vertex attributes.
    VertexBuffer,
    /// A 2D texture.
    Texture,
}

/// Texture flavours callers request. The concrete format is chosen by the
/// manager from its capability profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// 8-bit RGBA.
    Rgba8,
    /// Single-channel float (`R32Float`, or `R16Float` on half-only devices).
    Float32,
}

/// Source for a shader stage.
#[derive(Clone)]
pub struct ShaderDescriptor<'a> {
    /// Debug label, also used in diagnostics.
    pub label: &'a str,
    /// Stage the source provides.
    pub stage: ShaderStage,
    /// WGSL source; may `#import` the crate's shared modules.
    pub source: &'a str,
    /// Path reported in composition diagnostics.
    pub file_path: &'a str,
    /// Host implementation of a fragment stage, used by backends that do not
    /// execute WGSL.
    pub host: Option<Arc<dyn FragmentKernel>>,
}

/// Inputs for linking a program.
pub struct ProgramDescriptor<'a, B: Backend> {
    /// Debug label.
    pub label: &'a str,
    /// Vertex stage.
    pub vertex: &'a Shader<B>,
    /// Fragment stage.
    pub fragment: &'a Shader<B>,
    /// Kind of texture the program renders into.
    pub target: TextureKind,
}

/// Descriptor for the generic [`create`](super::manager::ResourceManager::create)
/// entry point.
pub enum ResourceDescriptor<'a, B: Backend> {
    /// See [`ShaderDescriptor`].
    Shader(ShaderDescriptor<'a>),
    /// See [`ProgramDescriptor`].
    Program(ProgramDescriptor<'a, B>),
    /// Interleaving-free vertex data, `components` floats per vertex.
    VertexBuffer {
        /// Debug label.
        label: &'a str,
        /// Vertex data.
        data: &'a [f32],
        /// Floats per vertex (1..=4).
        components: u32,
    },
    /// A texture, optionally initialized with `data`.
    Texture {
        /// Requested kind.
        kind: TextureKind,
        /// Width in texels.
        width: u32,
        /// Height in texels.
        height: u32,
        /// Initial contents.
        data: Option<&'a TexelData>,
    },
}

/// A compiled shader stage.
pub struct Shader<B: Backend> {
    pub(super) id: ResourceId,
    pub(super) native: B::Shader,
    pub(super) label: String,
    pub(super) interface: ShaderInterface,
}

impl<B: Backend> Shader<B> {
    /// Stage this shader provides.
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.interface.stage
    }

    /// Debug label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A linked program with its cached name→location tables.
pub struct Program<B: Backend> {
    pub(super) id: ResourceId,
    pub(super) native: B::Program,
    pub(super) label: String,
    pub(super) interface: ProgramInterface,
    pub(super) target: TextureKind,
}

impl<B: Backend> Program<B> {
    /// Reflected attribute/uniform/texture locations.
    #[must_use]
    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    /// Kind of texture the program renders into.
    #[must_use]
    pub fn target(&self) -> TextureKind {
        self.target
    }
}

/// A buffer of vertex attribute data.
pub struct VertexBuffer<B: Backend> {
    pub(super) id: ResourceId,
    pub(super) native: B::Buffer,
    pub(super) label: String,
    pub(super) components: u32,
    pub(super) vertex_count: u32,
}

impl<B: Backend> VertexBuffer<B> {
    /// Floats per vertex.
    #[must_use]
    pub fn components(&self) -> u32 {
        self.components
    }

    /// Number of vertices stored.
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// A 2D texture.
pub struct Texture<B: Backend> {
    pub(super) id: ResourceId,
    pub(super) native: B::Texture,
    pub(super) kind: TextureKind,
    pub(super) format: TextureFormat,
    pub(super) width: u32,
    pub(super) height: u32,
}

impl<B: Backend> Texture<B> {
    /// Requested kind.
    #[must_use]
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    /// Concrete format chosen by the manager.
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// `(width, height)` in texels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Manager-assigned id.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// Closed set of resources; destruction dispatches exhaustively on it.
pub enum Resource<B: Backend> {
    /// A shader stage.
    Shader(Shader<B>),
    /// A linked program.
    Program(Program<B>),
    /// A vertex buffer.
    VertexBuffer(VertexBuffer<B>),
    /// A texture.
    Texture(Texture<B>),
}

impl<B: Backend> Resource<B> {
    /// Kind tag of the resource.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Shader(_) => ResourceKind::Shader,
            Self::Program(_) => ResourceKind::Program,
            Self::VertexBuffer(_) => ResourceKind::VertexBuffer,
            Self::Texture(_) => ResourceKind::Texture,
        }
    }

    /// Manager-assigned id.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Shader(r) => r.id,
            Self::Program(r) => r.id,
            Self::VertexBuffer(r) => r.id,
            Self::Texture(r) => r.id,
        }
    }

    /// Unwrap a shader, handing the resource back on kind mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` if it is not a shader.
    pub fn into_shader(self) -> Result<Shader<B>, Self> {
        match self {
            Self::Shader(r) => Ok(r),
            other => Err(other),
        }
    }

    /// Unwrap a program, handing the resource back on kind mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` if it is not a program.
    pub fn into_program(self) -> Result<Program<B>, Self> {
        match self {
            Self::Program(r) => Ok(r),
            other => Err(other),
        }
    }

    /// Unwrap a vertex buffer, handing the resource back on kind mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` if it is not a vertex buffer.
    pub fn into_vertex_buffer(self) -> Result<VertexBuffer<B>, Self> {
        match self {
            Self::VertexBuffer(r) => Ok(r),
            other => Err(other),
        }
    }

    /// Unwrap a texture, handing the resource back on kind mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` if it is not a texture.
    pub fn into_texture(self) -> Result<Texture<B>, Self> {
        match self {
            Self::Texture(r) => Ok(r),
            other => Err(other),
        }
    }
}

impl<B: Backend> From<Shader<B>> for Resource<B> {
    fn from(r: Shader<B>) -> Self {
        Self::Shader(r)
    }
}

impl<B: Backend> From<Program<B>> for Resource<B> {
    fn from(r: Program<B>) -> Self {
        Self::Program(r)
    }
}

impl<B: Backend> From<VertexBuffer<B>> for Resource<B> {
    fn from(r: VertexBuffer<B>) -> Self {
        Self::VertexBuffer(r)
    }
}

impl<B: Backend> From<Texture<B>> for Resource<B> {
    fn from(r: Texture<B>) -> Self {
        Self::Texture(r)
    }
}

impl<B: Backend> fmt::Debug for Shader<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("stage", &self.interface.stage)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> fmt::Debug for Program<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> fmt::Debug for VertexBuffer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("components", &self.components)
            .field("vertex_count", &self.vertex_count)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> fmt::Debug for Texture<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> fmt::Debug for Resource<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shader(r) => r.fmt(f),
            Self::Program(r) => r.fmt(f),
            Self::VertexBuffer(r) => r.fmt(f),
            Self::Texture(r) => r.fmt(f),
        }
    }
}

/// Failures creating, filling or reading back resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Shader composition, parsing or validation failed.
    ShaderCompile {
        /// Shader label.
        label: String,
        /// Compiler diagnostic, verbatim.
        log: String,
    },
    /// Program linking failed.
    ProgramLink {
        /// Program label.
        label: String,
        /// Linker diagnostic, verbatim.
        log: String,
    },
    /// Vertex data does not divide into whole vertices.
    InvalidVertexData {
        /// Buffer label.
        label: String,
        /// What was wrong.
        reason: String,
    },
    /// Texture dimensions are zero or exceed the device limit.
    TextureSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Device limit.
        max: u32,
    },
    /// Texel data length does not match the texture size.
    DataLength {
        /// Texels the texture holds.
        expected: usize,
        /// Texels supplied.
        actual: usize,
    },
    /// Texel data cannot be converted into the texture's format.
    FormatMismatch {
        /// Texture format.
        expected: TextureFormat,
        /// Data format.
        actual: TextureFormat,
    },
    /// The backend rejected an upload.
    Upload(String),
    /// The backend failed to read a texture back.
    Readback(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShaderCompile { label, log } => {
                write!(f, "shader '{label}' failed to compile:\n{log}")
            }
            Self::ProgramLink { label, log } => {
                write!(f, "program '{label}' failed to link:\n{log}")
            }
            Self::InvalidVertexData { label, reason } => {
                write!(f, "invalid vertex data for '{label}': {reason}")
            }
            Self::TextureSize { width, height, max } => write!(
                f,
                "texture size {width}x{height} outside 1..={max}"
            ),
            Self::DataLength { expected, actual } => write!(
                f,
                "texel data holds {actual} texels, texture holds {expected}"
            ),
            Self::FormatMismatch { expected, actual } => write!(
                f,
                "texel data in {actual:?} cannot fill a {expected:?} texture"
            ),
            Self::Upload(msg) => write!(f, "texture upload failed: {msg}"),
            Self::Readback(msg) => write!(f, "texture readback failed: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}
