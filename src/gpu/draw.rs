//! Draw calls against an off-screen render target.

use std::fmt;

use super::backend::{Backend, BoundDraw, BoundTexture};
use super::manager::ResourceManager;
use super::reflection::{ProgramInterface, UniformType};
use super::resource::{Program, ResourceError, ResourceId, Texture, VertexBuffer};

/// A value for one uniform member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `f32`
    F32(f32),
    /// `i32`
    I32(i32),
    /// `u32`
    U32(u32),
    /// `vec2<f32>`
    Vec2([f32; 2]),
}

impl UniformValue {
    const fn ty(self) -> UniformType {
        match self {
            Self::F32(_) => UniformType::F32,
            Self::I32(_) => UniformType::I32,
            Self::U32(_) => UniformType::U32,
            Self::Vec2(_) => UniformType::Vec2F32,
        }
    }

    fn write(self, block: &mut [u8], offset: usize) {
        match self {
            Self::F32(v) => block[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
            Self::I32(v) => block[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
            Self::U32(v) => block[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
            Self::Vec2([x, y]) => {
                block[offset..offset + 4].copy_from_slice(&x.to_le_bytes());
                block[offset + 4..offset + 8].copy_from_slice(&y.to_le_bytes());
            }
        }
    }
}

/// One triangle-strip draw, with every input addressed by shader name.
///
/// Uniforms the call leaves out are zero.
pub struct DrawCall<'a, B: Backend> {
    /// Program to run.
    pub program: &'a Program<B>,
    /// Vertex buffers keyed by attribute name.
    pub attributes: &'a [(&'a str, &'a VertexBuffer<B>)],
    /// Number of strip vertices to draw, starting from the first.
    pub vertex_count: u32,
    /// Uniform values keyed by member name.
    pub uniforms: &'a [(&'a str, UniformValue)],
    /// Textures keyed by variable name.
    pub textures: &'a [(&'a str, &'a Texture<B>)],
}

/// A draw call that does not match its program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    /// The program has no attribute of this name.
    UnknownAttribute(String),
    /// The program consumes an attribute the call does not supply.
    MissingAttribute(String),
    /// The buffer's vertex width differs from the attribute's.
    AttributeComponents {
        /// Attribute name.
        name: String,
        /// Components the shader expects.
        expected: u32,
        /// Components the buffer stores.
        actual: u32,
    },
    /// A buffer holds fewer vertices than the call draws.
    VertexRange {
        /// Attribute name.
        name: String,
        /// Vertices requested.
        requested: u32,
        /// Vertices stored.
        available: u32,
    },
    /// The program has no uniform of this name.
    UnknownUniform(String),
    /// The value's type differs from the uniform's.
    UniformType {
        /// Uniform name.
        name: String,
        /// Type the shader declares.
        expected: UniformType,
    },
    /// The program has no texture of this name.
    UnknownTexture(String),
    /// The program samples a texture the call does not bind.
    MissingTexture(String),
    /// The target's own texture is bound as an input.
    FeedbackLoop(String),
    /// The backend rejected the draw.
    Backend(String),
}

impl fmt::Display for DrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAttribute(name) => write!(f, "program has no attribute '{name}'"),
            Self::MissingAttribute(name) => write!(f, "attribute '{name}' is not bound"),
            Self::AttributeComponents {
                name,
                expected,
                actual,
            } => write!(
                f,
                "attribute '{name}' expects {expected} components, buffer has {actual}"
            ),
            Self::VertexRange {
                name,
                requested,
                available,
            } => write!(
                f,
                "draw of {requested} vertices exceeds the {available} stored for '{name}'"
            ),
            Self::UnknownUniform(name) => write!(f, "program has no uniform '{name}'"),
            Self::UniformType { name, expected } => {
                write!(f, "uniform '{name}' has type {expected:?}")
            }
            Self::UnknownTexture(name) => write!(f, "program has no texture '{name}'"),
            Self::MissingTexture(name) => write!(f, "texture '{name}' is not bound"),
            Self::FeedbackLoop(name) => write!(
                f,
                "texture '{name}' is the render target and cannot be sampled"
            ),
            Self::Backend(msg) => write!(f, "draw failed: {msg}"),
        }
    }
}

impl std::error::Error for DrawError {}

/// Failure of an off-screen render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A resource the pass needed could not be created or read back.
    Resource(ResourceError),
    /// A draw did not match its program.
    Draw(DrawError),
    /// No off-screen target could be allocated for the requested size.
    TargetUnavailable {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(e) => write!(f, "{e}"),
            Self::Draw(e) => write!(f, "{e}"),
            Self::TargetUnavailable { width, height } => {
                write!(f, "no off-screen target available for {width}x{height}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resource(e) => Some(e),
            Self::Draw(e) => Some(e),
            Self::TargetUnavailable { .. } => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

impl From<DrawError> for RenderError {
    fn from(e: DrawError) -> Self {
        Self::Draw(e)
    }
}

/// A bound off-screen target, handed to the callback of
/// [`ResourceManager::render_to_texture`].
///
/// The manager stays usable through [`manager`](Self::manager) so callbacks
/// can create and destroy intermediate resources.
pub struct RenderTarget<'a, B: Backend> {
    pub(super) manager: &'a mut ResourceManager<B>,
    pub(super) target: &'a B::Target,
    pub(super) texture: ResourceId,
    pub(super) width: u32,
    pub(super) height: u32,
}

impl<B: Backend> RenderTarget<'_, B> {
    /// The owning manager.
    pub fn manager(&mut self) -> &mut ResourceManager<B> {
        self.manager
    }

    /// `(width, height)` of the target, which is also the viewport.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Fill the whole target with `color`.
    pub fn clear(&mut self, color: [f32; 4]) {
        self.manager.backend_mut().clear(self.target, color);
    }

    /// Resolve names against the program's cached interface and draw.
    ///
    /// # Errors
    ///
    /// Returns a [`DrawError`] if the call does not match the program or the
    /// backend rejects it. Nothing is drawn in that case.
    pub fn draw(&mut self, call: &DrawCall<'_, B>) -> Result<(), DrawError> {
        let interface = call.program.interface();
        let vertex_buffers = resolve_attributes(interface, call)?;
        let uniforms = pack_uniforms(interface, call.uniforms)?;

        let mut textures = Vec::with_capacity(call.textures.len());
        for (name, texture) in call.textures {
            let binding = interface
                .texture_binding(name)
                .ok_or_else(|| DrawError::UnknownTexture((*name).to_owned()))?;
            if texture.id == self.texture {
                return Err(DrawError::FeedbackLoop((*name).to_owned()));
            }
            textures.push(BoundTexture {
                name: *name,
                binding,
                texture: &texture.native,
            });
        }
        for (name, _) in interface.textures() {
            if !textures.iter().any(|t| t.name == name) {
                return Err(DrawError::MissingTexture(name.to_owned()));
            }
        }

        let bound = BoundDraw {
            program: &call.program.native,
            interface,
            vertex_buffers,
            vertex_count: call.vertex_count,
            uniforms: &uniforms,
            textures,
        };
        self.manager
            .backend_mut()
            .draw(self.target, bound)
            .map_err(DrawError::Backend)
    }
}

fn resolve_attributes<'a, B: Backend>(
    interface: &ProgramInterface,
    call: &DrawCall<'a, B>,
) -> Result<Vec<&'a B::Buffer>, DrawError> {
    for (name, _) in call.attributes {
        if interface.attribute(name).is_none() {
            return Err(DrawError::UnknownAttribute((*name).to_owned()));
        }
    }

    let mut buffers = Vec::new();
    for (name, attribute) in interface.attributes() {
        let (_, buffer) = call
            .attributes
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| DrawError::MissingAttribute(name.to_owned()))?;
        if buffer.components != attribute.components {
            return Err(DrawError::AttributeComponents {
                name: name.to_owned(),
                expected: attribute.components,
                actual: buffer.components,
            });
        }
        if buffer.vertex_count < call.vertex_count {
            return Err(DrawError::VertexRange {
                name: name.to_owned(),
                requested: call.vertex_count,
                available: buffer.vertex_count,
            });
        }
        buffers.push(&buffer.native);
    }
    Ok(buffers)
}

fn pack_uniforms(
    interface: &ProgramInterface,
    values: &[(&str, UniformValue)],
) -> Result<Vec<u8>, DrawError> {
    let size = interface.uniform_block().map_or(0, |block| block.size as usize);
    let mut block = vec![0u8; size];
    for (name, value) in values {
        let member = interface
            .uniform(name)
            .ok_or_else(|| DrawError::UnknownUniform((*name).to_owned()))?;
        if member.ty != value.ty() {
            return Err(DrawError::UniformType {
                name: (*name).to_owned(),
                expected: member.ty,
            });
        }
        value.write(&mut block, member.offset as usize);
    }
    Ok(block)
}
