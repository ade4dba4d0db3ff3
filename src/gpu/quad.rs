//! Full-target quad programs: a shared vertex stage drawing a clip-space
//! triangle strip, paired with one fragment stage.

use std::sync::Arc;

use super::backend::{Backend, ShaderStage};
use super::draw::{DrawCall, DrawError, RenderTarget, UniformValue};
use super::manager::ResourceManager;
use super::resource::{
    Program, ProgramDescriptor, Resource, ResourceError, Shader, ShaderDescriptor, Texture,
    TextureKind, VertexBuffer,
};
use super::shader_composer::QUAD_VERTEX;
use super::software::FragmentKernel;

/// Clip-space corners of the strip covering the target.
const QUAD_CORNERS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Resources of one full-target program.
pub struct QuadPipeline<B: Backend> {
    vertex: Shader<B>,
    fragment: Shader<B>,
    program: Program<B>,
    quad: VertexBuffer<B>,
}

impl<B: Backend> QuadPipeline<B> {
    /// Compile `fragment_source` against the quad vertex stage and link them.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError`]. Whatever was created before the
    /// failure is destroyed.
    pub fn create(
        manager: &mut ResourceManager<B>,
        label: &str,
        fragment_source: &str,
        file_path: &str,
        host: Arc<dyn FragmentKernel>,
        target: TextureKind,
    ) -> Result<Self, ResourceError> {
        let vertex = manager.create_shader(&ShaderDescriptor {
            label: "Quad Vertex",
            stage: ShaderStage::Vertex,
            source: QUAD_VERTEX,
            file_path: "quad.wgsl",
            host: None,
        })?;

        let fragment = match manager.create_shader(&ShaderDescriptor {
            label,
            stage: ShaderStage::Fragment,
            source: fragment_source,
            file_path,
            host: Some(host),
        }) {
            Ok(shader) => shader,
            Err(e) => {
                manager.destroy([Resource::from(vertex)]);
                return Err(e);
            }
        };

        let program = match manager.create_program(&ProgramDescriptor {
            label,
            vertex: &vertex,
            fragment: &fragment,
            target,
        }) {
            Ok(program) => program,
            Err(e) => {
                manager.destroy([Resource::from(vertex), Resource::from(fragment)]);
                return Err(e);
            }
        };

        let quad = match manager.create_vertex_buffer("Quad Corners", &QUAD_CORNERS, 2) {
            Ok(buffer) => buffer,
            Err(e) => {
                manager.destroy([
                    Resource::from(vertex),
                    Resource::from(fragment),
                    Resource::from(program),
                ]);
                return Err(e);
            }
        };

        Ok(Self {
            vertex,
            fragment,
            program,
            quad,
        })
    }

    /// The linked program.
    #[must_use]
    pub fn program(&self) -> &Program<B> {
        &self.program
    }

    /// Draw the quad over the whole target.
    ///
    /// # Errors
    ///
    /// Returns the [`DrawError`] of the underlying draw.
    pub fn draw(
        &self,
        target: &mut RenderTarget<'_, B>,
        uniforms: &[(&str, UniformValue)],
        textures: &[(&str, &Texture<B>)],
    ) -> Result<(), DrawError> {
        target.draw(&DrawCall {
            program: &self.program,
            attributes: &[("corner", &self.quad)],
            vertex_count: self.quad.vertex_count(),
            uniforms,
            textures,
        })
    }

    /// Destroy every resource of the pipeline.
    pub fn release(self, manager: &mut ResourceManager<B>) {
        manager.destroy([
            Resource::from(self.quad),
            Resource::from(self.program),
            Resource::from(self.fragment),
            Resource::from(self.vertex),
        ]);
    }
}
