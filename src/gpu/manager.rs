//! Creation, destruction and bookkeeping for every graphics resource.
//!
//! The manager owns the [`Backend`], the shader composer and the capability
//! profile detected at construction. All resources flow through it, so it can
//! count live handles and release everything an aborted off-screen render
//! allocated.

use std::panic::{self, AssertUnwindSafe};

use super::backend::{Backend, ProgramLink, TexelData, TexelImage, TextureAlloc, TextureFormat, ValidatedShader};
use super::capabilities::{CapabilityProfile, DeviceQuirks};
use super::draw::RenderTarget;
use super::reflection::{ProgramInterface, ShaderInterface};
use super::resource::{
    Program, ProgramDescriptor, Resource, ResourceDescriptor, ResourceError, ResourceId, Shader,
    ShaderDescriptor, Texture, TextureKind, VertexBuffer,
};
use super::shader_composer::ShaderComposer;

/// Size of the presentation surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Rectangle of the surface that on-screen draws cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

type ResizeHandler = Box<dyn FnMut(SurfaceSize) + Send>;

/// Owns a backend and every resource created through it.
pub struct ResourceManager<B: Backend> {
    backend: B,
    composer: ShaderComposer,
    capabilities: CapabilityProfile,
    max_texture_dimension: u32,
    next_id: u64,
    live: usize,
    surface: SurfaceSize,
    viewport: Viewport,
    resize_handler: Option<ResizeHandler>,
}

impl<B: Backend> ResourceManager<B> {
    /// Wrap `backend`, detecting float render capabilities once through
    /// `quirks`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ShaderCompile`] if the shared shader modules
    /// fail to register.
    pub fn new(backend: B, quirks: &DeviceQuirks) -> Result<Self, ResourceError> {
        let report = backend.adapter_report();
        let capabilities = CapabilityProfile::detect(&report, quirks);
        log::info!(
            "Adapter '{}' ({}): float render target {:?}, float uploads {:?}",
            report.platform.adapter_name,
            report.platform.backend,
            capabilities.float_target_format(),
            capabilities.float_upload_format()
        );

        let composer = ShaderComposer::new().map_err(|log| ResourceError::ShaderCompile {
            label: "shared modules".to_owned(),
            log,
        })?;

        Ok(Self {
            backend,
            composer,
            capabilities,
            max_texture_dimension: report.max_texture_dimension,
            next_id: 0,
            live: 0,
            surface: SurfaceSize::default(),
            viewport: Viewport::default(),
            resize_handler: None,
        })
    }

    /// The wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(super) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Capabilities detected at construction.
    #[must_use]
    pub fn capabilities(&self) -> CapabilityProfile {
        self.capabilities
    }

    /// Resources (and in-flight render targets) created and not yet
    /// destroyed.
    #[must_use]
    pub fn live_resources(&self) -> usize {
        self.live
    }

    fn allocate_id(&mut self) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create any resource from a descriptor.
    ///
    /// # Errors
    ///
    /// Propagates the error of the kind-specific constructor.
    pub fn create(
        &mut self,
        descriptor: ResourceDescriptor<'_, B>,
    ) -> Result<Resource<B>, ResourceError> {
        match descriptor {
            ResourceDescriptor::Shader(d) => self.create_shader(&d).map(Resource::from),
            ResourceDescriptor::Program(d) => self.create_program(&d).map(Resource::from),
            ResourceDescriptor::VertexBuffer {
                label,
                data,
                components,
            } => self
                .create_vertex_buffer(label, data, components)
                .map(Resource::from),
            ResourceDescriptor::Texture {
                kind,
                width,
                height,
                data,
            } => self
                .create_texture(kind, width, height, data)
                .map(Resource::from),
        }
    }

    /// Compose, validate and reflect a shader stage.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ShaderCompile`] carrying the full compiler
    /// diagnostic. No handle is left allocated.
    pub fn create_shader(
        &mut self,
        descriptor: &ShaderDescriptor<'_>,
    ) -> Result<Shader<B>, ResourceError> {
        let compile_error = |log: String| ResourceError::ShaderCompile {
            label: descriptor.label.to_owned(),
            log,
        };
        let module = self
            .composer
            .compose(descriptor.source, descriptor.file_path)
            .map_err(compile_error)?;
        let interface = ShaderInterface::reflect(&module, descriptor.stage).map_err(compile_error)?;
        let native = self
            .backend
            .create_shader(ValidatedShader {
                label: descriptor.label,
                stage: descriptor.stage,
                module,
                host: descriptor.host.clone(),
            })
            .map_err(compile_error)?;

        let id = self.allocate_id();
        self.live += 1;
        log::debug!("Created shader '{}' ({id:?})", descriptor.label);
        Ok(Shader {
            id,
            native,
            label: descriptor.label.to_owned(),
            interface,
        })
    }

    /// Link a vertex and a fragment shader into a program and cache its
    /// name→location tables.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ProgramLink`] carrying the link diagnostic.
    /// No handle is left allocated.
    pub fn create_program(
        &mut self,
        descriptor: &ProgramDescriptor<'_, B>,
    ) -> Result<Program<B>, ResourceError> {
        let link_error = |log: String| ResourceError::ProgramLink {
            label: descriptor.label.to_owned(),
            log,
        };
        let interface =
            ProgramInterface::link(&descriptor.vertex.interface, &descriptor.fragment.interface)
                .map_err(link_error)?;
        let format = match descriptor.target {
            TextureKind::Rgba8 => TextureFormat::Rgba8Unorm,
            TextureKind::Float32 => self
                .capabilities
                .float_target_format()
                .ok_or_else(|| link_error("no renderable float format on this device".to_owned()))?,
        };
        let native = self
            .backend
            .create_program(ProgramLink {
                label: descriptor.label,
                vertex: &descriptor.vertex.native,
                fragment: &descriptor.fragment.native,
                interface: &interface,
                format,
            })
            .map_err(link_error)?;

        let id = self.allocate_id();
        self.live += 1;
        log::debug!("Linked program '{}' ({id:?})", descriptor.label);
        Ok(Program {
            id,
            native,
            label: descriptor.label.to_owned(),
            interface,
            target: descriptor.target,
        })
    }

    /// Upload `components`-wide vertex data.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidVertexData`] if `components` is not
    /// 1..=4 or `data` does not divide into whole vertices.
    pub fn create_vertex_buffer(
        &mut self,
        label: &str,
        data: &[f32],
        components: u32,
    ) -> Result<VertexBuffer<B>, ResourceError> {
        if !(1..=4).contains(&components) {
            return Err(ResourceError::InvalidVertexData {
                label: label.to_owned(),
                reason: format!("{components} components per vertex"),
            });
        }
        if data.len() % components as usize != 0 {
            return Err(ResourceError::InvalidVertexData {
                label: label.to_owned(),
                reason: format!(
                    "{} floats do not divide into {components}-component vertices",
                    data.len()
                ),
            });
        }

        let native = self.backend.create_buffer(label, data);
        let id = self.allocate_id();
        self.live += 1;
        Ok(VertexBuffer {
            id,
            native,
            label: label.to_owned(),
            components,
            vertex_count: (data.len() / components as usize) as u32,
        })
    }

    fn allocate_texture(
        &mut self,
        kind: TextureKind,
        format: TextureFormat,
        width: u32,
        height: u32,
        renderable: bool,
    ) -> Result<Texture<B>, ResourceError> {
        let max = self.max_texture_dimension;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(ResourceError::TextureSize { width, height, max });
        }
        let native = self.backend.create_texture(&TextureAlloc {
            label: match kind {
                TextureKind::Rgba8 => "RGBA Texture",
                TextureKind::Float32 => "Float Texture",
            },
            format,
            width,
            height,
            renderable,
        });
        let id = self.allocate_id();
        self.live += 1;
        Ok(Texture {
            id,
            native,
            kind,
            format,
            width,
            height,
        })
    }

    /// Create a sample-only texture, optionally filled with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TextureSize`] for empty or oversized
    /// dimensions, or any error of [`load_texture`](Self::load_texture). No
    /// handle is left allocated on failure.
    pub fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        data: Option<&TexelData>,
    ) -> Result<Texture<B>, ResourceError> {
        let format = match kind {
            TextureKind::Rgba8 => TextureFormat::Rgba8Unorm,
            TextureKind::Float32 => self.capabilities.float_upload_format(),
        };
        let texture = self.allocate_texture(kind, format, width, height, false)?;
        if let Some(data) = data {
            if let Err(e) = self.load_texture(&texture, data) {
                self.release(Resource::Texture(texture));
                return Err(e);
            }
        }
        Ok(texture)
    }

    /// Replace a texture's contents. Float data is converted to the
    /// texture's precision.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DataLength`] or
    /// [`ResourceError::FormatMismatch`] if `data` does not fit the texture,
    /// or [`ResourceError::Upload`] if the backend rejects it.
    pub fn load_texture(
        &mut self,
        texture: &Texture<B>,
        data: &TexelData,
    ) -> Result<(), ResourceError> {
        let expected = texture.width as usize * texture.height as usize;
        if data.texel_count() != expected {
            return Err(ResourceError::DataLength {
                expected,
                actual: data.texel_count(),
            });
        }
        let converted = data
            .converted(texture.format)
            .ok_or(ResourceError::FormatMismatch {
                expected: texture.format,
                actual: data.format(),
            })?;
        self.backend
            .write_texture(&texture.native, &converted)
            .map_err(ResourceError::Upload)
    }

    /// Copy a texture's contents back to the host.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Readback`] if the backend fails.
    pub fn read_texture(&mut self, texture: &Texture<B>) -> Result<TexelImage, ResourceError> {
        self.backend
            .read_texture(&texture.native)
            .map_err(ResourceError::Readback)
    }

    /// Render into a fresh `width`×`height` texture.
    ///
    /// A texture and an off-screen target are allocated and `draw` runs with
    /// the target bound and the viewport covering it. Afterwards the target
    /// is released and the texture returned.
    ///
    /// Returns `Ok(None)` when no suitable render format exists for `kind`,
    /// the dimensions are unusable, or the target is incomplete; everything
    /// allocated is released first. If `draw` fails or panics, the target
    /// and texture are released before the error is returned or the panic
    /// resumes.
    ///
    /// # Errors
    ///
    /// Returns whatever `draw` returns.
    pub fn render_to_texture<E, F>(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        draw: F,
    ) -> Result<Option<Texture<B>>, E>
    where
        F: FnOnce(&mut RenderTarget<'_, B>) -> Result<(), E>,
    {
        let format = match kind {
            TextureKind::Rgba8 => TextureFormat::Rgba8Unorm,
            TextureKind::Float32 => {
                let Some(format) = self.capabilities.float_target_format() else {
                    log::debug!("No float render target format; skipping off-screen render");
                    return Ok(None);
                };
                format
            }
        };
        let texture = match self.allocate_texture(kind, format, width, height, true) {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("Off-screen render skipped: {e}");
                return Ok(None);
            }
        };
        let Some(target) = self.backend.create_target(&texture.native) else {
            log::warn!("Off-screen target for {format:?} is incomplete");
            self.release(Resource::Texture(texture));
            return Ok(None);
        };
        self.live += 1;

        let texture_id = texture.id;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut bound = RenderTarget {
                manager: &mut *self,
                target: &target,
                texture: texture_id,
                width,
                height,
            };
            draw(&mut bound)
        }));

        self.backend.release_target(target);
        self.live -= 1;

        match outcome {
            Ok(Ok(())) => Ok(Some(texture)),
            Ok(Err(e)) => {
                self.release(Resource::Texture(texture));
                Err(e)
            }
            Err(payload) => {
                self.release(Resource::Texture(texture));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Release resources. Accepts resources or `Option`s of them; `None`
    /// entries are skipped.
    pub fn destroy<I, R>(&mut self, resources: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<Option<Resource<B>>>,
    {
        for resource in resources {
            if let Some(resource) = resource.into() {
                self.release(resource);
            }
        }
    }

    fn release(&mut self, resource: Resource<B>) {
        log::debug!("Destroying {resource:?}");
        match resource {
            Resource::Shader(r) => self.backend.release_shader(r.native),
            Resource::Program(r) => self.backend.release_program(r.native),
            Resource::VertexBuffer(r) => self.backend.release_buffer(r.native),
            Resource::Texture(r) => self.backend.release_texture(r.native),
        }
        self.live -= 1;
    }

    /// Current surface size.
    #[must_use]
    pub fn surface_size(&self) -> SurfaceSize {
        self.surface
    }

    /// Current on-screen viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Record a new surface size, reset the viewport to cover it and notify
    /// the resize handler. Zero-sized dimensions are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface = SurfaceSize { width, height };
        self.viewport = Viewport {
            x: 0,
            y: 0,
            width,
            height,
        };
        if let Some(handler) = self.resize_handler.as_mut() {
            handler(self.surface);
        }
    }

    /// Install the resize handler, replacing any previous one.
    pub fn set_resize_handler(&mut self, handler: impl FnMut(SurfaceSize) + Send + 'static) {
        if self.resize_handler.replace(Box::new(handler)).is_some() {
            log::debug!("Replaced resize handler");
        }
    }

    /// Remove the resize handler. Returns whether one was installed.
    pub fn clear_resize_handler(&mut self) -> bool {
        self.resize_handler.take().is_some()
    }
}

impl<B: Backend> Drop for ResourceManager<B> {
    fn drop(&mut self) {
        if self.live > 0 {
            log::warn!(
                "Resource manager dropped with {} live resource(s)",
                self.live
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareBackend;

    fn manager() -> ResourceManager<SoftwareBackend> {
        ResourceManager::new(SoftwareBackend::new(), &DeviceQuirks::none()).unwrap()
    }

    #[test]
    fn vertex_buffers_must_hold_whole_vertices() {
        let mut manager = manager();
        let err = manager
            .create_vertex_buffer("bad", &[0.0, 1.0, 2.0], 2)
            .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidVertexData { .. }));
        assert_eq!(manager.live_resources(), 0);

        let buffer = manager.create_vertex_buffer("good", &[0.0; 8], 2).unwrap();
        assert_eq!(buffer.vertex_count(), 4);
        manager.destroy([Resource::from(buffer)]);
        assert_eq!(manager.live_resources(), 0);
    }

    #[test]
    fn failed_upload_leaves_nothing_allocated() {
        let mut manager = manager();
        let data = TexelData::Rgba8(vec![0; 4 * 3]);
        let err = manager
            .create_texture(TextureKind::Rgba8, 2, 2, Some(&data))
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::DataLength {
                expected: 4,
                actual: 3
            }
        );
        assert_eq!(manager.live_resources(), 0);
        assert_eq!(manager.backend().live_handles(), 0);
    }

    #[test]
    fn float_data_is_converted_to_half_precision() {
        let backend = SoftwareBackend::new().with_float_targets(false, true);
        let mut manager = ResourceManager::new(backend, &DeviceQuirks::none()).unwrap();
        let data = TexelData::R32Float(vec![0.25, -2.0]);
        let texture = manager
            .create_texture(TextureKind::Float32, 2, 1, Some(&data))
            .unwrap();
        assert_eq!(texture.format(), TextureFormat::R16Float);
        let image = manager.read_texture(&texture).unwrap();
        assert_eq!(image.data.red_channel(), vec![0.25, -2.0]);
        manager.destroy([Some(Resource::from(texture)), None]);
        assert_eq!(manager.live_resources(), 0);
    }

    #[test]
    fn oversized_textures_are_rejected() {
        let mut manager = manager();
        let err = manager
            .create_texture(TextureKind::Rgba8, 0, 4, None)
            .unwrap_err();
        assert!(matches!(err, ResourceError::TextureSize { .. }));
    }

    #[test]
    fn resize_ignores_zero_and_resets_viewport() {
        let mut manager = manager();
        manager.resize(0, 10);
        assert_eq!(manager.surface_size(), SurfaceSize::default());
        manager.resize(640, 480);
        assert_eq!(
            manager.viewport(),
            Viewport {
                x: 0,
                y: 0,
                width: 640,
                height: 480
            }
        );
    }
}
