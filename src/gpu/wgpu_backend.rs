//! [`Backend`] over a real wgpu device.

use std::borrow::Cow;
use std::sync::mpsc;

use wgpu::util::DeviceExt;

use super::backend::{
    AdapterReport, Backend, BoundDraw, ProgramLink, ShaderStage, TexelData, TexelImage,
    TextureAlloc, TextureFormat, ValidatedShader,
};
use super::pipeline_helpers::{
    create_strip_pipeline, layout_entries, vertex_attributes, vertex_buffer_layouts, wgpu_format,
};
use super::render_context::RenderContext;

/// Uniform buffers are allocated in multiples of this many bytes.
const UNIFORM_ALIGNMENT: u64 = 16;

/// Compiled shader module.
pub struct WgpuShader {
    module: wgpu::ShaderModule,
    stage: ShaderStage,
}

/// Linked render pipeline and its group-0 layout.
pub struct WgpuProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// 2D texture with a default view.
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TextureFormat,
    width: u32,
    height: u32,
}

/// Off-screen target: a color-attachment view of a texture.
pub struct WgpuTarget {
    view: wgpu::TextureView,
}

/// The wgpu [`Backend`].
pub struct WgpuBackend {
    context: RenderContext,
}

impl WgpuBackend {
    /// Wrap an initialized render context.
    #[must_use]
    pub fn new(context: RenderContext) -> Self {
        Self { context }
    }

    /// The underlying render context.
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Run `f` inside a validation error scope and return the captured
    /// error, if any, as a diagnostic string.
    fn validated<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(device);
        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    /// Block until `buffer` is mapped for reading.
    fn map_blocking(&self, buffer: &wgpu::Buffer) -> Result<(), String> {
        let (tx, rx) = mpsc::channel();
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.context.device.poll(wgpu::PollType::Wait);
        match rx.recv() {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("buffer mapping was abandoned".to_owned()),
        }
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

impl Backend for WgpuBackend {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Buffer = wgpu::Buffer;
    type Texture = WgpuTexture;
    type Target = WgpuTarget;

    fn adapter_report(&self) -> AdapterReport {
        self.context.adapter_report().clone()
    }

    fn create_shader(&mut self, shader: ValidatedShader<'_>) -> Result<Self::Shader, String> {
        let module = self.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.label),
                source: wgpu::ShaderSource::Naga(Cow::Owned(shader.module)),
            })
        })?;
        Ok(WgpuShader {
            module,
            stage: shader.stage,
        })
    }

    fn release_shader(&mut self, _shader: Self::Shader) {}

    fn create_program(&mut self, link: ProgramLink<'_, Self>) -> Result<Self::Program, String> {
        if link.vertex.stage != ShaderStage::Vertex || link.fragment.stage != ShaderStage::Fragment {
            return Err("program needs one vertex and one fragment shader".to_owned());
        }
        let attributes = vertex_attributes(link.interface);
        let buffers = vertex_buffer_layouts(&attributes);
        self.validated(|device| {
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{} Bind Group Layout", link.label)),
                    entries: &layout_entries(link.interface),
                });
            let pipeline = create_strip_pipeline(
                device,
                link.label,
                (&link.vertex.module, link.interface.vertex_entry.as_str()),
                (&link.fragment.module, link.interface.fragment_entry.as_str()),
                &buffers,
                wgpu_format(link.format),
                &[&bind_group_layout],
            );
            WgpuProgram {
                pipeline,
                bind_group_layout,
            }
        })
    }

    fn release_program(&mut self, _program: Self::Program) {}

    fn create_buffer(&mut self, label: &str, data: &[f32]) -> Self::Buffer {
        self.context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            })
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        buffer.destroy();
    }

    fn create_texture(&mut self, alloc: &TextureAlloc<'_>) -> Self::Texture {
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        if alloc.renderable {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let texture = self
            .context
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(alloc.label),
                size: extent(alloc.width, alloc.height),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu_format(alloc.format),
                usage,
                view_formats: &[],
            });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        WgpuTexture {
            texture,
            view,
            format: alloc.format,
            width: alloc.width,
            height: alloc.height,
        }
    }

    fn write_texture(&mut self, texture: &Self::Texture, data: &TexelData) -> Result<(), String> {
        if data.format() != texture.format {
            return Err(format!(
                "cannot write {:?} texels into a {:?} texture",
                data.format(),
                texture.format
            ));
        }
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texture.width * texture.format.texel_size()),
                rows_per_image: Some(texture.height),
            },
            extent(texture.width, texture.height),
        );
        Ok(())
    }

    fn read_texture(&mut self, texture: &Self::Texture) -> Result<TexelImage, String> {
        let row_bytes = texture.width * texture.format.texel_size();
        let padded_row_bytes = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let staging = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size: u64::from(padded_row_bytes) * u64::from(texture.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.context.create_encoder("Readback Encoder");
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(texture.height),
                },
            },
            extent(texture.width, texture.height),
        );
        self.context.submit(encoder);
        self.map_blocking(&staging)?;

        let mapped = staging.slice(..).get_mapped_range();
        let mut bytes = Vec::with_capacity((row_bytes * texture.height) as usize);
        for row in mapped.chunks_exact(padded_row_bytes as usize) {
            bytes.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(mapped);
        staging.unmap();
        staging.destroy();

        Ok(TexelImage {
            width: texture.width,
            height: texture.height,
            data: TexelData::from_bytes(texture.format, &bytes),
        })
    }

    fn release_texture(&mut self, texture: Self::Texture) {
        texture.texture.destroy();
    }

    fn create_target(&mut self, texture: &Self::Texture) -> Option<Self::Target> {
        if !texture
            .texture
            .usage()
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return None;
        }
        Some(WgpuTarget {
            view: texture.texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Render Target View"),
                ..Default::default()
            }),
        })
    }

    fn release_target(&mut self, _target: Self::Target) {}

    fn clear(&mut self, target: &Self::Target, color: [f32; 4]) {
        let mut encoder = self.context.create_encoder("Clear Encoder");
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(color[0]),
                            g: f64::from(color[1]),
                            b: f64::from(color[2]),
                            a: f64::from(color[3]),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
        }
        self.context.submit(encoder);
    }

    fn draw(&mut self, target: &Self::Target, draw: BoundDraw<'_, Self>) -> Result<(), String> {
        let device = &self.context.device;
        let uniform_buffer = draw.interface.uniform_block().map(|block| {
            let size = u64::from(block.size).div_ceil(UNIFORM_ALIGNMENT) * UNIFORM_ALIGNMENT;
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Draw Uniform Buffer"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.context.queue.write_buffer(&buffer, 0, draw.uniforms);
            (block.binding, buffer)
        });

        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = draw
            .textures
            .iter()
            .map(|t| wgpu::BindGroupEntry {
                binding: t.binding,
                resource: wgpu::BindingResource::TextureView(&t.texture.view),
            })
            .collect();
        if let Some((binding, buffer)) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            });
        }

        let bind_group = self.validated(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Bind Group"),
                layout: &draw.program.bind_group_layout,
                entries: &entries,
            })
        })?;

        let mut encoder = self.context.create_encoder("Draw Encoder");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Draw Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            pass.set_pipeline(&draw.program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            pass.draw(0..draw.vertex_count, 0..1);
        }
        self.validated(|_| self.context.submit(encoder))?;

        if let Some((_, buffer)) = uniform_buffer {
            buffer.destroy();
        }
        Ok(())
    }
}
