//! Shared wgpu boilerplate for programs built from reflected interfaces.

use super::backend::TextureFormat;
use super::reflection::ProgramInterface;

/// Vertex+fragment-visible, **non-filterable** float 2D texture binding.
/// Textures are read with `textureLoad`, so float formats need no filtering.
pub fn texture_2d_unfilterable(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Vertex+fragment-visible uniform buffer binding.
pub fn uniform_buffer(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Group-0 layout entries for every resource the program declares.
pub fn layout_entries(interface: &ProgramInterface) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries: Vec<_> = interface
        .uniform_block()
        .map(|block| uniform_buffer(block.binding))
        .into_iter()
        .collect();
    entries.extend(
        interface
            .textures()
            .into_iter()
            .map(|(_, binding)| texture_2d_unfilterable(binding)),
    );
    entries
}

/// One single-attribute vertex buffer per reflected attribute, ordered by
/// location. The returned arrays back the layouts built by
/// [`vertex_buffer_layouts`].
pub fn vertex_attributes(interface: &ProgramInterface) -> Vec<[wgpu::VertexAttribute; 1]> {
    interface
        .attributes()
        .into_iter()
        .map(|(_, attr)| {
            let format = match attr.components {
                1 => wgpu::VertexFormat::Float32,
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                _ => wgpu::VertexFormat::Float32x4,
            };
            [wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: attr.location,
            }]
        })
        .collect()
}

/// Tightly packed vertex buffer layouts over `attributes`.
pub fn vertex_buffer_layouts(
    attributes: &[[wgpu::VertexAttribute; 1]],
) -> Vec<wgpu::VertexBufferLayout<'_>> {
    attributes
        .iter()
        .map(|attr| wgpu::VertexBufferLayout {
            array_stride: attr[0].format.size(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attr,
        })
        .collect()
}

/// Map a crate texture format to its wgpu counterpart.
pub const fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::R16Float => wgpu::TextureFormat::R16Float,
    }
}

/// Create a triangle-strip render pipeline with a single color target and no
/// blending.
pub fn create_strip_pipeline(
    device: &wgpu::Device,
    label: &str,
    vertex: (&wgpu::ShaderModule, &str),
    fragment: (&wgpu::ShaderModule, &str),
    buffers: &[wgpu::VertexBufferLayout<'_>],
    format: wgpu::TextureFormat,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let pipeline_layout =
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts,
            push_constant_ranges: &[],
        });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{label} Pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex.0,
            entry_point: Some(vertex.1),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment.0,
            entry_point: Some(fragment.1),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
