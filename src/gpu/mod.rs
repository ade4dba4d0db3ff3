//! GPU resource management.
//!
//! A [`ResourceManager`](manager::ResourceManager) owns shaders, programs,
//! vertex buffers and textures created through a
//! [`Backend`](backend::Backend), renders into textures off-screen, and reads
//! them back. Programs are reflected once at link time so draws address
//! attributes, uniforms and textures by name.

/// Native graphics API seam and host-side texel types.
pub mod backend;
/// Float render-target capability detection and the device quirk table.
pub mod capabilities;
/// Draw calls and the bound off-screen target.
pub mod draw;
/// Resource lifetimes, off-screen rendering and resize handling.
pub mod manager;
/// Shared wgpu boilerplate for reflected programs.
pub mod pipeline_helpers;
/// Full-target quad programs.
pub mod quad;
/// Name→location reflection over naga IR.
pub mod reflection;
/// wgpu device and queue initialization.
pub mod render_context;
/// Typed resource handles and their errors.
pub mod resource;
/// WGSL shader composition with `#import` support via naga-oil.
pub mod shader_composer;
/// Host-side backend executing fragment stages as Rust kernels.
pub mod software;
/// Backend over a wgpu device.
pub mod wgpu_backend;
