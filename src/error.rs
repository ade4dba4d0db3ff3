//! Crate-level error types.

use std::fmt;

use crate::gpu::draw::RenderError;
use crate::gpu::render_context::RenderContextError;
use crate::gpu::resource::ResourceError;

/// Errors produced by the plasma-fractal crate.
#[derive(Debug)]
pub enum PlasmaError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// A graphics resource could not be created or read.
    Resource(ResourceError),
    /// An off-screen render failed.
    Render(RenderError),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Gradient or output image could not be decoded or encoded.
    Image(String),
}

impl fmt::Display for PlasmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Resource(e) => write!(f, "resource error: {e}"),
            Self::Render(e) => write!(f, "render error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Image(msg) => write!(f, "image error: {msg}"),
        }
    }
}

impl std::error::Error for PlasmaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Resource(e) => Some(e),
            Self::Render(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::OptionsParse(_) | Self::Image(_) => None,
        }
    }
}

impl From<RenderContextError> for PlasmaError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<ResourceError> for PlasmaError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

impl From<RenderError> for PlasmaError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

impl From<std::io::Error> for PlasmaError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
