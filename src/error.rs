//! Crate-level error types.

use std::fmt;

use crate::background::TextureError;
use crate::gpu::render_context::RenderContextError;
use crate::gpu::texture::ReadbackError;
use crate::renderer::{FrameBufferError, RendererError};
use crate::shader::ShaderError;

/// Errors produced by the liquid-glass crate.
#[derive(Debug)]
pub enum GlassError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// A shader failed to compile or link.
    Shader(ShaderError),
    /// A framebuffer could not be created.
    FrameBuffer(FrameBufferError),
    /// The pass chain could not be built.
    Renderer(RendererError),
    /// A background texture could not be loaded.
    Texture(TextureError),
    /// Reading pixels back from the GPU failed.
    Readback(ReadbackError),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// Failed to spawn a background thread.
    ThreadSpawn(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Viewer event-loop failure.
    Viewer(String),
}

impl fmt::Display for GlassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Shader(e) => write!(f, "shader error: {e}"),
            Self::FrameBuffer(e) => write!(f, "{e}"),
            Self::Renderer(e) => write!(f, "renderer error: {e}"),
            Self::Texture(e) => write!(f, "texture error: {e}"),
            Self::Readback(e) => write!(f, "readback error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ThreadSpawn(e) => {
                write!(f, "failed to spawn thread: {e}")
            }
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Viewer(msg) => write!(f, "viewer error: {msg}"),
        }
    }
}

impl std::error::Error for GlassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Shader(e) => Some(e),
            Self::FrameBuffer(e) => Some(e),
            Self::Renderer(e) => Some(e),
            Self::Texture(e) => Some(e),
            Self::Readback(e) => Some(e),
            Self::Io(e) | Self::ThreadSpawn(e) => Some(e),
            Self::OptionsParse(_) | Self::Viewer(_) => None,
        }
    }
}

impl From<RenderContextError> for GlassError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<ShaderError> for GlassError {
    fn from(e: ShaderError) -> Self {
        Self::Shader(e)
    }
}

impl From<FrameBufferError> for GlassError {
    fn from(e: FrameBufferError) -> Self {
        Self::FrameBuffer(e)
    }
}

impl From<RendererError> for GlassError {
    fn from(e: RendererError) -> Self {
        Self::Renderer(e)
    }
}

impl From<TextureError> for GlassError {
    fn from(e: TextureError) -> Self {
        Self::Texture(e)
    }
}

impl From<ReadbackError> for GlassError {
    fn from(e: ReadbackError) -> Self {
        Self::Readback(e)
    }
}

impl From<std::io::Error> for GlassError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
