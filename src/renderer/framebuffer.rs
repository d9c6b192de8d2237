//! Offscreen color + depth render targets.

use std::fmt;

use crate::gpu::pipeline_helpers;
use crate::gpu::render_context::{RenderContext, DEPTH_FORMAT, FLOAT_TARGET_FORMAT};
use crate::gpu::resources::{GpuObject, ObjectGuard, Tracked};
use crate::gpu::texture::{TextureContents, TextureHandle};

/// Errors from creating a [`FrameBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBufferError {
    /// The framebuffer cannot be used as a render target.
    Incomplete(String),
}

impl fmt::Display for FrameBufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete(reason) => {
                write!(f, "framebuffer incomplete: {reason}")
            }
        }
    }
}

impl std::error::Error for FrameBufferError {}

/// A half-float color attachment plus a depth attachment, both sized to the
/// last [`FrameBuffer::resize`].
///
/// The color texture is linearly filtered and clamped at the edges so later
/// passes can sample it directly; the depth texture uses nearest filtering.
pub struct FrameBuffer {
    color: TextureHandle,
    depth: TextureHandle,
    width: u32,
    height: u32,
    _guard: ObjectGuard,
}

impl FrameBuffer {
    /// Allocate both attachments and validate them once.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBufferError::Incomplete`] when a dimension is zero or
    /// above the device limit, the adapter cannot render to and filter
    /// half-float textures, or texture creation fails validation.
    pub fn new(
        ctx: &RenderContext,
        width: u32,
        height: u32,
    ) -> Result<Self, FrameBufferError> {
        if width == 0 || height == 0 {
            return Err(FrameBufferError::Incomplete(format!(
                "{width}x{height} has a zero dimension"
            )));
        }
        let max = ctx.max_texture_dimension();
        if width > max || height > max {
            return Err(FrameBufferError::Incomplete(format!(
                "{width}x{height} exceeds the device limit of {max}"
            )));
        }
        if !ctx.supports_float_targets() {
            return Err(FrameBufferError::Incomplete(format!(
                "{FLOAT_TARGET_FORMAT:?} is not renderable and filterable"
            )));
        }

        let ((color, depth), error) =
            ctx.scoped(|_| create_attachments(ctx, width, height));
        if let Some(error) = error {
            return Err(FrameBufferError::Incomplete(error.to_string()));
        }
        log::debug!("framebuffer created at {width}x{height}");

        Ok(Self {
            color: TextureHandle::new("FrameBuffer Color", color),
            depth: TextureHandle::new("FrameBuffer Depth", depth),
            width,
            height,
            _guard: ObjectGuard::new(ctx.counters(), GpuObject::FrameBuffer),
        })
    }

    /// Reallocate both attachments. Handles keep their identity; zero sizes
    /// are clamped to 1 and oversized requests to the device limit.
    pub fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        let max = ctx.max_texture_dimension();
        let width = width.clamp(1, max);
        let height = height.clamp(1, max);
        if (width, height) == (self.width, self.height) {
            return;
        }
        let (color, depth) = create_attachments(ctx, width, height);
        self.color.replace(color);
        self.depth.replace(depth);
        self.width = width;
        self.height = height;
        log::debug!("framebuffer resized to {width}x{height}");
    }

    /// Color view to render into.
    #[must_use]
    pub fn color_attachment(&self) -> wgpu::TextureView {
        self.color.view()
    }

    /// Depth view to render into.
    #[must_use]
    pub fn depth_attachment(&self) -> wgpu::TextureView {
        self.depth.view()
    }

    /// Handle to the color attachment for sampling in later passes.
    #[must_use]
    pub fn texture(&self) -> &TextureHandle {
        &self.color
    }

    /// Handle to the depth attachment.
    #[must_use]
    pub fn depth_texture(&self) -> &TextureHandle {
        &self.depth
    }

    /// Current `(width, height)`.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Release both attachments.
    pub fn dispose(self) {
        log::debug!("disposing {}x{} framebuffer", self.width, self.height);
    }
}

fn attachment(
    ctx: &RenderContext,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> Tracked<wgpu::Texture> {
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    Tracked::new(texture, ctx.counters())
}

fn create_attachments(
    ctx: &RenderContext,
    width: u32,
    height: u32,
) -> (TextureContents, TextureContents) {
    let color = TextureContents::new(
        attachment(ctx, "FrameBuffer Color", width, height, FLOAT_TARGET_FORMAT),
        pipeline_helpers::linear_sampler(&ctx.device, "FrameBuffer Color Sampler"),
    );
    let depth = TextureContents::new(
        attachment(ctx, "FrameBuffer Depth", width, height, DEPTH_FORMAT),
        pipeline_helpers::nearest_sampler(&ctx.device, "FrameBuffer Depth Sampler"),
    );
    (color, depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Option<RenderContext> {
        pollster::block_on(RenderContext::headless(32, 32)).ok()
    }

    #[test]
    fn zero_size_is_incomplete() {
        let Some(ctx) = context() else { return };
        assert!(matches!(
            FrameBuffer::new(&ctx, 0, 16),
            Err(FrameBufferError::Incomplete(_))
        ));
    }

    #[test]
    fn oversized_is_incomplete() {
        let Some(ctx) = context() else { return };
        let too_big = ctx.max_texture_dimension() + 1;
        assert!(FrameBuffer::new(&ctx, too_big, 4).is_err());
    }

    #[test]
    fn resize_keeps_handle_identity() {
        let Some(ctx) = context() else { return };
        if !ctx.supports_float_targets() {
            return;
        }
        let mut fb = FrameBuffer::new(&ctx, 16, 8).unwrap();
        let id = fb.texture().id();
        let generation = fb.texture().generation();
        assert_eq!(fb.texture().size(), (16, 8));
        assert_eq!(fb.texture().format(), FLOAT_TARGET_FORMAT);
        assert_eq!(fb.depth_texture().format(), DEPTH_FORMAT);

        fb.resize(&ctx, 40, 20);
        assert_eq!(fb.size(), (40, 20));
        assert_eq!(fb.texture().id(), id);
        assert_eq!(fb.texture().size(), (40, 20));
        assert_eq!(fb.depth_texture().size(), (40, 20));
        assert!(fb.texture().generation() > generation);

        fb.resize(&ctx, 0, 0);
        assert_eq!(fb.size(), (1, 1));
    }

    #[test]
    fn dispose_returns_counters_to_baseline() {
        let Some(ctx) = context() else { return };
        if !ctx.supports_float_targets() {
            return;
        }
        let counters = ctx.counters().clone();
        let fb = FrameBuffer::new(&ctx, 8, 8).unwrap();
        assert_eq!(counters.live(GpuObject::FrameBuffer), 1);
        assert_eq!(counters.live(GpuObject::Texture), 2);
        fb.dispose();
        assert_eq!(counters.total_live(), 0);
        assert_eq!(counters.released(GpuObject::Texture), 2);
    }
}
