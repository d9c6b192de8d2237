//! One full-screen draw: a program, an optional framebuffer, and a quad.

use std::fmt;

use wgpu::util::DeviceExt;

use super::framebuffer::{FrameBuffer, FrameBufferError};
use crate::gpu::pipeline_helpers::QUAD_VERTICES;
use crate::gpu::render_context::{RenderContext, DEPTH_FORMAT, FLOAT_TARGET_FORMAT};
use crate::gpu::resources::Tracked;
use crate::gpu::texture::TextureHandle;
use crate::shader::{
    ProgramTarget, ShaderError, ShaderProgram, ShaderSource, UniformMap,
    UniformValue,
};

/// Errors from building a [`RenderPass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    /// The pass shader failed to compile or link.
    Shader(ShaderError),
    /// The pass framebuffer could not be created.
    FrameBuffer(FrameBufferError),
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shader(e) => write!(f, "{e}"),
            Self::FrameBuffer(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shader(e) => Some(e),
            Self::FrameBuffer(e) => Some(e),
        }
    }
}

impl From<ShaderError> for PassError {
    fn from(e: ShaderError) -> Self {
        Self::Shader(e)
    }
}

impl From<FrameBufferError> for PassError {
    fn from(e: FrameBufferError) -> Self {
        Self::FrameBuffer(e)
    }
}

/// Draws the full-screen quad with one program into its own framebuffer or
/// into the screen view supplied at render time.
pub struct RenderPass {
    name: String,
    program: ShaderProgram,
    framebuffer: Option<FrameBuffer>,
    quad: Tracked<wgpu::Buffer>,
}

impl RenderPass {
    /// Build the program and, for offscreen passes, a `size` framebuffer.
    ///
    /// # Errors
    ///
    /// Returns [`PassError`] if the shader fails to build or the
    /// framebuffer is incomplete.
    pub fn new(
        ctx: &RenderContext,
        name: &str,
        source: &ShaderSource,
        output_to_screen: bool,
        size: (u32, u32),
    ) -> Result<Self, PassError> {
        let target = if output_to_screen {
            ProgramTarget {
                color_format: ctx.format(),
                depth_format: None,
            }
        } else {
            ProgramTarget {
                color_format: FLOAT_TARGET_FORMAT,
                depth_format: Some(DEPTH_FORMAT),
            }
        };
        let program = ShaderProgram::new(ctx, name, source, &target)?;
        let framebuffer = if output_to_screen {
            None
        } else {
            Some(FrameBuffer::new(ctx, size.0, size.1)?)
        };
        let quad = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{name} Quad")),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        Ok(Self {
            name: name.to_owned(),
            program,
            framebuffer,
            quad: Tracked::new(quad, ctx.counters()),
        })
    }

    /// Pass name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the pass draws into the screen view.
    #[must_use]
    pub fn output_to_screen(&self) -> bool {
        self.framebuffer.is_none()
    }

    /// The pass program.
    #[must_use]
    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Mutable access to the pass program.
    pub fn program_mut(&mut self) -> &mut ShaderProgram {
        &mut self.program
    }

    /// The pass framebuffer, `None` for screen passes.
    #[must_use]
    pub fn framebuffer(&self) -> Option<&FrameBuffer> {
        self.framebuffer.as_ref()
    }

    /// Color output of an offscreen pass.
    #[must_use]
    pub fn output_texture(&self) -> Option<TextureHandle> {
        self.framebuffer.as_ref().map(|fb| fb.texture().clone())
    }

    /// Resize the framebuffer; screen passes follow the screen view.
    pub fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        if let Some(fb) = &mut self.framebuffer {
            fb.resize(ctx, width, height);
        }
    }

    /// Push `uniforms`, then record one quad draw into `encoder`.
    ///
    /// Texture uniforms absent from `uniforms` sample a transparent
    /// placeholder for this draw.
    pub fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        screen: &wgpu::TextureView,
        uniforms: &UniformMap,
    ) {
        let own_output = self.framebuffer.as_ref().map(|fb| fb.texture().id());
        self.program.clear_textures();
        for (name, value) in uniforms {
            if let UniformValue::Texture(handle) = value {
                if Some(handle.id()) == own_output {
                    log::warn!(
                        "pass '{}' cannot sample its own output through `{name}`",
                        self.name
                    );
                    continue;
                }
            }
            self.program.set_uniform(name, value);
        }
        self.program.prepare(ctx);

        let (color, depth) = match &self.framebuffer {
            Some(fb) => (fb.color_attachment(), Some(fb.depth_attachment())),
            None => (screen.clone(), None),
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.name),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth.as_ref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            ..Default::default()
        });
        self.program.activate(&mut pass);
        if self.program.uses_quad() {
            pass.set_vertex_buffer(0, self.quad.slice(..));
        }
        pass.draw(0..4, 0..1);
    }

    /// Release the framebuffer, program and quad buffer.
    pub fn dispose(self) {
        log::debug!("disposing pass '{}'", self.name);
        self.program.dispose();
        if let Some(fb) = self.framebuffer {
            fb.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::texture::RenderTarget;
    use crate::shader::uniform_map;

    const SOLID: &str = r"
struct Params { u_color: vec4<f32> };
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) v_uv: vec2<f32>) -> @location(0) vec4<f32> {
    return params.u_color;
}
";

    fn context() -> Option<RenderContext> {
        pollster::block_on(RenderContext::headless(8, 8)).ok()
    }

    #[test]
    fn screen_pass_draws_uniform_color() {
        let Some(ctx) = context() else { return };
        let mut pass = RenderPass::new(
            &ctx,
            "solid",
            &ShaderSource::fullscreen(SOLID),
            true,
            (8, 8),
        )
        .unwrap();
        assert!(pass.output_texture().is_none());
        let screen = RenderTarget::new(&ctx.device, 8, 8, ctx.format());
        let mut encoder = ctx.create_encoder();
        pass.render(
            &ctx,
            &mut encoder,
            &screen.view,
            &uniform_map([("u_color", [1.0_f32, 0.0, 0.0, 1.0])]),
        );
        ctx.submit(encoder);
        let pixels = screen.read_pixels(&ctx).unwrap();
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
        pass.dispose();
    }

    #[test]
    fn offscreen_pass_owns_a_framebuffer() {
        let Some(ctx) = context() else { return };
        if !ctx.supports_float_targets() {
            return;
        }
        let mut pass = RenderPass::new(
            &ctx,
            "offscreen",
            &ShaderSource::fullscreen(SOLID),
            false,
            (8, 4),
        )
        .unwrap();
        let output = pass.output_texture().unwrap();
        assert_eq!(output.size(), (8, 4));
        pass.resize(&ctx, 16, 16);
        assert_eq!(pass.output_texture().unwrap(), output);
        assert_eq!(output.size(), (16, 16));
        drop(output);
        pass.dispose();
        assert_eq!(ctx.counters().total_live(), 0);
    }
}
