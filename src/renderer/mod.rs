//! Offscreen targets, single passes, and multi-pass chains.
//!
//! A [`MultiPassRenderer`] owns an ordered list of [`RenderPass`]es. Every
//! offscreen pass draws into its own [`FrameBuffer`]; later passes sample
//! those outputs through texture uniforms wired by name.

pub mod framebuffer;
pub mod multi_pass;
pub mod render_pass;

pub use framebuffer::{FrameBuffer, FrameBufferError};
pub use multi_pass::{MultiPassRenderer, PassConfig, PassUniforms, RendererError};
pub use render_pass::{PassError, RenderPass};
