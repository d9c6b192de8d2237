// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Multi-pass wgpu rendering engine for real-time liquid glass effects.
//!
//! A chain of full-screen passes renders a background, blurs it, and draws
//! refracting glass shapes over it. The engine itself is generic: any list
//! of WGSL fragment shaders can be wired together by name.
//!
//! # Key entry points
//!
//! - [`renderer::MultiPassRenderer`] - runs an ordered list of passes per
//!   frame and feeds pass outputs into later passes' texture uniforms
//! - [`shader::ShaderProgram`] - compiled WGSL pair with reflected,
//!   name-addressable uniforms
//! - [`renderer::FrameBuffer`] - half-float color + depth render target
//! - [`options::GlassOptions`] - control-panel settings of the glass effect
//! - [`glass::pipeline_configs`] - the four-pass demo chain
//!
//! # Architecture
//!
//! Each frame the renderer layers global uniforms, per-pass uniforms and
//! the current outputs of earlier passes, pushes them into each pass
//! program, and records every pass into one command encoder. Background
//! images are decoded on a [`background::TextureLoader`] thread and uploaded
//! on the render thread once ready; until then the texture uniform is simply
//! absent and the pass samples a transparent placeholder.

pub mod background;
pub mod error;
pub mod glass;
pub mod gpu;
pub mod options;
pub mod renderer;
pub mod shader;
pub mod util;
#[cfg(feature = "viewer")]
pub mod viewer;

pub use error::GlassError;
pub use gpu::render_context::RenderContext;
pub use gpu::texture::TextureHandle;
pub use options::GlassOptions;
pub use renderer::{
    FrameBuffer, MultiPassRenderer, PassConfig, PassUniforms, RenderPass,
};
pub use shader::{
    uniform_map, ShaderProgram, ShaderSource, UniformMap, UniformValue,
};
#[cfg(feature = "viewer")]
pub use viewer::{Viewer, ViewerBuilder, DEFAULT_VIDEO_FPS};
