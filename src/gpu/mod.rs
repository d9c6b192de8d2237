//! GPU resource management utilities.
//!
//! Provides wgpu device/surface initialization, lifetime accounting for
//! engine-owned objects, shared texture handles, and pipeline boilerplate.

/// Shared wgpu boilerplate helpers for full-screen pass pipelines.
pub mod pipeline_helpers;
/// wgpu device, surface, and queue initialization.
pub mod render_context;
/// Created/released counters and RAII guards for GPU objects.
pub mod resources;
/// Texture handles with stable identity and off-screen render targets.
pub mod texture;
