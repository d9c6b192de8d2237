//! Shared utilities.

/// Gaussian blur kernel generation.
pub mod kernel;

pub use kernel::gaussian_kernel;
