//! Shader programs: WGSL compilation, interface reflection, and uniform
//! staging.
//!
//! A [`ShaderProgram`] is built from a [`ShaderSource`] pair. Its active
//! attributes and uniforms are discovered with naga at link time and exposed
//! by name, so passes can push values without knowing binding indices.

mod program;
pub mod reflect;
mod source;
mod uniforms;

use std::fmt;

pub use program::{ProgramTarget, ShaderProgram};
pub use reflect::{
    ArrayInfo, AttributeInfo, BindingKind, ProgramLayout, ScalarType,
    UniformInfo, UniformSlot, UniformType,
};
pub use source::{ShaderSource, FULLSCREEN_VERTEX};
pub use uniforms::{uniform_map, UniformMap, UniformStorage, UniformValue};

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors from building a [`ShaderProgram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// One stage failed to parse or validate.
    Compile {
        /// The failing stage.
        stage: Stage,
        /// Rendered compiler diagnostic.
        log: String,
    },
    /// The stages compiled but could not be combined into a pipeline.
    Link {
        /// Description of the mismatch or pipeline validation error.
        log: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile { stage, log } => {
                write!(f, "{stage} shader failed to compile:\n{log}")
            }
            Self::Link { log } => write!(f, "shader program failed to link: {log}"),
        }
    }
}

impl std::error::Error for ShaderError {}
