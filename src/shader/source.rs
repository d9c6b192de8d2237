/// A vertex/fragment WGSL pair.
///
/// The vertex text must declare a `@vertex` entry point and the fragment text
/// a `@fragment` entry point; when several exist the first one is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Vertex stage WGSL.
    pub vertex: String,
    /// Fragment stage WGSL.
    pub fragment: String,
}

impl ShaderSource {
    /// Pair arbitrary vertex and fragment sources.
    #[must_use]
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Pair a fragment shader with [`FULLSCREEN_VERTEX`].
    ///
    /// The fragment entry point receives `@location(0) v_uv: vec2<f32>` with
    /// `(0, 0)` at the top-left corner of the target.
    #[must_use]
    pub fn fullscreen(fragment: impl Into<String>) -> Self {
        Self::new(FULLSCREEN_VERTEX, fragment)
    }
}

/// Pass-through vertex stage for the full-screen quad.
pub const FULLSCREEN_VERTEX: &str =
    include_str!("../../assets/shaders/fullscreen.wgsl");
