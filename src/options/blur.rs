use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Largest supported blur radius; the blur shader holds this many weights
/// plus one.
pub const MAX_BLUR_RADIUS: u32 = 200;

/// Separable Gaussian blur of the backdrop seen through the glass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Blur", inline)]
#[serde(default)]
pub struct BlurOptions {
    /// Kernel radius in pixels; clamped to [`MAX_BLUR_RADIUS`].
    #[schemars(title = "Radius", range(min = 1, max = 200), extend("step" = 1))]
    pub radius: u32,
}

impl Default for BlurOptions {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

impl BlurOptions {
    /// Radius clamped to what the blur shader supports.
    #[must_use]
    pub fn effective_radius(&self) -> u32 {
        self.radius.min(MAX_BLUR_RADIUS)
    }
}
