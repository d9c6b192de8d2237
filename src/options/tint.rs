use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Color mixed into the glass; channels are 0-255, alpha is 0-1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Tint", inline)]
#[serde(default)]
pub struct TintOptions {
    /// Red.
    #[schemars(range(min = 0, max = 255))]
    pub r: u8,
    /// Green.
    #[schemars(range(min = 0, max = 255))]
    pub g: u8,
    /// Blue.
    #[schemars(range(min = 0, max = 255))]
    pub b: u8,
    /// Opacity of the tint.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub a: f32,
}

impl Default for TintOptions {
    fn default() -> Self {
        Self {
            r: 255,
            g: 255,
            b: 255,
            a: 0.0,
        }
    }
}

impl TintOptions {
    /// Normalized RGBA.
    #[must_use]
    pub fn to_rgba(&self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            self.a,
        ]
    }
}
