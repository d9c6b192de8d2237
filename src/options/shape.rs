use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Size and outline of the glass blobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Shape", inline)]
#[serde(default)]
pub struct ShapeOptions {
    /// Width in CSS pixels.
    #[schemars(title = "Width", range(min = 20.0, max = 800.0), extend("step" = 1.0))]
    pub width: f32,
    /// Height in CSS pixels.
    #[schemars(title = "Height", range(min = 20.0, max = 800.0), extend("step" = 1.0))]
    pub height: f32,
    /// Corner radius as a percentage of half the shorter side.
    #[schemars(title = "Radius", range(min = 1.0, max = 100.0), extend("step" = 0.1))]
    pub radius: f32,
    /// Superellipse exponent of the corners.
    #[schemars(title = "Roundness", range(min = 2.0, max = 7.0), extend("step" = 0.01))]
    pub roundness: f32,
    /// Smooth-union blend between the two blobs.
    #[schemars(title = "Merge Rate", range(min = 0.0, max = 0.3), extend("step" = 0.01))]
    pub merge_rate: f32,
    /// How much pointer speed stretches the shape, in percent.
    #[schemars(title = "Spring Size Factor", range(min = 0.0, max = 50.0), extend("step" = 0.01))]
    pub spring_size_factor: f32,
    /// Draw the second, static blob.
    #[schemars(title = "Show Shape 1")]
    pub show_shape1: bool,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 200.0,
            radius: 80.0,
            roundness: 5.0,
            merge_rate: 0.05,
            spring_size_factor: 10.0,
            show_shape1: true,
        }
    }
}

impl ShapeOptions {
    /// Width and height stretched by the pointer spring speed (px/ms).
    #[must_use]
    pub fn stretched_size(&self, spring_speed: [f32; 2]) -> [f32; 2] {
        let stretch = |base: f32, speed: f32| {
            base + speed.abs() * base * self.spring_size_factor / 100.0
        };
        [
            stretch(self.width, spring_speed[0]),
            stretch(self.height, spring_speed[1]),
        ]
    }

    /// Corner radius in pixels for a shape of `size`.
    #[must_use]
    pub fn corner_radius(&self, size: [f32; 2]) -> f32 {
        size[0].min(size[1]) / 2.0 * self.radius / 100.0
    }
}
