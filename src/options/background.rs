use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backdrop selection and the drop shadow under the glass shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Background", inline)]
#[serde(default)]
pub struct BackgroundOptions {
    /// 0 grid, 1 bars, 2 half tone; anything above samples the background
    /// texture once it is loaded.
    #[schemars(title = "Background", range(min = 0, max = 11))]
    pub bg_type: u32,
    /// Width of the shadow falloff in CSS pixels.
    #[schemars(title = "Shadow Expand", range(min = 2.0, max = 100.0), extend("step" = 0.01))]
    pub shadow_expand: f32,
    /// Shadow darkness, in percent.
    #[schemars(title = "Shadow Factor", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub shadow_factor: f32,
    /// Shadow offset in CSS pixels, y down.
    #[schemars(title = "Shadow Position")]
    pub shadow_position: [f32; 2],
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            bg_type: 0,
            shadow_expand: 25.0,
            shadow_factor: 15.0,
            shadow_position: [0.0, -10.0],
        }
    }
}
