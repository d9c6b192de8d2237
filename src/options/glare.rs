use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specular rim highlight along the glass edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Glare", inline)]
#[serde(default)]
pub struct GlareOptions {
    /// Width of the highlight band.
    #[schemars(title = "Range", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub range: f32,
    /// Edge sharpness of the band.
    #[schemars(title = "Hardness", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub hardness: f32,
    /// Highlight strength, in percent.
    #[schemars(title = "Factor", range(min = 0.0, max = 120.0), extend("step" = 0.01))]
    pub factor: f32,
    /// How tightly the highlight gathers around the light direction.
    #[schemars(title = "Convergence", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub convergence: f32,
    /// Strength of the highlight on the side facing away from the light.
    #[schemars(title = "Opposite Side Factor", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub opposite_factor: f32,
    /// Light direction in degrees.
    #[schemars(title = "Angle", range(min = -180.0, max = 180.0), extend("step" = 0.01))]
    pub angle: f32,
}

impl Default for GlareOptions {
    fn default() -> Self {
        Self {
            range: 30.0,
            hardness: 20.0,
            factor: 90.0,
            convergence: 50.0,
            opposite_factor: 80.0,
            angle: -45.0,
        }
    }
}
