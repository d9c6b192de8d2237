use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bending of the backdrop through the glass body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Refraction", inline)]
#[serde(default)]
pub struct RefractionOptions {
    /// Depth of the curved rim in CSS pixels.
    #[schemars(title = "Thickness", range(min = 1.0, max = 80.0), extend("step" = 0.01))]
    pub thickness: f32,
    /// Index of refraction.
    #[schemars(title = "Factor", range(min = 1.0, max = 4.0), extend("step" = 0.01))]
    pub factor: f32,
    /// Per-channel spread of the refraction.
    #[schemars(title = "Dispersion", range(min = 0.0, max = 50.0), extend("step" = 0.01))]
    pub dispersion: f32,
    /// Width of the fresnel brightening near the edge.
    #[schemars(title = "Fresnel Range", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub fresnel_range: f32,
    /// Edge sharpness of the fresnel band.
    #[schemars(title = "Fresnel Hardness", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub fresnel_hardness: f32,
    /// Fresnel strength, in percent.
    #[schemars(title = "Fresnel Factor", range(min = 0.0, max = 100.0), extend("step" = 0.01))]
    pub fresnel_factor: f32,
}

impl Default for RefractionOptions {
    fn default() -> Self {
        Self {
            thickness: 20.0,
            factor: 1.4,
            dispersion: 7.0,
            fresnel_range: 30.0,
            fresnel_hardness: 20.0,
            fresnel_factor: 20.0,
        }
    }
}
