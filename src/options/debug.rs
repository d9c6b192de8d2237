use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Debug visualization of intermediate shading stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Debug", inline)]
#[serde(default)]
pub struct DebugOptions {
    /// Stop the glass shader after this stage; 9 shows the final image.
    #[schemars(title = "Step", range(min = 0, max = 9), extend("step" = 1))]
    pub step: u32,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self { step: 9 }
    }
}
