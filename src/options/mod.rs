//! Glass effect options with TOML preset support.
//!
//! Every slider of the control panel lives here, grouped by the pass that
//! consumes it. Options serialize to/from TOML, and the JSON schema carries
//! titles, ranges and steps so a panel can be generated from it.
//! [`GlassOptions::global_uniforms`] and [`GlassOptions::pass_uniforms`] turn
//! the options into the uniform maps of the demo pipeline.

mod background;
mod blur;
mod debug;
mod glare;
mod refraction;
mod shape;
mod tint;

use std::path::Path;

pub use background::BackgroundOptions;
pub use blur::{BlurOptions, MAX_BLUR_RADIUS};
pub use debug::DebugOptions;
pub use glare::GlareOptions;
pub use refraction::RefractionOptions;
use rustc_hash::FxHashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use shape::ShapeOptions;
pub use tint::TintOptions;

use crate::error::GlassError;
use crate::glass::{BG_PASS, MAIN_PASS};
use crate::gpu::texture::TextureHandle;
use crate::renderer::PassUniforms;
use crate::shader::{UniformMap, UniformValue};
use crate::util::gaussian_kernel;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[glare]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct GlassOptions {
    /// Backdrop and shadow.
    pub background: BackgroundOptions,
    /// Glass shape geometry.
    pub shape: ShapeOptions,
    /// Refraction through the glass body.
    pub refraction: RefractionOptions,
    /// Specular rim highlight.
    pub glare: GlareOptions,
    /// Backdrop blur.
    pub blur: BlurOptions,
    /// Glass tint color.
    pub tint: TintOptions,
    /// Debug visualization options.
    pub debug: DebugOptions,
}

/// Per-frame inputs that do not come from the options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    /// Drawable size in physical pixels.
    pub resolution: [f32; 2],
    /// Physical pixels per logical pixel.
    pub dpr: f32,
    /// Pointer in physical pixels, origin bottom left.
    pub mouse: [f32; 2],
    /// Spring-smoothed pointer, same space as `mouse`.
    pub mouse_spring: [f32; 2],
    /// Spring velocity in physical pixels per millisecond.
    pub spring_speed: [f32; 2],
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            resolution: [1.0, 1.0],
            dpr: 1.0,
            mouse: [0.0, 0.0],
            mouse_spring: [0.0, 0.0],
            spring_speed: [0.0, 0.0],
        }
    }
}

/// Current state of the background texture, if any.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTexture {
    /// The texture to sample; `None` leaves the uniform unset.
    pub texture: Option<TextureHandle>,
    /// Width over height of the texture image.
    pub aspect_ratio: f32,
    /// Whether `texture` holds the requested image yet.
    pub ready: bool,
}

impl GlassOptions {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(GlassOptions)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GlassError::Io`] if the file cannot be read and
    /// [`GlassError::OptionsParse`] if it is not valid options TOML.
    pub fn load(path: &Path) -> Result<Self, GlassError> {
        let content = std::fs::read_to_string(path).map_err(GlassError::Io)?;
        toml::from_str(&content)
            .map_err(|e| GlassError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`GlassError`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), GlassError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GlassError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(GlassError::Io)?;
        }
        std::fs::write(path, content).map_err(GlassError::Io)
    }

    /// Uniforms shared by every pass of the demo pipeline.
    #[must_use]
    pub fn global_uniforms(&self, frame: &FrameInputs) -> UniformMap {
        let size = self.shape.stretched_size(frame.spring_speed);
        let radius = self.blur.effective_radius();
        let mut map = UniformMap::default();
        let mut put = |name: &str, value: UniformValue| {
            let _ = map.insert(name.to_owned(), value);
        };
        put("u_resolution", frame.resolution.into());
        put("u_dpr", frame.dpr.into());
        put("u_blurWeights", gaussian_kernel(radius).into());
        put("u_blurRadius", radius.into());
        put("u_mouse", frame.mouse.into());
        put("u_mouseSpring", frame.mouse_spring.into());
        put("u_shapeWidth", size[0].into());
        put("u_shapeHeight", size[1].into());
        put("u_shapeRadius", self.shape.corner_radius(size).into());
        put("u_shapeRoundness", self.shape.roundness.into());
        put("u_mergeRate", self.shape.merge_rate.into());
        put("u_glareAngle", self.glare.angle.to_radians().into());
        put("u_showShape1", self.shape.show_shape1.into());
        map
    }

    /// Values for the background and glass passes.
    #[must_use]
    pub fn pass_uniforms(&self, background: &BackgroundTexture) -> PassUniforms {
        let mut maps = FxHashMap::default();
        let _ = maps.insert(BG_PASS.to_owned(), self.background_uniforms(background));
        let _ = maps.insert(MAIN_PASS.to_owned(), self.glass_uniforms());
        PassUniforms::ByName(maps)
    }

    fn background_uniforms(&self, background: &BackgroundTexture) -> UniformMap {
        let bg = &self.background;
        let mut map = UniformMap::default();
        let mut put = |name: &str, value: UniformValue| {
            let _ = map.insert(name.to_owned(), value);
        };
        put("u_bgType", bg.bg_type.into());
        if let Some(texture) = &background.texture {
            put("u_bgTexture", texture.clone().into());
            put("u_bgTextureRatio", background.aspect_ratio.into());
        }
        put("u_bgTextureReady", background.ready.into());
        put("u_shadowExpand", bg.shadow_expand.into());
        put("u_shadowFactor", (bg.shadow_factor / 100.0).into());
        put(
            "u_shadowPosition",
            [-bg.shadow_position[0], -bg.shadow_position[1]].into(),
        );
        map
    }

    fn glass_uniforms(&self) -> UniformMap {
        let refraction = &self.refraction;
        let glare = &self.glare;
        let mut map = UniformMap::default();
        let mut put = |name: &str, value: UniformValue| {
            let _ = map.insert(name.to_owned(), value);
        };
        put("u_tint", self.tint.to_rgba().into());
        put("u_refThickness", refraction.thickness.into());
        put("u_refFactor", refraction.factor.into());
        put("u_refDispersion", refraction.dispersion.into());
        put("u_refFresnelRange", refraction.fresnel_range.into());
        put(
            "u_refFresnelHardness",
            (refraction.fresnel_hardness / 100.0).into(),
        );
        put(
            "u_refFresnelFactor",
            (refraction.fresnel_factor / 100.0).into(),
        );
        put("u_glareRange", glare.range.into());
        put("u_glareHardness", (glare.hardness / 100.0).into());
        put("u_glareConvergence", (glare.convergence / 100.0).into());
        put(
            "u_glareOppositeFactor",
            (glare.opposite_factor / 100.0).into(),
        );
        put("u_glareFactor", (glare.factor / 100.0).into());
        put("STEP", self.debug.step.into());
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(map: &UniformMap, name: &str) -> f32 {
        match map.get(name) {
            Some(UniformValue::Float(v)) => *v,
            other => panic!("{name}: expected float, got {other:?}"),
        }
    }

    #[test]
    fn default_round_trips_through_toml() {
        let opts = GlassOptions::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: GlassOptions = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r"
[glare]
angle = 30.0

[tint]
a = 0.5
";
        let opts: GlassOptions = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.glare.angle, 30.0);
        assert_eq!(opts.glare.factor, 90.0);
        assert_eq!(opts.tint.a, 0.5);
        assert_eq!(opts.tint.r, 255);
        assert_eq!(opts.refraction.factor, 1.4);
        assert_eq!(opts.debug.step, 9);
        assert!(opts.shape.show_shape1);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = std::env::temp_dir()
            .join(format!("liquid-glass-options-{}", std::process::id()));
        let path = dir.join("preset.toml");
        let mut opts = GlassOptions::default();
        opts.blur.radius = 12;
        opts.background.bg_type = 3;
        opts.save(&path).unwrap();
        let loaded = GlassOptions::load(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(loaded, opts);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = std::env::temp_dir()
            .join(format!("liquid-glass-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[shape]\nwidth = \"wide\"\n").unwrap();
        let result = GlassOptions::load(&path);
        let _ = std::fs::remove_dir_all(&dir);
        assert!(matches!(result, Err(GlassError::OptionsParse(_))));
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(GlassOptions::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();
        for section in
            ["background", "shape", "refraction", "glare", "blur", "tint", "debug"]
        {
            assert!(props.contains_key(section), "missing {section}");
        }
        let glare = &props["glare"]["properties"];
        assert_eq!(glare["angle"]["minimum"], -180.0);
        assert_eq!(glare["angle"]["maximum"], 180.0);
    }

    #[test]
    fn globals_follow_the_control_panel() {
        let opts = GlassOptions::default();
        let frame = FrameInputs {
            resolution: [800.0, 600.0],
            dpr: 2.0,
            mouse: [10.0, 20.0],
            mouse_spring: [8.0, 18.0],
            spring_speed: [0.0, 0.0],
        };
        let map = opts.global_uniforms(&frame);
        assert_eq!(map["u_resolution"], UniformValue::Vec2([800.0, 600.0]));
        assert_eq!(map["u_mouseSpring"], UniformValue::Vec2([8.0, 18.0]));
        assert_eq!(float(&map, "u_shapeWidth"), 200.0);
        // min(200, 200) / 2 * 80%
        assert!((float(&map, "u_shapeRadius") - 80.0).abs() < 1e-4);
        assert!(
            (float(&map, "u_glareAngle") + std::f32::consts::FRAC_PI_4).abs()
                < 1e-6
        );
        assert_eq!(map["u_showShape1"], UniformValue::Int(1));
        assert_eq!(map["u_blurRadius"], UniformValue::Int(1));
        match &map["u_blurWeights"] {
            UniformValue::FloatArray(w) => assert_eq!(w.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spring_speed_stretches_the_shape() {
        let opts = GlassOptions::default();
        let frame = FrameInputs {
            spring_speed: [1.0, -0.5],
            ..FrameInputs::default()
        };
        let map = opts.global_uniforms(&frame);
        // 200 + |1.0| * 200 * 10 / 100
        assert!((float(&map, "u_shapeWidth") - 220.0).abs() < 1e-4);
        assert!((float(&map, "u_shapeHeight") - 210.0).abs() < 1e-4);
    }

    #[test]
    fn pass_values_are_scaled() {
        let opts = GlassOptions::default();
        let uniforms = opts.pass_uniforms(&BackgroundTexture::default());
        let bg = uniforms.for_pass(0, BG_PASS).unwrap();
        assert!((float(bg, "u_shadowFactor") - 0.15).abs() < 1e-6);
        assert_eq!(bg["u_shadowPosition"], UniformValue::Vec2([-0.0, 10.0]));
        assert_eq!(bg["u_bgTextureReady"], UniformValue::Int(0));
        assert!(!bg.contains_key("u_bgTexture"));
        assert!(!bg.contains_key("u_bgTextureRatio"));

        let main = uniforms.for_pass(3, MAIN_PASS).unwrap();
        assert_eq!(main["u_tint"], UniformValue::Vec4([1.0, 1.0, 1.0, 0.0]));
        assert!((float(main, "u_glareFactor") - 0.9).abs() < 1e-6);
        assert!((float(main, "u_refFresnelHardness") - 0.2).abs() < 1e-6);
        assert_eq!(main["STEP"], UniformValue::Int(9));
    }
}
