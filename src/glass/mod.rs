//! The liquid glass demo pipeline.
//!
//! Four passes: the background (pattern or image plus the shape shadow), a
//! vertical and a horizontal Gaussian blur of it, and the glass pass that
//! refracts the blurred copy and composites over the sharp one on screen.

mod spring;

pub use spring::PointerSpring;

use crate::renderer::PassConfig;
use crate::shader::ShaderSource;

/// Background pass name.
pub const BG_PASS: &str = "bgPass";
/// Vertical blur pass name.
pub const V_BLUR_PASS: &str = "vBlurPass";
/// Horizontal blur pass name.
pub const H_BLUR_PASS: &str = "hBlurPass";
/// Glass pass name; draws to the screen.
pub const MAIN_PASS: &str = "mainPass";

const SHAPES_WGSL: &str = include_str!("../../assets/shaders/shapes.wgsl");
const BG_WGSL: &str = include_str!("../../assets/shaders/bg.wgsl");
const BLUR_WGSL: &str = include_str!("../../assets/shaders/blur.wgsl");
const MAIN_WGSL: &str = include_str!("../../assets/shaders/main.wgsl");

const VERTICAL: &str =
    "const BLUR_DIRECTION: vec2<f32> = vec2<f32>(0.0, 1.0);";
const HORIZONTAL: &str =
    "const BLUR_DIRECTION: vec2<f32> = vec2<f32>(1.0, 0.0);";

/// Axis of one separable blur pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurDirection {
    /// Along the y axis.
    Vertical,
    /// Along the x axis.
    Horizontal,
}

/// Background pass shader.
#[must_use]
pub fn background_shader() -> ShaderSource {
    ShaderSource::fullscreen(format!("{SHAPES_WGSL}\n{BG_WGSL}"))
}

/// Blur pass shader for `direction`.
#[must_use]
pub fn blur_shader(direction: BlurDirection) -> ShaderSource {
    let fragment = match direction {
        BlurDirection::Vertical => BLUR_WGSL.to_owned(),
        BlurDirection::Horizontal => BLUR_WGSL.replace(VERTICAL, HORIZONTAL),
    };
    ShaderSource::fullscreen(fragment)
}

/// Glass pass shader.
#[must_use]
pub fn glass_shader() -> ShaderSource {
    ShaderSource::fullscreen(format!("{SHAPES_WGSL}\n{MAIN_WGSL}"))
}

/// The demo chain: bg, vertical blur, horizontal blur, glass to screen.
#[must_use]
pub fn pipeline_configs() -> Vec<PassConfig> {
    vec![
        PassConfig::new(BG_PASS, background_shader()),
        PassConfig::new(V_BLUR_PASS, blur_shader(BlurDirection::Vertical))
            .input("u_prevPassTexture", BG_PASS),
        PassConfig::new(H_BLUR_PASS, blur_shader(BlurDirection::Horizontal))
            .input("u_prevPassTexture", V_BLUR_PASS),
        PassConfig::new(MAIN_PASS, glass_shader())
            .input("u_blurredBg", H_BLUR_PASS)
            .input("u_bg", BG_PASS)
            .to_screen(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MAX_BLUR_RADIUS;
    use crate::shader::reflect::{compile_stage, link, ProgramLayout};
    use crate::shader::{ArrayInfo, Stage, UniformType};

    fn layout(source: &ShaderSource) -> ProgramLayout {
        let vertex = compile_stage(Stage::Vertex, &source.vertex).unwrap();
        let fragment =
            compile_stage(Stage::Fragment, &source.fragment).unwrap();
        link(&vertex, &fragment).unwrap()
    }

    #[test]
    fn chain_is_declared_in_order() {
        let configs = pipeline_configs();
        let names: Vec<_> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, [BG_PASS, V_BLUR_PASS, H_BLUR_PASS, MAIN_PASS]);
        assert!(configs[3].output_to_screen);
        assert!(configs[..3].iter().all(|c| !c.output_to_screen));
        assert_eq!(
            configs[3].inputs,
            [
                ("u_blurredBg".to_owned(), H_BLUR_PASS.to_owned()),
                ("u_bg".to_owned(), BG_PASS.to_owned()),
            ]
        );
    }

    #[test]
    fn horizontal_blur_differs_only_in_direction() {
        let v = blur_shader(BlurDirection::Vertical).fragment;
        let h = blur_shader(BlurDirection::Horizontal).fragment;
        assert!(v.contains(VERTICAL));
        assert!(h.contains(HORIZONTAL));
        assert_eq!(v.replace(VERTICAL, HORIZONTAL), h);
    }

    #[test]
    fn background_shader_reflects() {
        let layout = layout(&background_shader());
        let uniforms = layout.uniforms();
        assert_eq!(uniforms["u_bgTexture"].ty, UniformType::Texture);
        assert_eq!(uniforms["u_bgType"].ty, UniformType::Int);
        assert_eq!(uniforms["u_shadowPosition"].ty, UniformType::Vec2);
        assert!(uniforms.contains_key("u_mouseSpring"));
    }

    #[test]
    fn blur_shader_holds_every_weight() {
        for direction in [BlurDirection::Vertical, BlurDirection::Horizontal] {
            let layout = layout(&blur_shader(direction));
            let weights = layout.uniforms()["u_blurWeights"];
            assert_eq!(weights.ty, UniformType::Float);
            assert_eq!(
                weights.array,
                Some(ArrayInfo {
                    len: MAX_BLUR_RADIUS + 1,
                    stride: 16
                })
            );
            assert!(layout.uniforms().contains_key("u_prevPassTexture"));
        }
    }

    #[test]
    fn glass_shader_reflects() {
        let layout = layout(&glass_shader());
        let uniforms = layout.uniforms();
        for name in ["u_blurredBg", "u_bg"] {
            assert_eq!(uniforms[name].ty, UniformType::Texture);
        }
        assert_eq!(uniforms["u_tint"].ty, UniformType::Vec4);
        assert_eq!(uniforms["STEP"].ty, UniformType::Int);
        assert!(uniforms.contains_key("u_glareOppositeFactor"));
    }
}
