//! Ordered chains of render passes feeding each other's outputs.

use std::fmt;

use rustc_hash::FxHashMap;

use super::render_pass::{PassError, RenderPass};
use crate::gpu::render_context::RenderContext;
use crate::gpu::texture::TextureHandle;
use crate::shader::{ShaderSource, UniformMap, UniformValue};

/// Errors from building a [`MultiPassRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    /// The adapter cannot render to and filter half-float textures.
    UnsupportedSurface,
    /// Two passes share a name.
    DuplicatePass(String),
    /// A pass reads the output of itself or of a pass declared after it.
    ForwardInput {
        /// The consuming pass.
        pass: String,
        /// The texture uniform being fed.
        uniform: String,
        /// The referenced producer pass.
        producer: String,
    },
    /// A pass failed to build.
    Pass {
        /// Name of the failing pass.
        name: String,
        /// Underlying shader or framebuffer error.
        source: PassError,
    },
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSurface => write!(
                f,
                "adapter cannot render to and filter half-float textures"
            ),
            Self::DuplicatePass(name) => {
                write!(f, "pass name '{name}' is used more than once")
            }
            Self::ForwardInput {
                pass,
                uniform,
                producer,
            } => write!(
                f,
                "pass '{pass}' reads `{uniform}` from '{producer}', which does \
                 not run before it"
            ),
            Self::Pass { name, source } => {
                write!(f, "pass '{name}' failed to build: {source}")
            }
        }
    }
}

impl std::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pass { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Declaration of one pass in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassConfig {
    /// Unique pass name.
    pub name: String,
    /// Shader pair drawn by the pass.
    pub shader: ShaderSource,
    /// `(texture uniform, producer pass)` pairs.
    pub inputs: Vec<(String, String)>,
    /// Draw into the screen view instead of a framebuffer.
    pub output_to_screen: bool,
}

impl PassConfig {
    /// An offscreen pass with no inputs.
    #[must_use]
    pub fn new(name: impl Into<String>, shader: ShaderSource) -> Self {
        Self {
            name: name.into(),
            shader,
            inputs: Vec::new(),
            output_to_screen: false,
        }
    }

    /// Feed `producer`'s output into the texture uniform `uniform`.
    #[must_use]
    pub fn input(
        mut self,
        uniform: impl Into<String>,
        producer: impl Into<String>,
    ) -> Self {
        self.inputs.push((uniform.into(), producer.into()));
        self
    }

    /// Draw into the screen view.
    #[must_use]
    pub fn to_screen(mut self) -> Self {
        self.output_to_screen = true;
        self
    }
}

/// Per-frame uniforms addressed to individual passes.
#[derive(Debug, Clone, Default)]
pub enum PassUniforms {
    /// No per-pass values.
    #[default]
    None,
    /// Maps in pass declaration order.
    ByIndex(Vec<UniformMap>),
    /// Maps keyed by pass name.
    ByName(FxHashMap<String, UniformMap>),
}

impl PassUniforms {
    /// Values for the pass at `index` named `name`.
    #[must_use]
    pub fn for_pass(&self, index: usize, name: &str) -> Option<&UniformMap> {
        match self {
            Self::None => None,
            Self::ByIndex(maps) => maps.get(index),
            Self::ByName(maps) => maps.get(name),
        }
    }
}

/// Check names and input ordering; returns the name to index lookup.
fn validate_configs(
    configs: &[PassConfig],
) -> Result<FxHashMap<String, usize>, RendererError> {
    let mut index = FxHashMap::default();
    for (i, config) in configs.iter().enumerate() {
        if index.insert(config.name.clone(), i).is_some() {
            return Err(RendererError::DuplicatePass(config.name.clone()));
        }
    }
    for (i, config) in configs.iter().enumerate() {
        for (uniform, producer) in &config.inputs {
            match index.get(producer) {
                Some(&p) if p >= i => {
                    return Err(RendererError::ForwardInput {
                        pass: config.name.clone(),
                        uniform: uniform.clone(),
                        producer: producer.clone(),
                    });
                }
                Some(&p) if configs[p].output_to_screen => log::warn!(
                    "pass '{}' reads `{uniform}` from screen pass '{producer}'; \
                     it will be unbound",
                    config.name
                ),
                Some(_) => {}
                None => log::warn!(
                    "pass '{}' reads `{uniform}` from unknown pass '{producer}'; \
                     it will be unbound",
                    config.name
                ),
            }
        }
    }
    Ok(index)
}

/// Layer globals, per-pass overrides and resolved inputs, later sources
/// winning. An input whose producer has no texture removes its key.
fn compose_uniforms(
    globals: &UniformMap,
    overrides: Option<&UniformMap>,
    inputs: &[(String, String)],
    resolve: impl Fn(&str) -> Option<TextureHandle>,
) -> UniformMap {
    let mut merged = globals.clone();
    if let Some(overrides) = overrides {
        merged.extend(
            overrides
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
    }
    for (uniform, producer) in inputs {
        match resolve(producer) {
            Some(texture) => {
                let _ = merged.insert(uniform.clone(), UniformValue::Texture(texture));
            }
            None => {
                let _ = merged.remove(uniform);
            }
        }
    }
    merged
}

/// Runs an ordered list of passes once per frame, wiring each pass's
/// declared inputs to the current-frame outputs of earlier passes.
pub struct MultiPassRenderer {
    passes: Vec<RenderPass>,
    inputs: Vec<Vec<(String, String)>>,
    index: FxHashMap<String, usize>,
    globals: UniformMap,
}

impl MultiPassRenderer {
    /// Build every pass, sized to the context's current screen size.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] on unsupported adapters, duplicate names,
    /// inputs that reference the same or a later pass, or any pass that
    /// fails to build. Passes built before the failure are released.
    pub fn new(
        ctx: &RenderContext,
        configs: Vec<PassConfig>,
    ) -> Result<Self, RendererError> {
        if !ctx.supports_float_targets() {
            return Err(RendererError::UnsupportedSurface);
        }
        let index = validate_configs(&configs)?;
        let size = (ctx.width(), ctx.height());

        let mut passes = Vec::with_capacity(configs.len());
        let mut inputs = Vec::with_capacity(configs.len());
        for config in configs {
            let built = RenderPass::new(
                ctx,
                &config.name,
                &config.shader,
                config.output_to_screen,
                size,
            );
            match built {
                Ok(pass) => {
                    passes.push(pass);
                    inputs.push(config.inputs);
                }
                Err(source) => {
                    log::error!("pass '{}' failed to build: {source}", config.name);
                    passes.into_iter().for_each(RenderPass::dispose);
                    return Err(RendererError::Pass {
                        name: config.name,
                        source,
                    });
                }
            }
        }
        log::debug!(
            "multi-pass renderer ready with {} passes at {}x{}",
            passes.len(),
            size.0,
            size.1
        );

        Ok(Self {
            passes,
            inputs,
            index,
            globals: UniformMap::default(),
        })
    }

    /// Set a uniform applied to every pass.
    pub fn set_uniform(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        let _ = self.globals.insert(name.into(), value.into());
    }

    /// Set several global uniforms at once.
    pub fn set_uniforms(&mut self, uniforms: UniformMap) {
        self.globals.extend(uniforms);
    }

    /// Remove one global uniform.
    pub fn clear_uniform(&mut self, name: &str) {
        let _ = self.globals.remove(name);
    }

    /// Remove every global uniform.
    pub fn clear_all_uniforms(&mut self) {
        self.globals.clear();
    }

    /// Current value of a global uniform.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.globals.get(name)
    }

    /// Record every pass in order into one encoder and submit it.
    ///
    /// Each pass sees the global uniforms, overridden by its entry in
    /// `per_pass`, overridden by its declared inputs.
    pub fn render(
        &mut self,
        ctx: &RenderContext,
        screen: &wgpu::TextureView,
        per_pass: &PassUniforms,
    ) {
        let mut encoder = ctx.create_encoder();
        for i in 0..self.passes.len() {
            let uniforms = {
                let passes = &self.passes;
                let index = &self.index;
                compose_uniforms(
                    &self.globals,
                    per_pass.for_pass(i, passes[i].name()),
                    &self.inputs[i],
                    |producer| {
                        index
                            .get(producer)
                            .and_then(|&p| passes[p].output_texture())
                    },
                )
            };
            self.passes[i].render(ctx, &mut encoder, screen, &uniforms);
        }
        ctx.submit(encoder);
    }

    /// Render into the next swapchain texture and present it.
    ///
    /// # Errors
    ///
    /// Returns [`wgpu::SurfaceError`] if no frame could be acquired.
    pub fn render_to_surface(
        &mut self,
        ctx: &RenderContext,
        per_pass: &PassUniforms,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = ctx.get_next_frame()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render(ctx, &view, per_pass);
        frame.present();
        Ok(())
    }

    /// Resize every offscreen pass.
    pub fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        for pass in &mut self.passes {
            pass.resize(ctx, width, height);
        }
    }

    /// Output texture of the pass `name`.
    #[must_use]
    pub fn output_texture(&self, name: &str) -> Option<TextureHandle> {
        self.pass(name).and_then(RenderPass::output_texture)
    }

    /// The pass `name`.
    #[must_use]
    pub fn pass(&self, name: &str) -> Option<&RenderPass> {
        self.index.get(name).map(|&i| &self.passes[i])
    }

    /// Mutable access to the pass `name`.
    pub fn pass_mut(&mut self, name: &str) -> Option<&mut RenderPass> {
        let i = *self.index.get(name)?;
        self.passes.get_mut(i)
    }

    /// Pass names in declaration order.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(RenderPass::name)
    }

    /// Number of passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether the renderer has no passes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Release every pass in order and the global uniforms.
    pub fn dispose(self) {
        log::debug!("disposing multi-pass renderer ({} passes)", self.passes.len());
        self.passes.into_iter().for_each(RenderPass::dispose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::resources::GpuObject;
    use crate::gpu::texture::RenderTarget;
    use crate::shader::uniform_map;

    const SOLID: &str = r"
struct Params { u_color: vec4<f32> };
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) v_uv: vec2<f32>) -> @location(0) vec4<f32> {
    return params.u_color;
}
";

    const COPY: &str = r"
@group(0) @binding(0) var u_prev: texture_2d<f32>;
@group(0) @binding(1) var u_prev_sampler: sampler;

@fragment
fn fs_main(@location(0) v_uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(u_prev, u_prev_sampler, v_uv);
}
";

    const TINTED: &str = r"
struct Params { u_tint: vec4<f32> };
@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var u_bg: texture_2d<f32>;
@group(0) @binding(2) var u_bg_sampler: sampler;

@fragment
fn fs_main(@location(0) v_uv: vec2<f32>) -> @location(0) vec4<f32> {
    let bg = textureSample(u_bg, u_bg_sampler, v_uv);
    return vec4<f32>(mix(bg.rgb, params.u_tint.rgb, params.u_tint.a), 1.0);
}
";

    fn config(name: &str) -> PassConfig {
        PassConfig::new(name, ShaderSource::fullscreen(SOLID))
    }

    fn context() -> Option<RenderContext> {
        let ctx = pollster::block_on(RenderContext::headless(4, 4)).ok()?;
        ctx.supports_float_targets().then_some(ctx)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = validate_configs(&[config("a"), config("a")]).unwrap_err();
        assert_eq!(err, RendererError::DuplicatePass("a".to_owned()));
    }

    #[test]
    fn self_and_forward_inputs_are_rejected() {
        let err = validate_configs(&[config("a").input("u_prev", "a")]).unwrap_err();
        assert!(matches!(err, RendererError::ForwardInput { .. }));

        let err = validate_configs(&[config("a").input("u_next", "b"), config("b")])
            .unwrap_err();
        assert_eq!(
            err,
            RendererError::ForwardInput {
                pass: "a".to_owned(),
                uniform: "u_next".to_owned(),
                producer: "b".to_owned(),
            }
        );
    }

    #[test]
    fn unknown_and_screen_producers_are_accepted() {
        let index = validate_configs(&[
            config("screen").to_screen(),
            config("b").input("u_a", "screen").input("u_b", "nowhere"),
        ])
        .unwrap();
        assert_eq!(index["screen"], 0);
        assert_eq!(index["b"], 1);
    }

    #[test]
    fn later_layers_win_and_missing_inputs_are_removed() {
        let globals = uniform_map([
            ("u_scale", UniformValue::Float(1.0)),
            ("u_offset", UniformValue::Float(0.0)),
            ("u_prev", UniformValue::Float(9.0)),
        ]);
        let overrides = uniform_map([("u_offset", 5.0_f32)]);
        let inputs = vec![("u_prev".to_owned(), "missing".to_owned())];
        let merged = compose_uniforms(&globals, Some(&overrides), &inputs, |_| None);
        assert_eq!(merged["u_scale"], UniformValue::Float(1.0));
        assert_eq!(merged["u_offset"], UniformValue::Float(5.0));
        assert!(!merged.contains_key("u_prev"));
    }

    #[test]
    fn pass_uniforms_lookup() {
        let by_index = PassUniforms::ByIndex(vec![UniformMap::default()]);
        assert!(by_index.for_pass(0, "x").is_some());
        assert!(by_index.for_pass(1, "x").is_none());
        let mut maps = FxHashMap::default();
        let _ = maps.insert("main".to_owned(), UniformMap::default());
        let by_name = PassUniforms::ByName(maps);
        assert!(by_name.for_pass(7, "main").is_some());
        assert!(PassUniforms::None.for_pass(0, "main").is_none());
    }

    fn render_once(
        ctx: &RenderContext,
        renderer: &mut MultiPassRenderer,
        per_pass: &PassUniforms,
    ) -> Vec<u8> {
        let screen = RenderTarget::new(&ctx.device, 4, 4, ctx.format());
        renderer.render(ctx, &screen.view, per_pass);
        screen.read_pixels(ctx).unwrap()
    }

    #[test]
    fn chain_samples_current_frame_outputs() {
        let Some(ctx) = context() else { return };
        let mut renderer = MultiPassRenderer::new(
            &ctx,
            vec![
                config("a"),
                PassConfig::new("b", ShaderSource::fullscreen(COPY)).input("u_prev", "a"),
                PassConfig::new("c", ShaderSource::fullscreen(COPY))
                    .input("u_prev", "b")
                    .to_screen(),
            ],
        )
        .unwrap();
        assert_eq!(renderer.pass_names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert!(renderer.output_texture("c").is_none());

        renderer.set_uniform("u_color", [1.0_f32, 0.0, 0.0, 1.0]);
        assert_eq!(&render_once(&ctx, &mut renderer, &PassUniforms::None)[..4], &[255, 0, 0, 255]);

        renderer.set_uniform("u_color", [0.0_f32, 1.0, 0.0, 1.0]);
        assert_eq!(&render_once(&ctx, &mut renderer, &PassUniforms::None)[..4], &[0, 255, 0, 255]);

        let per_pass = PassUniforms::ByIndex(vec![uniform_map([(
            "u_color",
            [0.0_f32, 0.0, 1.0, 1.0],
        )])]);
        assert_eq!(&render_once(&ctx, &mut renderer, &per_pass)[..4], &[0, 0, 255, 255]);
        renderer.dispose();
    }

    #[test]
    fn tint_changes_output_without_new_programs() {
        let Some(ctx) = context() else { return };
        let mut renderer = MultiPassRenderer::new(
            &ctx,
            vec![
                config("bg"),
                PassConfig::new("main", ShaderSource::fullscreen(TINTED))
                    .input("u_bg", "bg")
                    .to_screen(),
            ],
        )
        .unwrap();
        renderer.set_uniform("u_color", [0.0_f32, 0.0, 1.0, 1.0]);
        renderer.set_uniform("u_tint", [1.0_f32, 0.0, 0.0, 0.0]);
        let programs = ctx.counters().created(GpuObject::Program);
        let untinted = render_once(&ctx, &mut renderer, &PassUniforms::None);
        assert_eq!(&untinted[..4], &[0, 0, 255, 255]);

        renderer.set_uniform("u_tint", [1.0_f32, 0.0, 0.0, 1.0]);
        let tinted = render_once(&ctx, &mut renderer, &PassUniforms::None);
        assert_eq!(&tinted[..4], &[255, 0, 0, 255]);
        assert_eq!(ctx.counters().created(GpuObject::Program), programs);
        renderer.dispose();
    }

    #[test]
    fn resize_keeps_output_identity() {
        let Some(ctx) = context() else { return };
        let mut renderer =
            MultiPassRenderer::new(&ctx, vec![config("a"), config("b").to_screen()])
                .unwrap();
        let before = renderer.output_texture("a").unwrap();
        renderer.resize(&ctx, 12, 6);
        let after = renderer.output_texture("a").unwrap();
        assert_eq!(before.id(), after.id());
        assert_eq!(after.size(), (12, 6));
        drop((before, after));
        renderer.dispose();
    }

    #[test]
    fn dispose_returns_counters_to_baseline() {
        let Some(ctx) = context() else { return };
        let counters = ctx.counters().clone();
        let baseline: Vec<usize> = [
            GpuObject::Program,
            GpuObject::FrameBuffer,
            GpuObject::Texture,
            GpuObject::Buffer,
        ]
        .iter()
        .map(|&kind| counters.live(kind))
        .collect();

        let mut renderer = MultiPassRenderer::new(
            &ctx,
            vec![
                config("a"),
                PassConfig::new("b", ShaderSource::fullscreen(COPY))
                    .input("u_prev", "a")
                    .to_screen(),
            ],
        )
        .unwrap();
        let _ = render_once(&ctx, &mut renderer, &PassUniforms::None);
        assert!(counters.total_live() > 0);
        renderer.dispose();

        let after: Vec<usize> = [
            GpuObject::Program,
            GpuObject::FrameBuffer,
            GpuObject::Texture,
            GpuObject::Buffer,
        ]
        .iter()
        .map(|&kind| counters.live(kind))
        .collect();
        assert_eq!(after, baseline);
        assert_eq!(
            counters.created(GpuObject::Program),
            counters.released(GpuObject::Program)
        );
    }

    #[test]
    fn failing_pass_reports_its_name() {
        let Some(ctx) = context() else { return };
        let result = MultiPassRenderer::new(
            &ctx,
            vec![
                config("ok"),
                PassConfig::new("broken", ShaderSource::fullscreen("@fragment fn")),
            ],
        );
        match result {
            Err(RendererError::Pass { name, source }) => {
                assert_eq!(name, "broken");
                assert!(matches!(source, PassError::Shader(_)));
            }
            _ => panic!("expected the broken pass to fail"),
        }
        assert_eq!(ctx.counters().total_live(), 0);
    }
}
