use std::borrow::Cow;

use rustc_hash::FxHashMap;

use super::reflect::{
    self, AttributeInfo, BindingKind, ProgramLayout, ScalarType, UniformInfo,
};
use super::uniforms::{UniformStorage, UniformValue};
use super::{ShaderError, ShaderSource, Stage};
use crate::gpu::pipeline_helpers::{self, PassPipelineDesc};
use crate::gpu::render_context::RenderContext;
use crate::gpu::resources::Tracked;
use crate::gpu::texture::{TextureHandle, TextureId};

/// Vertex attribute fed from the full-screen quad.
const QUAD_ATTRIBUTE: &str = "a_position";

/// Attachment formats a program renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramTarget {
    /// Color attachment format.
    pub color_format: wgpu::TextureFormat,
    /// Depth attachment format, if any.
    pub depth_format: Option<wgpu::TextureFormat>,
}

struct UniformBuffer {
    group: u32,
    binding: u32,
    buffer: Tracked<wgpu::Buffer>,
}

/// Bind groups built for one set of bound textures.
struct BindGroupCache {
    key: Vec<(TextureId, u64)>,
    groups: Vec<wgpu::BindGroup>,
}

enum Resource<'a> {
    Buffer(&'a wgpu::Buffer),
    View(wgpu::TextureView),
    Sampler(wgpu::Sampler),
}

/// A linked vertex + fragment pipeline with named uniforms.
pub struct ShaderProgram {
    label: String,
    layout: ProgramLayout,
    storage: UniformStorage,
    pipeline: Tracked<wgpu::RenderPipeline>,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    buffers: Vec<UniformBuffer>,
    placeholder: Option<TextureHandle>,
    sampler: wgpu::Sampler,
    cache: Option<BindGroupCache>,
}

impl ShaderProgram {
    /// Compile both stages, link them, and create the render pipeline.
    ///
    /// # Errors
    ///
    /// [`ShaderError::Compile`] names the stage whose WGSL failed to parse or
    /// validate. [`ShaderError::Link`] covers interface mismatches, uniform
    /// types the engine cannot set, vertex inputs the full-screen quad cannot
    /// feed, and pipeline validation failures.
    pub fn new(
        ctx: &RenderContext,
        label: &str,
        source: &ShaderSource,
        target: &ProgramTarget,
    ) -> Result<Self, ShaderError> {
        let vertex = reflect::compile_stage(Stage::Vertex, &source.vertex)?;
        let fragment =
            reflect::compile_stage(Stage::Fragment, &source.fragment)?;
        let layout = reflect::link(&vertex, &fragment)?;
        let quad_location = quad_location(layout.attributes())?;

        let group_layouts = create_group_layouts(&ctx.device, label, &layout);
        let group_layout_refs: Vec<&wgpu::BindGroupLayout> =
            group_layouts.iter().collect();

        let (pipeline, error) = ctx.scoped(|device| {
            let vertex_module =
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&format!("{label} Vertex")),
                    source: wgpu::ShaderSource::Naga(Cow::Owned(vertex.module)),
                });
            let fragment_module =
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&format!("{label} Fragment")),
                    source: wgpu::ShaderSource::Naga(Cow::Owned(
                        fragment.module,
                    )),
                });
            pipeline_helpers::create_pass_pipeline(
                device,
                &PassPipelineDesc {
                    label,
                    vertex: &vertex_module,
                    vertex_entry: &layout.vertex_entry,
                    fragment: &fragment_module,
                    fragment_entry: &layout.fragment_entry,
                    quad_location,
                    color_format: target.color_format,
                    depth_format: target.depth_format,
                    bind_group_layouts: &group_layout_refs,
                },
            )
        });
        if let Some(error) = error {
            return Err(ShaderError::Link {
                log: error.to_string(),
            });
        }
        let pipeline = Tracked::new(pipeline, ctx.counters());

        let buffers = layout
            .bindings()
            .iter()
            .filter_map(|b| match b.kind {
                BindingKind::UniformBuffer { size } => Some(UniformBuffer {
                    group: b.group,
                    binding: b.binding,
                    buffer: Tracked::new(
                        ctx.device.create_buffer(&wgpu::BufferDescriptor {
                            label: Some(&format!("{label} {}", b.name)),
                            size: u64::from(size),
                            usage: wgpu::BufferUsages::UNIFORM
                                | wgpu::BufferUsages::COPY_DST,
                            mapped_at_creation: false,
                        }),
                        ctx.counters(),
                    ),
                }),
                BindingKind::Texture | BindingKind::Sampler => None,
            })
            .collect();

        let has_textures =
            layout.bindings().iter().any(|b| b.kind == BindingKind::Texture);
        let placeholder = has_textures
            .then(|| TextureHandle::empty(ctx, &format!("{label} Placeholder")));
        let sampler = pipeline_helpers::linear_sampler(
            &ctx.device,
            &format!("{label} Sampler"),
        );

        log::debug!(
            "linked program '{label}': {} attributes, {} uniforms, {} bind groups",
            layout.attributes().len(),
            layout.uniforms().len(),
            group_layouts.len(),
        );

        Ok(Self {
            label: label.to_owned(),
            storage: UniformStorage::new(&layout),
            layout,
            pipeline,
            group_layouts,
            buffers,
            placeholder,
            sampler,
            cache: None,
        })
    }

    /// Debug label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Active vertex attributes by name.
    #[must_use]
    pub fn attributes(&self) -> &FxHashMap<String, AttributeInfo> {
        self.layout.attributes()
    }

    /// Active uniforms by name.
    #[must_use]
    pub fn uniforms(&self) -> &FxHashMap<String, UniformInfo> {
        self.layout.uniforms()
    }

    /// Full reflected interface.
    #[must_use]
    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// `@location` of the attribute `name`, if the vertex stage consumes it.
    #[must_use]
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.layout.attributes().get(name).map(|a| a.location)
    }

    /// Whether the vertex stage reads the full-screen quad positions.
    #[must_use]
    pub fn uses_quad(&self) -> bool {
        self.layout.attributes().contains_key(QUAD_ATTRIBUTE)
    }

    /// Assign a uniform by name. Unknown names and values that do not fit
    /// the declared type are ignored.
    pub fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        if let UniformValue::Texture(handle) = value {
            if handle.format().is_depth_stencil_format() {
                log::warn!(
                    "program '{}': depth texture '{}' cannot be bound to `{name}`",
                    self.label,
                    handle.label()
                );
                return;
            }
        }
        let _ = self.storage.set(name, value);
    }

    /// Current CPU-side value of a uniform.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.storage.get(name)
    }

    /// Drop every texture binding so unbound textures sample the
    /// placeholder.
    pub fn clear_textures(&mut self) {
        self.storage.clear_textures();
    }

    /// Upload changed uniform buffers and rebuild bind groups if the bound
    /// textures changed. Call before [`ShaderProgram::activate`].
    pub fn prepare(&mut self, ctx: &RenderContext) {
        let buffers = &self.buffers;
        self.storage.flush(|group, binding, bytes| {
            if let Some(target) = buffers
                .iter()
                .find(|b| b.group == group && b.binding == binding)
            {
                ctx.queue.write_buffer(&target.buffer, 0, bytes);
            }
        });

        let key = self.texture_key();
        if self.cache.as_ref().is_some_and(|c| c.key == key) {
            return;
        }
        let groups = self.build_bind_groups(&ctx.device);
        self.cache = Some(BindGroupCache { key, groups });
    }

    /// Set this program's pipeline and bind groups on `pass`.
    pub fn activate(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        if let Some(cache) = &self.cache {
            for (index, group) in cache.groups.iter().enumerate() {
                pass.set_bind_group(index as u32, group, &[]);
            }
        }
    }

    /// Release the pipeline, uniform buffers and placeholder texture.
    pub fn dispose(self) {
        log::debug!("disposing program '{}'", self.label);
    }

    fn texture_for(&self, name: &str) -> Option<&TextureHandle> {
        self.storage.texture(name).or(self.placeholder.as_ref())
    }

    fn texture_key(&self) -> Vec<(TextureId, u64)> {
        self.layout
            .bindings()
            .iter()
            .filter(|b| b.kind == BindingKind::Texture)
            .filter_map(|b| self.texture_for(&b.name))
            .map(TextureHandle::binding_key)
            .collect()
    }

    /// Sampler for a sampler uniform: `<tex>_sampler` follows the texture
    /// bound to `<tex>`.
    fn sampler_for(&self, name: &str) -> wgpu::Sampler {
        name.strip_suffix("_sampler")
            .and_then(|texture| self.storage.texture(texture))
            .map_or_else(|| self.sampler.clone(), TextureHandle::sampler)
    }

    fn build_bind_groups(&self, device: &wgpu::Device) -> Vec<wgpu::BindGroup> {
        let label = &self.label;
        self.group_layouts
            .iter()
            .enumerate()
            .map(|(group, group_layout)| {
                let group = group as u32;
                let resources: Vec<(u32, Resource<'_>)> = self
                    .layout
                    .bindings()
                    .iter()
                    .filter(|b| b.group == group)
                    .filter_map(|b| {
                        let resource = match b.kind {
                            BindingKind::UniformBuffer { .. } => self
                                .buffers
                                .iter()
                                .find(|u| u.group == group && u.binding == b.binding)
                                .map(|u| Resource::Buffer(&u.buffer))?,
                            BindingKind::Texture => {
                                Resource::View(self.texture_for(&b.name)?.view())
                            }
                            BindingKind::Sampler => {
                                Resource::Sampler(self.sampler_for(&b.name))
                            }
                        };
                        Some((b.binding, resource))
                    })
                    .collect();
                let entries: Vec<wgpu::BindGroupEntry<'_>> = resources
                    .iter()
                    .map(|(binding, resource)| wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: match resource {
                            Resource::Buffer(buffer) => {
                                buffer.as_entire_binding()
                            }
                            Resource::View(view) => {
                                wgpu::BindingResource::TextureView(view)
                            }
                            Resource::Sampler(sampler) => {
                                wgpu::BindingResource::Sampler(sampler)
                            }
                        },
                    })
                    .collect();
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{label} Bind Group {group}")),
                    layout: group_layout,
                    entries: &entries,
                })
            })
            .collect()
    }
}

/// Check the vertex inputs against what the full-screen quad provides.
fn quad_location(
    attributes: &FxHashMap<String, AttributeInfo>,
) -> Result<Option<u32>, ShaderError> {
    let mut location = None;
    for (name, attribute) in attributes {
        if name != QUAD_ATTRIBUTE {
            return Err(ShaderError::Link {
                log: format!(
                    "vertex input `{name}` cannot be fed by the full-screen \
                     quad (only `{QUAD_ATTRIBUTE}` is provided)"
                ),
            });
        }
        if attribute.components != 2 || attribute.scalar != ScalarType::F32 {
            return Err(ShaderError::Link {
                log: format!("`{QUAD_ATTRIBUTE}` must be declared as vec2<f32>"),
            });
        }
        location = Some(attribute.location);
    }
    Ok(location)
}

fn create_group_layouts(
    device: &wgpu::Device,
    label: &str,
    layout: &ProgramLayout,
) -> Vec<wgpu::BindGroupLayout> {
    (0..layout.group_count())
        .map(|group| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = layout
                .bindings()
                .iter()
                .filter(|b| b.group == group)
                .map(|b| match b.kind {
                    BindingKind::UniformBuffer { size } => {
                        pipeline_helpers::uniform_buffer(b.binding, u64::from(size))
                    }
                    BindingKind::Texture => pipeline_helpers::texture_2d(b.binding),
                    BindingKind::Sampler => {
                        pipeline_helpers::filtering_sampler(b.binding)
                    }
                })
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label} Group {group} Layout")),
                entries: &entries,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::resources::GpuObject;

    fn context() -> Option<RenderContext> {
        pollster::block_on(RenderContext::headless(64, 64)).ok()
    }

    fn target(ctx: &RenderContext) -> ProgramTarget {
        ProgramTarget {
            color_format: ctx.format(),
            depth_format: None,
        }
    }

    const FRAGMENT: &str = r"
struct Params { u_tint: vec4<f32>, u_amount: f32 };
@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var u_image: texture_2d<f32>;
@group(0) @binding(2) var u_image_sampler: sampler;

@fragment
fn fs_main(@location(0) v_uv: vec2<f32>) -> @location(0) vec4<f32> {
    return mix(textureSample(u_image, u_image_sampler, v_uv), params.u_tint, params.u_amount);
}
";

    #[test]
    fn quad_location_accepts_only_a_position() {
        let mut attributes = FxHashMap::default();
        assert_eq!(quad_location(&attributes), Ok(None));
        let _ = attributes.insert(
            QUAD_ATTRIBUTE.to_owned(),
            AttributeInfo {
                location: 2,
                components: 2,
                scalar: ScalarType::F32,
            },
        );
        assert_eq!(quad_location(&attributes), Ok(Some(2)));
        let _ = attributes.insert(
            "a_color".to_owned(),
            AttributeInfo {
                location: 1,
                components: 4,
                scalar: ScalarType::F32,
            },
        );
        assert!(matches!(
            quad_location(&attributes),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn program_links_and_exposes_interface() {
        let Some(ctx) = context() else { return };
        let mut program = ShaderProgram::new(
            &ctx,
            "test",
            &ShaderSource::fullscreen(FRAGMENT),
            &target(&ctx),
        )
        .unwrap();
        assert_eq!(program.attribute_location("a_position"), Some(0));
        assert_eq!(program.attribute_location("a_missing"), None);
        assert!(program.uses_quad());
        assert!(program.uniforms().contains_key("u_image"));

        program.set_uniform("u_amount", &0.75_f32.into());
        program.set_uniform("u_not_declared", &1.0_f32.into());
        assert_eq!(program.uniform("u_amount"), Some(UniformValue::Float(0.75)));
        assert_eq!(program.uniform("u_not_declared"), None);
        program.prepare(&ctx);
        program.dispose();
    }

    #[test]
    fn compile_errors_name_the_stage() {
        let Some(ctx) = context() else { return };
        let broken = ShaderSource::new("@vertex fn vs_main( {", FRAGMENT);
        match ShaderProgram::new(&ctx, "broken", &broken, &target(&ctx)) {
            Err(ShaderError::Compile { stage, .. }) => {
                assert_eq!(stage, Stage::Vertex);
            }
            other => panic!("expected vertex compile error, got {:?}", other.err()),
        }
    }

    #[test]
    fn dispose_releases_every_object_once() {
        let Some(ctx) = context() else { return };
        let counters = ctx.counters().clone();
        let before = counters.total_live();
        let program = ShaderProgram::new(
            &ctx,
            "counted",
            &ShaderSource::fullscreen(FRAGMENT),
            &target(&ctx),
        )
        .unwrap();
        assert_eq!(counters.live(GpuObject::Program), 1);
        assert_eq!(counters.live(GpuObject::Buffer), 1);
        assert_eq!(counters.live(GpuObject::Texture), 1);
        program.dispose();
        assert_eq!(counters.total_live(), before);
        assert_eq!(counters.released(GpuObject::Program), 1);
    }
}
