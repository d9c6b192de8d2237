//! WGSL compilation and interface introspection on top of naga.
//!
//! Each stage is parsed and validated on its own, then [`link`] matches the
//! stages against each other and flattens their resources into the name-keyed
//! tables a [`ShaderProgram`](super::ShaderProgram) exposes.

use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use naga::{
    AddressSpace, ArraySize, Binding, ImageClass, ImageDimension, Module,
    ScalarKind, ShaderStage, TypeInner, VectorSize,
};
use rustc_hash::FxHashMap;

use super::{ShaderError, Stage};

/// Scalar component type of a vertex attribute or stage interface value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// 32-bit float.
    F32,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
}

/// A vertex stage input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    /// `@location` index.
    pub location: u32,
    /// Component count (1 to 4).
    pub components: u32,
    /// Component type.
    pub scalar: ScalarType,
}

/// Declared type of a uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// `f32`
    Float,
    /// `i32`
    Int,
    /// `u32`
    Uint,
    /// `vec2<f32>`
    Vec2,
    /// `vec3<f32>`
    Vec3,
    /// `vec4<f32>`
    Vec4,
    /// `vec2<i32>`
    IVec2,
    /// `vec3<i32>`
    IVec3,
    /// `vec4<i32>`
    IVec4,
    /// `vec2<u32>`
    UVec2,
    /// `vec3<u32>`
    UVec3,
    /// `vec4<u32>`
    UVec4,
    /// `mat2x2<f32>`
    Mat2,
    /// `mat3x3<f32>`
    Mat3,
    /// `mat4x4<f32>`
    Mat4,
    /// Non-square `matCxR<f32>`.
    Mat {
        /// Column count.
        columns: u8,
        /// Row count.
        rows: u8,
    },
    /// A block member with no settable representation, such as a nested
    /// struct. It is reported with its slot but never written.
    Opaque,
    /// `texture_2d<f32>`
    Texture,
    /// `sampler`
    Sampler,
}

impl UniformType {
    /// Number of scalar values a caller supplies for one element.
    #[must_use]
    pub fn components(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Uint => 1,
            Self::Vec2 | Self::IVec2 | Self::UVec2 => 2,
            Self::Vec3 | Self::IVec3 | Self::UVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::UVec4 => 4,
            Self::Mat2 | Self::Mat3 | Self::Mat4 | Self::Mat { .. } => self
                .matrix_shape()
                .map_or(0, |(columns, rows)| columns * rows),
            Self::Opaque | Self::Texture | Self::Sampler => 0,
        }
    }

    /// `(columns, rows)` for matrix types.
    #[must_use]
    pub fn matrix_shape(self) -> Option<(usize, usize)> {
        match self {
            Self::Mat2 => Some((2, 2)),
            Self::Mat3 => Some((3, 3)),
            Self::Mat4 => Some((4, 4)),
            Self::Mat { columns, rows } => {
                Some((usize::from(columns), usize::from(rows)))
            }
            _ => None,
        }
    }

    /// Component type of numeric uniforms.
    #[must_use]
    pub fn scalar(self) -> Option<ScalarType> {
        match self {
            Self::Int | Self::IVec2 | Self::IVec3 | Self::IVec4 => {
                Some(ScalarType::I32)
            }
            Self::Uint | Self::UVec2 | Self::UVec3 | Self::UVec4 => {
                Some(ScalarType::U32)
            }
            Self::Opaque | Self::Texture | Self::Sampler => None,
            _ => Some(ScalarType::F32),
        }
    }
}

/// Length and byte stride of an array uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayInfo {
    /// Element count.
    pub len: u32,
    /// Distance in bytes between consecutive elements.
    pub stride: u32,
}

/// Where a uniform's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformSlot {
    /// A byte offset inside a uniform buffer.
    Block {
        /// Bind group index.
        group: u32,
        /// Binding index of the buffer.
        binding: u32,
        /// Byte offset of the value inside the buffer.
        offset: u32,
    },
    /// A texture or sampler binding.
    Resource {
        /// Bind group index.
        group: u32,
        /// Binding index.
        binding: u32,
    },
}

/// Introspected description of one uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformInfo {
    /// Declared type (of each element, for arrays).
    pub ty: UniformType,
    /// Array shape, `None` for non-arrays.
    pub array: Option<ArrayInfo>,
    /// Storage location.
    pub slot: UniformSlot,
}

/// What a bind group entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Uniform buffer of `size` bytes.
    UniformBuffer {
        /// Buffer size in bytes, rounded up to 16.
        size: u32,
    },
    /// Filterable float 2D texture.
    Texture,
    /// Filtering sampler.
    Sampler,
}

/// One bind group entry required by a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    /// Bind group index.
    pub group: u32,
    /// Binding index.
    pub binding: u32,
    /// Resource kind.
    pub kind: BindingKind,
    /// Name of the global variable declaring it.
    pub name: String,
}

/// A parsed and validated single-stage module.
pub struct StageModule {
    pub(crate) stage: Stage,
    pub(crate) module: Module,
    info: ModuleInfo,
    entry: usize,
}

impl StageModule {
    /// Name of the entry point used for this stage.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.module.entry_points[self.entry].name
    }
}

/// Parse and validate one stage's WGSL and locate its entry point.
///
/// # Errors
///
/// Returns [`ShaderError::Compile`] with naga's rendered diagnostic when the
/// text fails to parse or validate, or has no entry point for `stage`.
pub fn compile_stage(
    stage: Stage,
    source: &str,
) -> Result<StageModule, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        ShaderError::Compile {
            stage,
            log: e.emit_to_string(source),
        }
    })?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| ShaderError::Compile {
            stage,
            log: e.emit_to_string(source),
        })?;
    let wanted = match stage {
        Stage::Vertex => ShaderStage::Vertex,
        Stage::Fragment => ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == wanted)
        .ok_or_else(|| ShaderError::Compile {
            stage,
            log: format!("no @{stage} entry point"),
        })?;
    Ok(StageModule {
        stage,
        module,
        info,
        entry,
    })
}

/// Interface tables of a linked vertex/fragment pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramLayout {
    pub(crate) attributes: FxHashMap<String, AttributeInfo>,
    pub(crate) uniforms: FxHashMap<String, UniformInfo>,
    pub(crate) bindings: Vec<ResourceBinding>,
    pub(crate) vertex_entry: String,
    pub(crate) fragment_entry: String,
}

impl ProgramLayout {
    /// Active vertex attributes by name.
    #[must_use]
    pub fn attributes(&self) -> &FxHashMap<String, AttributeInfo> {
        &self.attributes
    }

    /// Active uniforms by name.
    #[must_use]
    pub fn uniforms(&self) -> &FxHashMap<String, UniformInfo> {
        &self.uniforms
    }

    /// Bind group entries sorted by `(group, binding)`.
    #[must_use]
    pub fn bindings(&self) -> &[ResourceBinding] {
        &self.bindings
    }

    /// Number of bind groups the pipeline layout needs.
    #[must_use]
    pub fn group_count(&self) -> u32 {
        self.bindings.iter().map(|b| b.group + 1).max().unwrap_or(0)
    }
}

/// Match a vertex and fragment stage and collect their interfaces.
///
/// # Errors
///
/// Returns [`ShaderError::Link`] when a fragment input is not produced by the
/// vertex stage, shared bindings disagree, or a uniform has a type the engine
/// cannot set.
pub fn link(
    vertex: &StageModule,
    fragment: &StageModule,
) -> Result<ProgramLayout, ShaderError> {
    check_varyings(vertex, fragment)?;

    let mut layout = ProgramLayout {
        attributes: vertex_attributes(vertex)?,
        vertex_entry: vertex.entry_point().to_owned(),
        fragment_entry: fragment.entry_point().to_owned(),
        ..ProgramLayout::default()
    };
    for stage in [vertex, fragment] {
        collect_globals(stage, &mut layout)?;
    }
    layout.bindings.sort_by_key(|b| (b.group, b.binding));
    Ok(layout)
}

fn link_error(log: impl Into<String>) -> ShaderError {
    ShaderError::Link { log: log.into() }
}

/// Flattened `@location` interface value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IoValue {
    components: u32,
    scalar: ScalarType,
}

fn scalar_type(scalar: naga::Scalar) -> Option<ScalarType> {
    match (scalar.kind, scalar.width) {
        (ScalarKind::Float, 4) => Some(ScalarType::F32),
        (ScalarKind::Sint, 4) => Some(ScalarType::I32),
        (ScalarKind::Uint, 4) => Some(ScalarType::U32),
        _ => None,
    }
}

fn io_value(inner: &TypeInner) -> Option<IoValue> {
    match *inner {
        TypeInner::Scalar(scalar) => Some(IoValue {
            components: 1,
            scalar: scalar_type(scalar)?,
        }),
        TypeInner::Vector { size, scalar } => Some(IoValue {
            components: size as u32,
            scalar: scalar_type(scalar)?,
        }),
        _ => None,
    }
}

/// A named, typed argument or result with its optional binding.
type IoItem = (Option<String>, naga::Handle<naga::Type>, Option<Binding>);

/// `(name, location, type)` of every `@location` value in a list of
/// arguments or a result, flattening struct members.
fn locations(
    module: &Module,
    values: impl Iterator<Item = IoItem>,
) -> Vec<(String, u32, Option<IoValue>)> {
    let mut found = Vec::new();
    for (name, ty, binding) in values {
        let inner = &module.types[ty].inner;
        match (binding, inner) {
            (Some(Binding::Location { location, .. }), _) => {
                let name = name.unwrap_or_default();
                found.push((name, location, io_value(inner)));
            }
            (None, TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(Binding::Location { location, .. }) =
                        member.binding
                    {
                        found.push((
                            member.name.clone().unwrap_or_default(),
                            location,
                            io_value(&module.types[member.ty].inner),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    found
}

fn stage_inputs(stage: &StageModule) -> Vec<(String, u32, Option<IoValue>)> {
    let function = &stage.module.entry_points[stage.entry].function;
    locations(
        &stage.module,
        function
            .arguments
            .iter()
            .map(|arg| (arg.name.clone(), arg.ty, arg.binding.clone())),
    )
}

fn stage_outputs(stage: &StageModule) -> Vec<(String, u32, Option<IoValue>)> {
    let function = &stage.module.entry_points[stage.entry].function;
    locations(
        &stage.module,
        function
            .result
            .iter()
            .map(|result| (None, result.ty, result.binding.clone())),
    )
}

fn vertex_attributes(
    vertex: &StageModule,
) -> Result<FxHashMap<String, AttributeInfo>, ShaderError> {
    let mut attributes = FxHashMap::default();
    for (name, location, value) in stage_inputs(vertex) {
        let value = value.ok_or_else(|| {
            link_error(format!(
                "vertex input `{name}` has a type that cannot be a vertex \
                 attribute"
            ))
        })?;
        let _ = attributes.insert(
            name,
            AttributeInfo {
                location,
                components: value.components,
                scalar: value.scalar,
            },
        );
    }
    Ok(attributes)
}

fn check_varyings(
    vertex: &StageModule,
    fragment: &StageModule,
) -> Result<(), ShaderError> {
    let outputs: FxHashMap<u32, Option<IoValue>> = stage_outputs(vertex)
        .into_iter()
        .map(|(_, location, value)| (location, value))
        .collect();
    for (name, location, value) in stage_inputs(fragment) {
        match outputs.get(&location) {
            None => {
                return Err(link_error(format!(
                    "fragment input `{name}` at @location({location}) is not \
                     written by the vertex stage"
                )));
            }
            Some(written) if *written != value => {
                return Err(link_error(format!(
                    "fragment input `{name}` at @location({location}) does not \
                     match the type written by the vertex stage"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn uniform_type(inner: &TypeInner) -> Option<UniformType> {
    match *inner {
        TypeInner::Scalar(scalar) => Some(match scalar_type(scalar)? {
            ScalarType::F32 => UniformType::Float,
            ScalarType::I32 => UniformType::Int,
            ScalarType::U32 => UniformType::Uint,
        }),
        TypeInner::Vector { size, scalar } => {
            Some(match (scalar_type(scalar)?, size) {
                (ScalarType::F32, VectorSize::Bi) => UniformType::Vec2,
                (ScalarType::F32, VectorSize::Tri) => UniformType::Vec3,
                (ScalarType::F32, VectorSize::Quad) => UniformType::Vec4,
                (ScalarType::I32, VectorSize::Bi) => UniformType::IVec2,
                (ScalarType::I32, VectorSize::Tri) => UniformType::IVec3,
                (ScalarType::I32, VectorSize::Quad) => UniformType::IVec4,
                (ScalarType::U32, VectorSize::Bi) => UniformType::UVec2,
                (ScalarType::U32, VectorSize::Tri) => UniformType::UVec3,
                (ScalarType::U32, VectorSize::Quad) => UniformType::UVec4,
            })
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if scalar_type(scalar) == Some(ScalarType::F32) => {
            Some(match (columns, rows) {
                (VectorSize::Bi, VectorSize::Bi) => UniformType::Mat2,
                (VectorSize::Tri, VectorSize::Tri) => UniformType::Mat3,
                (VectorSize::Quad, VectorSize::Quad) => UniformType::Mat4,
                (columns, rows) => UniformType::Mat {
                    columns: columns as u8,
                    rows: rows as u8,
                },
            })
        }
        _ => None,
    }
}

/// Element type of a uniform array, unwrapping single-member padding
/// structs such as `struct F32x16 { @size(16) v: f32 }`.
fn array_element(module: &Module, inner: &TypeInner) -> UniformType {
    let element = match inner {
        TypeInner::Struct { members, .. }
            if members.len() == 1 && members[0].offset == 0 =>
        {
            &module.types[members[0].ty].inner
        }
        _ => inner,
    };
    uniform_type(element).unwrap_or(UniformType::Opaque)
}

fn value_type(
    module: &Module,
    ty: naga::Handle<naga::Type>,
) -> (UniformType, Option<ArrayInfo>) {
    match module.types[ty].inner {
        TypeInner::Array {
            base,
            size: ArraySize::Constant(len),
            stride,
        } => (
            array_element(module, &module.types[base].inner),
            Some(ArrayInfo {
                len: len.get(),
                stride,
            }),
        ),
        ref inner => {
            (uniform_type(inner).unwrap_or(UniformType::Opaque), None)
        }
    }
}

fn block_uniform(
    layout: &mut ProgramLayout,
    module: &Module,
    name: String,
    ty: naga::Handle<naga::Type>,
    slot: UniformSlot,
) -> Result<(), ShaderError> {
    let (ty, array) = value_type(module, ty);
    if ty == UniformType::Opaque {
        log::debug!("uniform `{name}` has no settable type; it is read-only");
    }
    add_uniform(layout, name, UniformInfo { ty, array, slot })
}

fn add_binding(
    layout: &mut ProgramLayout,
    binding: ResourceBinding,
) -> Result<(), ShaderError> {
    if let Some(existing) = layout
        .bindings
        .iter()
        .find(|b| b.group == binding.group && b.binding == binding.binding)
    {
        if *existing != binding {
            return Err(link_error(format!(
                "@group({}) @binding({}) is declared as `{}` and `{}` with \
                 different types",
                binding.group, binding.binding, existing.name, binding.name
            )));
        }
        return Ok(());
    }
    layout.bindings.push(binding);
    Ok(())
}

fn add_uniform(
    layout: &mut ProgramLayout,
    name: String,
    info: UniformInfo,
) -> Result<(), ShaderError> {
    match layout.uniforms.get(&name) {
        Some(existing) if *existing != info => Err(link_error(format!(
            "uniform `{name}` is declared twice with different layouts"
        ))),
        Some(_) => Ok(()),
        None => {
            let _ = layout.uniforms.insert(name, info);
            Ok(())
        }
    }
}

fn unsupported(name: &str) -> ShaderError {
    link_error(format!("uniform `{name}` has an unsupported type"))
}

fn collect_globals(
    stage: &StageModule,
    layout: &mut ProgramLayout,
) -> Result<(), ShaderError> {
    let module = &stage.module;
    let usage = stage.info.get_entry_point(stage.entry);

    for (handle, global) in module.global_variables.iter() {
        if usage[handle].is_empty() {
            continue;
        }
        let Some(rb) = global.binding.as_ref() else {
            continue;
        };
        let (group, binding) = (rb.group, rb.binding);
        let name = global.name.clone().unwrap_or_default();
        let inner = &module.types[global.ty].inner;

        match global.space {
            AddressSpace::Uniform => {
                let size = inner.size(module.to_ctx()).next_multiple_of(16);
                add_binding(
                    layout,
                    ResourceBinding {
                        group,
                        binding,
                        kind: BindingKind::UniformBuffer { size },
                        name: name.clone(),
                    },
                )?;
                if let TypeInner::Struct { members, .. } = inner {
                    for member in members {
                        let slot = UniformSlot::Block {
                            group,
                            binding,
                            offset: member.offset,
                        };
                        block_uniform(
                            layout,
                            module,
                            member.name.clone().unwrap_or_default(),
                            member.ty,
                            slot,
                        )?;
                    }
                } else {
                    let slot = UniformSlot::Block {
                        group,
                        binding,
                        offset: 0,
                    };
                    block_uniform(layout, module, name, global.ty, slot)?;
                }
            }
            AddressSpace::Handle => {
                let (ty, kind) = match *inner {
                    TypeInner::Image {
                        dim: ImageDimension::D2,
                        arrayed: false,
                        class:
                            ImageClass::Sampled {
                                kind: ScalarKind::Float,
                                multi: false,
                            },
                    } => (UniformType::Texture, BindingKind::Texture),
                    TypeInner::Sampler { comparison: false } => {
                        (UniformType::Sampler, BindingKind::Sampler)
                    }
                    _ => return Err(unsupported(&name)),
                };
                add_binding(
                    layout,
                    ResourceBinding {
                        group,
                        binding,
                        kind,
                        name: name.clone(),
                    },
                )?;
                let slot = UniformSlot::Resource { group, binding };
                add_uniform(
                    layout,
                    name,
                    UniformInfo {
                        ty,
                        array: None,
                        slot,
                    },
                )?;
            }
            _ => {
                return Err(link_error(format!(
                    "global `{name}` uses an address space the engine cannot \
                     bind ({:?})",
                    global.space
                )));
            }
        }
    }
    Ok(())
}
