//! Uniform values and their CPU-side staging.
//!
//! [`UniformStorage`] mirrors every uniform buffer of a program as bytes laid
//! out the way WGSL expects (16-byte matrix columns, array strides from
//! reflection). Values are converted by the *declared* type, so a shader's
//! `i32` accepts a float and a padded `f32` array accepts a plain slice.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use super::reflect::{
    BindingKind, ProgramLayout, ScalarType, UniformInfo, UniformSlot,
    UniformType,
};
use crate::gpu::texture::TextureHandle;

/// A value that can be assigned to a uniform by name.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// A single float.
    Float(f32),
    /// A single integer (also used for booleans).
    Int(i32),
    /// Two floats.
    Vec2([f32; 2]),
    /// Three floats.
    Vec3([f32; 3]),
    /// Four floats.
    Vec4([f32; 4]),
    /// Column-major 3x3 matrix.
    Mat3([f32; 9]),
    /// Column-major 4x4 matrix.
    Mat4([f32; 16]),
    /// A float sequence, typically for array uniforms.
    FloatArray(Vec<f32>),
    /// A texture to sample.
    Texture(TextureHandle),
}

/// Uniform name to value.
pub type UniformMap = FxHashMap<String, UniformValue>;

/// Build a [`UniformMap`] from `(name, value)` pairs.
pub fn uniform_map<K, V>(
    entries: impl IntoIterator<Item = (K, V)>,
) -> UniformMap
where
    K: Into<String>,
    V: Into<UniformValue>,
{
    entries
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}

impl UniformValue {
    /// The value as a float sequence, if it is numeric.
    #[must_use]
    pub fn as_floats(&self) -> Option<Cow<'_, [f32]>> {
        match self {
            Self::Float(v) => Some(Cow::Borrowed(std::slice::from_ref(v))),
            Self::Int(v) => Some(Cow::Owned(vec![*v as f32])),
            Self::Vec2(v) => Some(Cow::Borrowed(v)),
            Self::Vec3(v) => Some(Cow::Borrowed(v)),
            Self::Vec4(v) => Some(Cow::Borrowed(v)),
            Self::Mat3(v) => Some(Cow::Borrowed(v)),
            Self::Mat4(v) => Some(Cow::Borrowed(v)),
            Self::FloatArray(v) => Some(Cow::Borrowed(v)),
            Self::Texture(_) => None,
        }
    }

    /// The texture handle, if this is a texture value.
    #[must_use]
    pub fn as_texture(&self) -> Option<&TextureHandle> {
        match self {
            Self::Texture(handle) => Some(handle),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Vec4(_) => "vec4",
            Self::Mat3(_) => "mat3",
            Self::Mat4(_) => "mat4",
            Self::FloatArray(_) => "float array",
            Self::Texture(_) => "texture",
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i32)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        Self::Int(i32::from(v))
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(v)
    }
}

impl From<[f32; 9]> for UniformValue {
    fn from(v: [f32; 9]) -> Self {
        Self::Mat3(v)
    }
}

impl From<[f32; 16]> for UniformValue {
    fn from(v: [f32; 16]) -> Self {
        Self::Mat4(v)
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        Self::FloatArray(v)
    }
}

impl From<&[f32]> for UniformValue {
    fn from(v: &[f32]) -> Self {
        Self::FloatArray(v.to_vec())
    }
}

impl From<glam::Vec2> for UniformValue {
    fn from(v: glam::Vec2) -> Self {
        Self::Vec2(v.to_array())
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(v: glam::Vec3) -> Self {
        Self::Vec3(v.to_array())
    }
}

impl From<glam::Vec4> for UniformValue {
    fn from(v: glam::Vec4) -> Self {
        Self::Vec4(v.to_array())
    }
}

impl From<glam::Mat3> for UniformValue {
    fn from(v: glam::Mat3) -> Self {
        Self::Mat3(v.to_cols_array())
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(v: glam::Mat4) -> Self {
        Self::Mat4(v.to_cols_array())
    }
}

impl From<TextureHandle> for UniformValue {
    fn from(v: TextureHandle) -> Self {
        Self::Texture(v)
    }
}

impl From<&TextureHandle> for UniformValue {
    fn from(v: &TextureHandle) -> Self {
        Self::Texture(v.clone())
    }
}

/// Byte contents of one uniform buffer.
#[derive(Debug, Clone)]
struct Block {
    group: u32,
    binding: u32,
    bytes: Vec<u8>,
    dirty: bool,
}

/// CPU-side copy of a program's uniform values.
#[derive(Debug, Clone, Default)]
pub struct UniformStorage {
    uniforms: FxHashMap<String, UniformInfo>,
    blocks: Vec<Block>,
    textures: FxHashMap<String, TextureHandle>,
}

impl UniformStorage {
    /// Zero-initialized storage for every uniform buffer in `layout`.
    #[must_use]
    pub fn new(layout: &ProgramLayout) -> Self {
        let blocks = layout
            .bindings()
            .iter()
            .filter_map(|b| match b.kind {
                BindingKind::UniformBuffer { size } => Some(Block {
                    group: b.group,
                    binding: b.binding,
                    bytes: vec![0; size as usize],
                    dirty: false,
                }),
                BindingKind::Texture | BindingKind::Sampler => None,
            })
            .collect();
        Self {
            uniforms: layout.uniforms().clone(),
            blocks,
            textures: FxHashMap::default(),
        }
    }

    /// Assign `value` to the uniform `name`. Returns `false` (and changes
    /// nothing) when the name is unknown, the uniform is opaque, or the
    /// value's length differs from the declared type. Arrays take any
    /// whole number of elements and are truncated to the declared length.
    pub fn set(&mut self, name: &str, value: &UniformValue) -> bool {
        let Some(info) = self.uniforms.get(name).copied() else {
            log::trace!("ignoring unknown uniform `{name}`");
            return false;
        };
        let applied = match (info.ty, info.slot) {
            (UniformType::Texture, _) => match value {
                UniformValue::Texture(handle) => {
                    let _ = self
                        .textures
                        .insert(name.to_owned(), handle.clone());
                    true
                }
                _ => false,
            },
            (UniformType::Sampler, _) | (_, UniformSlot::Resource { .. }) => {
                false
            }
            (
                ty,
                UniformSlot::Block {
                    group,
                    binding,
                    offset,
                },
            ) => self.block_mut(group, binding).is_some_and(|block| {
                let offset = offset as usize;
                let written =
                    write_value(&mut block.bytes, offset, ty, info, value);
                block.dirty |= written;
                written
            }),
        };
        if !applied {
            log::trace!(
                "ignoring {} value for uniform `{name}` declared as {:?}",
                value.kind(),
                info.ty
            );
        }
        applied
    }

    /// Current value of the uniform `name`, decoded by its declared type.
    /// Texture uniforms report the texture bound this frame; samplers report
    /// nothing.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        let info = self.uniforms.get(name)?;
        match info.slot {
            UniformSlot::Resource { .. } => self
                .textures
                .get(name)
                .cloned()
                .map(UniformValue::Texture),
            UniformSlot::Block {
                group,
                binding,
                offset,
            } => {
                let block = self
                    .blocks
                    .iter()
                    .find(|b| b.group == group && b.binding == binding)?;
                read_value(&block.bytes, offset as usize, info)
            }
        }
    }

    /// Texture currently bound to the texture uniform `name`.
    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&TextureHandle> {
        self.textures.get(name)
    }

    /// Forget all texture bindings; unbound textures sample a placeholder.
    pub fn clear_textures(&mut self) {
        self.textures.clear();
    }

    /// Whether any uniform buffer has changed since the last flush.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.blocks.iter().any(|b| b.dirty)
    }

    /// Hand every changed buffer to `write` as `(group, binding, bytes)` and
    /// mark it clean.
    pub(crate) fn flush(&mut self, mut write: impl FnMut(u32, u32, &[u8])) {
        for block in self.blocks.iter_mut().filter(|b| b.dirty) {
            write(block.group, block.binding, &block.bytes);
            block.dirty = false;
        }
    }

    fn block_mut(&mut self, group: u32, binding: u32) -> Option<&mut Block> {
        self.blocks
            .iter_mut()
            .find(|b| b.group == group && b.binding == binding)
    }
}

fn put<T: bytemuck::Pod>(bytes: &mut [u8], offset: usize, value: T) {
    let src = bytemuck::bytes_of(&value);
    if let Some(dst) = bytes.get_mut(offset..offset + src.len()) {
        dst.copy_from_slice(src);
    }
}

fn take<T: bytemuck::Pod>(bytes: &[u8], offset: usize) -> Option<T> {
    bytes
        .get(offset..offset + size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
}

/// Byte offset of scalar `index` within one element of type `ty`.
///
/// Matrix columns are `vec2` (8-byte stride) or `vec3`/`vec4` (16-byte
/// stride).
fn component_offset(ty: UniformType, index: usize) -> usize {
    match ty.matrix_shape() {
        Some((_, rows)) => {
            let column_stride = if rows == 2 { 8 } else { 16 };
            (index / rows) * column_stride + (index % rows) * 4
        }
        None => index * 4,
    }
}

fn write_element(
    bytes: &mut [u8],
    offset: usize,
    ty: UniformType,
    values: &[f32],
) {
    let Some(scalar) = ty.scalar() else {
        return;
    };
    for (i, &v) in values.iter().take(ty.components()).enumerate() {
        let at = offset + component_offset(ty, i);
        match scalar {
            ScalarType::F32 => put(bytes, at, v),
            ScalarType::I32 => put(bytes, at, v as i32),
            ScalarType::U32 => put(bytes, at, v as u32),
        }
    }
}

fn write_value(
    bytes: &mut [u8],
    offset: usize,
    ty: UniformType,
    info: UniformInfo,
    value: &UniformValue,
) -> bool {
    let components = ty.components();
    if components == 0 || value.as_texture().is_some() {
        return false;
    }

    if let Some(array) = info.array {
        let Some(values) = value.as_floats() else {
            return false;
        };
        let count = (values.len() / components).min(array.len as usize);
        if count == 0 {
            return false;
        }
        let elements = values.chunks_exact(components).take(count);
        for (i, element) in elements.enumerate() {
            let at = offset + i * array.stride as usize;
            write_element(bytes, at, ty, element);
        }
        return true;
    }

    match (ty, value) {
        (UniformType::Int, UniformValue::Int(v)) => put(bytes, offset, *v),
        (UniformType::Uint, UniformValue::Int(v)) => {
            put(bytes, offset, *v as u32);
        }
        _ => {
            let Some(values) = value.as_floats() else {
                return false;
            };
            if values.len() != components {
                return false;
            }
            write_element(bytes, offset, ty, &values);
        }
    }
    true
}

fn read_element(
    bytes: &[u8],
    offset: usize,
    ty: UniformType,
) -> Option<Vec<f32>> {
    let scalar = ty.scalar()?;
    (0..ty.components())
        .map(|i| {
            let at = offset + component_offset(ty, i);
            match scalar {
                ScalarType::F32 => take::<f32>(bytes, at),
                ScalarType::I32 => take::<i32>(bytes, at).map(|v| v as f32),
                ScalarType::U32 => take::<u32>(bytes, at).map(|v| v as f32),
            }
        })
        .collect()
}

/// Decode a stored value. Integer and unsigned vectors, `mat2x2` and
/// non-square matrices come back as a float sequence.
fn read_value(
    bytes: &[u8],
    offset: usize,
    info: &UniformInfo,
) -> Option<UniformValue> {
    let ty = info.ty;
    if let Some(array) = info.array {
        let stride = array.stride as usize;
        let mut values =
            Vec::with_capacity(array.len as usize * ty.components());
        for i in 0..array.len as usize {
            values.extend(read_element(bytes, offset + i * stride, ty)?);
        }
        return Some(UniformValue::FloatArray(values));
    }
    match ty {
        UniformType::Int => take::<i32>(bytes, offset).map(UniformValue::Int),
        UniformType::Uint => {
            take::<u32>(bytes, offset).map(|v| UniformValue::Int(v as i32))
        }
        UniformType::Float => {
            take::<f32>(bytes, offset).map(UniformValue::Float)
        }
        _ => {
            let values = read_element(bytes, offset, ty)?;
            Some(match ty {
                UniformType::Vec2 => UniformValue::Vec2(to_array(&values)?),
                UniformType::Vec3 => UniformValue::Vec3(to_array(&values)?),
                UniformType::Vec4 => UniformValue::Vec4(to_array(&values)?),
                UniformType::Mat3 => UniformValue::Mat3(to_array(&values)?),
                UniformType::Mat4 => UniformValue::Mat4(to_array(&values)?),
                _ => UniformValue::FloatArray(values),
            })
        }
    }
}

fn to_array<const N: usize>(values: &[f32]) -> Option<[f32; N]> {
    values.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::reflect::{compile_stage, link};
    use crate::shader::{Stage, FULLSCREEN_VERTEX};

    const FRAGMENT: &str = r"
struct F32x16 { @size(16) v: f32 };
struct Params {
    u_weights: array<F32x16, 5>,
    u_matrix: mat3x3<f32>,
    u_tint: vec4<f32>,
    u_offset: vec2<f32>,
    u_strength: f32,
    u_radius: i32,
    u_count: u32,
};
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) v_uv: vec2<f32>) -> @location(0) vec4<f32> {
    var sum = 0.0;
    for (var i = 0; i <= params.u_radius; i++) {
        sum += params.u_weights[i].v;
    }
    let p = params.u_matrix * vec3<f32>(v_uv + params.u_offset, 1.0);
    let scale = sum * params.u_strength * f32(params.u_count);
    return params.u_tint * scale + vec4<f32>(p, 0.0);
}
";

    const WIDE: &str = r"
struct Light { color: vec3<f32>, power: f32 };
struct Wide {
    u_rot: mat2x2<f32>,
    u_affine: mat3x2<f32>,
    u_size: vec2<u32>,
    u_pad: vec3<u32>,
    u_light: Light,
};
@group(0) @binding(0) var<uniform> wide: Wide;

@fragment
fn fs_main(@location(0) v_uv: vec2<f32>) -> @location(0) vec4<f32> {
    let uv = wide.u_rot * v_uv + wide.u_affine * vec3<f32>(v_uv, 1.0);
    let size = vec2<f32>(wide.u_size) + vec3<f32>(wide.u_pad).xy;
    return vec4<f32>(wide.u_light.color * wide.u_light.power, 1.0)
        + vec4<f32>(uv / size, 0.0, 0.0);
}
";

    fn storage_for(fragment: &str) -> UniformStorage {
        let vertex = compile_stage(Stage::Vertex, FULLSCREEN_VERTEX).unwrap();
        let fragment = compile_stage(Stage::Fragment, fragment).unwrap();
        UniformStorage::new(&link(&vertex, &fragment).unwrap())
    }

    fn storage() -> UniformStorage {
        storage_for(FRAGMENT)
    }

    fn flushed(s: &mut UniformStorage) -> Vec<u8> {
        let mut bytes = Vec::new();
        s.flush(|_, _, data| bytes = data.to_vec());
        bytes
    }

    #[test]
    fn scalars_and_vectors_round_trip() {
        let mut s = storage();
        assert!(s.set("u_strength", &0.25_f32.into()));
        assert!(s.set("u_tint", &[1.0_f32, 0.5, 0.25, 1.0].into()));
        assert!(s.set("u_offset", &glam::Vec2::new(3.0, -2.0).into()));
        assert_eq!(s.get("u_strength"), Some(UniformValue::Float(0.25)));
        assert_eq!(
            s.get("u_tint"),
            Some(UniformValue::Vec4([1.0, 0.5, 0.25, 1.0]))
        );
        assert_eq!(s.get("u_offset"), Some(UniformValue::Vec2([3.0, -2.0])));
    }

    #[test]
    fn integers_accept_floats_and_bools() {
        let mut s = storage();
        assert!(s.set("u_radius", &UniformValue::Float(7.0)));
        assert_eq!(s.get("u_radius"), Some(UniformValue::Int(7)));
        assert!(s.set("u_count", &true.into()));
        assert_eq!(s.get("u_count"), Some(UniformValue::Int(1)));
        assert!(s.set("u_strength", &UniformValue::Int(2)));
        assert_eq!(s.get("u_strength"), Some(UniformValue::Float(2.0)));
    }

    #[test]
    fn padded_array_is_set_and_read_under_one_name() {
        let mut s = storage();
        let weights = vec![0.4_f32, 0.2, 0.1, 0.05, 0.05];
        assert!(s.set("u_weights", &weights.clone().into()));
        assert_eq!(
            s.get("u_weights"),
            Some(UniformValue::FloatArray(weights))
        );
    }

    #[test]
    fn arrays_are_truncated_or_partially_written() {
        let mut s = storage();
        assert!(s.set("u_weights", &vec![1.0_f32; 8].into()));
        assert_eq!(
            s.get("u_weights"),
            Some(UniformValue::FloatArray(vec![1.0; 5]))
        );

        assert!(s.set("u_weights", &vec![2.0_f32, 3.0].into()));
        assert_eq!(
            s.get("u_weights"),
            Some(UniformValue::FloatArray(vec![2.0, 3.0, 1.0, 1.0, 1.0]))
        );
    }

    #[test]
    fn mat3_columns_are_padded() {
        let mut s = storage();
        let m = glam::Mat3::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0,
        ]);
        assert!(s.set("u_matrix", &m.into()));
        assert_eq!(
            s.get("u_matrix"),
            Some(UniformValue::Mat3(m.to_cols_array()))
        );

        let bytes = flushed(&mut s);
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes[80..128]);
        assert_eq!(
            floats,
            [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]
        );
    }

    #[test]
    fn unknown_names_and_mismatched_values_are_ignored() {
        let mut s = storage();
        assert!(!s.set("u_missing", &1.0_f32.into()));
        assert!(!s.set("u_tint", &[1.0_f32, 2.0].into()));
        assert!(!s.set("u_matrix", &[1.0_f32, 2.0, 3.0, 4.0].into()));
        assert_eq!(s.get("u_tint"), Some(UniformValue::Vec4([0.0; 4])));
        assert_eq!(s.get("u_missing"), None);
        assert!(!s.is_dirty());
    }

    #[test]
    fn values_wider_than_the_declared_type_are_ignored() {
        let mut s = storage();
        assert!(!s.set("u_strength", &[1.0_f32, 2.0, 3.0, 4.0].into()));
        assert!(!s.set("u_strength", &vec![1.0_f32, 2.0].into()));
        assert!(!s.set("u_offset", &[1.0_f32, 2.0, 3.0].into()));
        assert!(!s.set("u_tint", &glam::Mat4::IDENTITY.into()));
        assert!(!s.set("u_radius", &[1.0_f32, 2.0].into()));
        assert_eq!(s.get("u_strength"), Some(UniformValue::Float(0.0)));
        assert_eq!(s.get("u_tint"), Some(UniformValue::Vec4([0.0; 4])));
        assert!(!s.is_dirty());
    }

    #[test]
    fn small_matrices_pack_two_component_columns_tightly() {
        let mut s = storage_for(WIDE);
        assert!(s.set("u_rot", &[1.0_f32, 2.0, 3.0, 4.0].into()));
        let affine = vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(s.set("u_affine", &affine.clone().into()));
        assert!(!s.set("u_affine", &vec![1.0_f32; 9].into()));
        assert_eq!(
            s.get("u_rot"),
            Some(UniformValue::FloatArray(vec![1.0, 2.0, 3.0, 4.0]))
        );
        assert_eq!(s.get("u_affine"), Some(UniformValue::FloatArray(affine)));

        let bytes = flushed(&mut s);
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes[0..40]);
        assert_eq!(
            floats,
            [1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn unsigned_vectors_store_u32_components() {
        let mut s = storage_for(WIDE);
        assert!(s.set("u_size", &[640.0_f32, 480.0].into()));
        assert!(s.set("u_pad", &[1.0_f32, 2.0, 3.0].into()));
        assert_eq!(
            s.get("u_size"),
            Some(UniformValue::FloatArray(vec![640.0, 480.0]))
        );

        let bytes = flushed(&mut s);
        let size: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes[40..48]);
        assert_eq!(size, [640, 480]);
        let pad: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes[48..60]);
        assert_eq!(pad, [1, 2, 3]);
    }

    #[test]
    fn nested_structs_are_reported_but_never_written() {
        let mut s = storage_for(WIDE);
        assert!(!s.set("u_light", &[1.0_f32, 1.0, 1.0, 1.0].into()));
        assert_eq!(s.get("u_light"), None);
        assert!(!s.is_dirty());
    }

    #[test]
    fn flush_reports_changed_blocks_once() {
        let mut s = storage();
        assert!(s.set("u_strength", &1.0_f32.into()));
        assert!(s.is_dirty());
        let mut flushed = Vec::new();
        s.flush(|group, binding, data| {
            flushed.push((group, binding, data.len()));
        });
        assert_eq!(flushed.len(), 1);
        assert_eq!((flushed[0].0, flushed[0].1), (0, 0));
        assert_eq!(flushed[0].2 % 16, 0);
        assert!(!s.is_dirty());
        s.flush(|_, _, _| panic!("nothing should be flushed"));
    }

    #[test]
    fn uniform_map_collects_mixed_values() {
        let map = uniform_map([
            ("u_strength", UniformValue::from(0.5_f32)),
            ("u_radius", 3.into()),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["u_radius"], UniformValue::Int(3));
    }
}
