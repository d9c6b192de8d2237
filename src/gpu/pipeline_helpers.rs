//! Shared wgpu boilerplate for full-screen pass pipelines.

/// Stages every reflected binding is visible to.
const PASS_STAGES: wgpu::ShaderStages = wgpu::ShaderStages::VERTEX_FRAGMENT;

/// Filterable float 2D texture binding.
pub fn texture_2d(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: PASS_STAGES,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Filtering sampler binding.
pub fn filtering_sampler(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: PASS_STAGES,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Uniform buffer binding of at least `size` bytes.
pub fn uniform_buffer(binding: u32, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: PASS_STAGES,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}

/// Byte stride of one full-screen quad vertex (`vec2<f32>`).
pub const QUAD_STRIDE: wgpu::BufferAddress = 8;

/// Triangle-strip corners covering clip space.
pub const QUAD_VERTICES: [f32; 8] =
    [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Descriptor inputs for [`create_pass_pipeline`].
pub struct PassPipelineDesc<'a> {
    /// Debug label prefix.
    pub label: &'a str,
    /// Module holding the vertex entry point.
    pub vertex: &'a wgpu::ShaderModule,
    /// Vertex entry point name.
    pub vertex_entry: &'a str,
    /// Module holding the fragment entry point.
    pub fragment: &'a wgpu::ShaderModule,
    /// Fragment entry point name.
    pub fragment_entry: &'a str,
    /// Shader location of the quad position attribute, if consumed.
    pub quad_location: Option<u32>,
    /// Color attachment format.
    pub color_format: wgpu::TextureFormat,
    /// Depth attachment format, if the pass renders with depth.
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Bind group layouts, indexed by group.
    pub bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
}

/// Create a full-screen triangle-strip pipeline with a single color target,
/// no blending, and an always-passing depth test when depth is attached.
pub fn create_pass_pipeline(
    device: &wgpu::Device,
    desc: &PassPipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    let label = desc.label;
    let pipeline_layout =
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: desc.bind_group_layouts,
            push_constant_ranges: &[],
        });

    let quad_attributes = desc.quad_location.map(|shader_location| {
        [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location,
        }]
    });
    let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> = quad_attributes
        .iter()
        .map(|attributes| wgpu::VertexBufferLayout {
            array_stride: QUAD_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{label} Pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: desc.vertex,
            entry_point: Some(desc.vertex_entry),
            buffers: &vertex_buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.fragment,
            entry_point: Some(desc.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: desc.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// ClampToEdge + Linear sampler (color attachments).
pub fn linear_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// ClampToEdge + trilinear sampler for uploaded images with a mip chain.
pub fn mipmap_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// ClampToEdge + Nearest sampler (depth attachments).
pub fn nearest_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
