use crate::{
    data_structures::{
        instance::InstanceRaw,
        material::{BakedVariant, MaterialVariant},
    },
    gpu::{texture::GpuTexture, upload::ModelVertex},
};

/// Which pipeline a material is drawn with. Passes are drawn in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPass {
    Opaque,
    DoubleSided,
    Transparent,
}

impl DrawPass {
    pub const ALL: [DrawPass; 3] = [DrawPass::Opaque, DrawPass::DoubleSided, DrawPass::Transparent];

    pub fn of(variant: &MaterialVariant) -> Self {
        match variant {
            MaterialVariant::Baked(BakedVariant::WallVariant { .. }) => DrawPass::DoubleSided,
            MaterialVariant::Particle { .. } => DrawPass::Transparent,
            _ => DrawPass::Opaque,
        }
    }
}

pub struct Pipelines {
    pub opaque: wgpu::RenderPipeline,
    pub double_sided: wgpu::RenderPipeline,
    pub transparent: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn get(&self, pass: DrawPass) -> &wgpu::RenderPipeline {
        match pass {
            DrawPass::Opaque => &self.opaque,
            DrawPass::DoubleSided => &self.double_sided,
            DrawPass::Transparent => &self.transparent,
        }
    }
}

/// Texture, sampler and material uniform.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

pub fn camera_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    })
}

pub fn mk_unlit_pipelines(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    material_layout: &wgpu::BindGroupLayout,
    camera_layout: &wgpu::BindGroupLayout,
) -> Pipelines {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Unlit Pipeline Layout"),
        bind_group_layouts: &[Some(material_layout), Some(camera_layout)],
        immediate_size: 0,
    });
    let shader = || wgpu::ShaderModuleDescriptor {
        label: Some("Unlit Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("unlit.wgsl").into()),
    };
    let vertex_layouts = [ModelVertex::desc(), InstanceRaw::desc()];
    let replace = Some(wgpu::BlendState::REPLACE);

    Pipelines {
        opaque: mk_render_pipeline(
            device,
            &layout,
            config.format,
            replace,
            Some(wgpu::Face::Back),
            true,
            &vertex_layouts,
            shader(),
        ),
        double_sided: mk_render_pipeline(
            device,
            &layout,
            config.format,
            replace,
            None,
            true,
            &vertex_layouts,
            shader(),
        ),
        transparent: mk_render_pipeline(
            device,
            &layout,
            config.format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            None,
            false,
            &vertex_layouts,
            shader(),
        ),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    cull_mode: Option<wgpu::Face>,
    depth_write_enabled: bool,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Unlit Render Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: GpuTexture::DEPTH_FORMAT,
            depth_write_enabled: Some(depth_write_enabled),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
