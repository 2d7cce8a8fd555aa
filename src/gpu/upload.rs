//! Buffer and bind group creation, and the registry mapping [`ResourceId`]s
//! to the wgpu objects behind them.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use anyhow::bail;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::material::{BakedVariant, MaterialVariant},
    engine::ResourceId,
    gpu::{
        pipeline::{self, DrawPass},
        texture::{self, GpuTexture},
    },
};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl ModelVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_colour: [f32; 4],
    pub back_face_colour: [f32; 4],
    pub params: [f32; 4],
}

impl MaterialUniform {
    pub fn of(variant: &MaterialVariant) -> Self {
        let mut uniform = Self {
            base_colour: [1.0; 4],
            back_face_colour: [0.0, 0.0, 0.0, 1.0],
            params: [1.0, 0.0, 0.0, 0.0],
        };
        match variant {
            MaterialVariant::Native { base_colour } => uniform.base_colour = *base_colour,
            MaterialVariant::Baked(BakedVariant::WallVariant { back_face_colour }) => {
                let [r, g, b] = *back_face_colour;
                uniform.back_face_colour = [r, g, b, 1.0];
                uniform.params[1] = 1.0;
            }
            MaterialVariant::Particle { opacity } => uniform.params[0] = *opacity,
            MaterialVariant::Baked(BakedVariant::Standard) | MaterialVariant::Video => (),
        }
        uniform
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

pub struct GpuMaterial {
    pub bind_group: wgpu::BindGroup,
    pub uniform: wgpu::Buffer,
    pub pass: DrawPass,
}

/// A frame source copied into its texture before every draw.
#[cfg(target_arch = "wasm32")]
pub struct GpuVideo {
    pub texture: GpuTexture,
    pub element: web_sys::HtmlVideoElement,
}

pub enum GpuResource {
    Geometry(GpuMesh),
    Texture(GpuTexture),
    #[cfg(target_arch = "wasm32")]
    Video(GpuVideo),
    Material(GpuMaterial),
}

impl GpuResource {
    fn destroy(self) {
        match self {
            GpuResource::Geometry(mesh) => {
                mesh.vertex_buffer.destroy();
                mesh.index_buffer.destroy();
            }
            GpuResource::Texture(texture) => texture.texture.destroy(),
            #[cfg(target_arch = "wasm32")]
            GpuResource::Video(video) => video.texture.texture.destroy(),
            GpuResource::Material(material) => material.uniform.destroy(),
        }
    }
}

/// Owns every GPU object handed out as a [`ResourceId`].
#[derive(Default)]
pub struct Registry {
    next_id: Cell<u64>,
    resources: RefCell<HashMap<ResourceId, GpuResource>>,
}

impl Registry {
    pub fn allocate(&self) -> ResourceId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        ResourceId(id)
    }

    pub fn insert(&self, resource: GpuResource) -> ResourceId {
        let id = self.allocate();
        self.resources.borrow_mut().insert(id, resource);
        id
    }

    pub fn destroy(&self, id: ResourceId) -> anyhow::Result<()> {
        match self.resources.borrow_mut().remove(&id) {
            Some(resource) => {
                resource.destroy();
                Ok(())
            }
            None => bail!("Unknown resource {id}"),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.borrow().is_empty()
    }

    /// Destroys whatever is left, returning how many objects that were.
    pub fn clear(&self) -> usize {
        let leftovers: Vec<_> = self.resources.borrow_mut().drain().collect();
        let count = leftovers.len();
        for (_, resource) in leftovers {
            resource.destroy();
        }
        count
    }

    pub fn texture_view(&self, id: ResourceId) -> anyhow::Result<wgpu::TextureView> {
        match self.resources.borrow().get(&id) {
            Some(GpuResource::Texture(texture)) => Ok(texture.view.clone()),
            #[cfg(target_arch = "wasm32")]
            Some(GpuResource::Video(video)) => Ok(video.texture.view.clone()),
            Some(_) => bail!("Resource {id} is not a texture"),
            None => bail!("Unknown texture {id}"),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&HashMap<ResourceId, GpuResource>) -> R) -> R {
        f(&self.resources.borrow())
    }
}

/// The device side of resource creation. Cheap to clone: wgpu handles are
/// reference counted.
#[derive(Clone)]
pub struct Uploader {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub material_layout: wgpu::BindGroupLayout,
    pub white: GpuTexture,
    pub sampler: wgpu::Sampler,
}

impl Uploader {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            material_layout: pipeline::material_layout(device),
            white: GpuTexture::solid(device, queue, [255; 4], "white"),
            sampler: texture::material_sampler(device),
            device: device.clone(),
            queue: queue.clone(),
        }
    }

    /// An uploader on the default adapter, without a surface to present to.
    #[cfg(feature = "integration-tests")]
    pub async fn headless() -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .context("No suitable graphics adapter")?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await?;
        Ok(Self::new(&device, &queue))
    }

    pub fn upload_mesh(&self, label: &str, vertices: &[ModelVertex], indices: &[u32]) -> GpuMesh {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertex Buffer")),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Index Buffer")),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
        }
    }

    /// A unit quad in the XY plane, facing +Z.
    pub fn upload_quad(&self, label: &str, width: f32, height: f32) -> GpuMesh {
        let (w, h) = (width / 2.0, height / 2.0);
        let normal = [0.0, 0.0, 1.0];
        let vertices = [
            ModelVertex {
                position: [-w, -h, 0.0],
                tex_coords: [0.0, 1.0],
                normal,
            },
            ModelVertex {
                position: [w, -h, 0.0],
                tex_coords: [1.0, 1.0],
                normal,
            },
            ModelVertex {
                position: [w, h, 0.0],
                tex_coords: [1.0, 0.0],
                normal,
            },
            ModelVertex {
                position: [-w, h, 0.0],
                tex_coords: [0.0, 0.0],
                normal,
            },
        ];
        self.upload_mesh(label, &vertices, &[0, 1, 2, 0, 2, 3])
    }

    /// Binds `view` (or plain white) with the uniform of `variant`.
    pub fn create_material(
        &self,
        label: &str,
        variant: &MaterialVariant,
        view: Option<&wgpu::TextureView>,
    ) -> GpuMaterial {
        let uniform = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Material Buffer")),
                contents: bytemuck::cast_slice(&[MaterialUniform::of(variant)]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view.unwrap_or(&self.white.view)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
            label: Some(label),
        });
        GpuMaterial {
            bind_group,
            uniform,
            pass: DrawPass::of(variant),
        }
    }
}
