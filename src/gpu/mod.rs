//! The `wgpu` implementation of [`Engine`].
//!
//! A [`WgpuEngine`] draws into one winit window. Every geometry, material and
//! texture it hands out is owned by its [`Registry`](upload::Registry) until
//! released; the surface, device and pipelines live in a [`GpuContext`] that
//! exists between `create_renderer` and `release_renderer`.

use std::{
    cell::{Cell, RefCell},
    sync::Arc,
};

use anyhow::{Context as _, bail};
use futures::{FutureExt, future::LocalBoxFuture};
use instant::Duration;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::CameraState,
    data_structures::{
        instance::{Instance, InstanceRaw},
        material::{Material, MaterialVariant},
        scene_graph::SceneGraph,
    },
    engine::{Engine, FrameHandle, Geometry, LoadedResource, RendererHandle, ResourceId, Texture},
    manifest::ResourceKind,
    resources::{self, fetch},
};

use context::GpuContext;
use pipeline::DrawPass;
use texture::GpuTexture;
use upload::{GpuResource, Registry, Uploader};

pub mod context;
#[cfg(target_arch = "wasm32")]
pub mod media;
pub mod pipeline;
pub mod texture;
pub mod upload;

/// Whether releasing the renderer hides what it drew into. The browser canvas
/// makes room for the application; a native window stays visible so that it
/// keeps receiving the key that returns to the room.
pub const HIDES_SURFACE_ON_RELEASE: bool = cfg!(target_arch = "wasm32");

/// Frame pacing used natively while nothing drives redraws.
#[cfg(not(target_arch = "wasm32"))]
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct Draw {
    pass: DrawPass,
    geometry: ResourceId,
    material: ResourceId,
}

pub struct WgpuEngine {
    gpu: RefCell<Option<GpuContext>>,
    renderer: Cell<Option<ResourceId>>,
    registry: Registry,
    /// Resource creation without a window.
    headless: Option<Uploader>,
    next_frame: Cell<u64>,
    pending_frame: Cell<Option<FrameHandle>>,
    clear_colour: wgpu::Color,
}

impl WgpuEngine {
    pub fn new(clear_colour: [f64; 4]) -> Self {
        let [r, g, b, a] = clear_colour;
        Self {
            gpu: RefCell::new(None),
            renderer: Cell::new(None),
            registry: Registry::default(),
            headless: None,
            next_frame: Cell::new(0),
            pending_frame: Cell::new(None),
            clear_colour: wgpu::Color { r, g, b, a },
        }
    }

    /// An engine that loads and releases resources but never renders.
    #[cfg(feature = "integration-tests")]
    pub async fn headless() -> anyhow::Result<Self> {
        let mut engine = Self::new([0.0, 0.0, 0.0, 1.0]);
        engine.headless = Some(Uploader::headless().await?);
        Ok(engine)
    }

    pub fn resize(&self, width: u32, height: u32) {
        if let Some(gpu) = self.gpu.borrow_mut().as_mut() {
            gpu.resize(width, height);
        }
    }

    /// Consumes the pending frame request, if there is one.
    pub fn take_frame(&self) -> Option<FrameHandle> {
        self.pending_frame.take()
    }

    pub fn live_resources(&self) -> usize {
        self.registry.len()
    }

    fn uploader(&self) -> anyhow::Result<Uploader> {
        self.gpu
            .borrow()
            .as_ref()
            .map(|gpu| gpu.uploader.clone())
            .or_else(|| self.headless.clone())
            .context("No renderer has been created")
    }

    async fn load_texture(
        &self,
        uploader: &Uploader,
        path: &str,
        panorama: bool,
    ) -> anyhow::Result<Texture> {
        let data = fetch::load_binary(path).await?;
        let ext = fetch::extension(path);
        let texture = if panorama && ext.as_deref() == Some("hdr") {
            GpuTexture::from_hdr(&uploader.device, &uploader.queue, &data, path)?
        } else {
            GpuTexture::from_bytes(&uploader.device, &uploader.queue, &data, path, ext.as_deref())?
        };
        let id = self.registry.insert(GpuResource::Texture(texture));
        Ok(Texture::new(id, path))
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn load_video(&self, _uploader: &Uploader, path: &str) -> anyhow::Result<Texture> {
        bail!("Video textures need a browser, {path} is skipped")
    }

    #[cfg(target_arch = "wasm32")]
    fn load_video(&self, uploader: &Uploader, path: &str) -> anyhow::Result<Texture> {
        use std::rc::Rc;

        let video = media::VideoElement::new(path)?;
        let texture = GpuTexture::video_target(&uploader.device, 1920, 1080, path);
        let id = self.registry.insert(GpuResource::Video(upload::GpuVideo {
            texture,
            element: video.element().clone(),
        }));
        Ok(Texture::video(id, path, Rc::new(video)))
    }

    /// Copies the current frame of every playing video into its texture.
    #[cfg(target_arch = "wasm32")]
    fn upload_video_frames(&self, queue: &wgpu::Queue) {
        self.registry.with(|resources| {
            for resource in resources.values() {
                let GpuResource::Video(video) = resource else {
                    continue;
                };
                // HAVE_CURRENT_DATA
                if video.element.ready_state() < 2 {
                    continue;
                }
                let size = video.texture.texture.size();
                let width = video.element.video_width().min(size.width);
                let height = video.element.video_height().min(size.height);
                if width == 0 || height == 0 {
                    continue;
                }
                queue.copy_external_image_to_texture(
                    &wgpu::CopyExternalImageSourceInfo {
                        source: wgpu::ExternalImageSource::HTMLVideoElement(video.element.clone()),
                        origin: wgpu::Origin2d::ZERO,
                        flip_y: false,
                    },
                    wgpu::CopyExternalImageDestInfo {
                        texture: &video.texture.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                        color_space: wgpu::PredefinedColorSpace::Srgb,
                        premultiplied_alpha: false,
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        });
    }

    fn set_surface_visible(window: &Window, visible: bool) {
        #[cfg(not(target_arch = "wasm32"))]
        window.set_visible(visible);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;

            if let Some(canvas) = window.canvas() {
                let display = if visible { "block" } else { "none" };
                if let Err(e) = canvas.style().set_property("display", display) {
                    log::warn!("Unable to toggle canvas: {e:?}");
                }
            }
        }
    }
}

impl Engine for WgpuEngine {
    type Container = Arc<Window>;

    fn create_renderer(
        &self,
        container: Self::Container,
    ) -> LocalBoxFuture<'_, anyhow::Result<RendererHandle>> {
        async move {
            if self.gpu.borrow().is_some() {
                bail!("A renderer is already active");
            }
            let gpu = GpuContext::new(container).await?;
            Self::set_surface_visible(&gpu.window, true);
            let id = self.registry.allocate();
            *self.gpu.borrow_mut() = Some(gpu);
            self.renderer.set(Some(id));
            log::info!("Renderer {id} created");
            Ok(RendererHandle { id })
        }
        .boxed_local()
    }

    fn load<'a>(
        &'a self,
        kind: ResourceKind,
        path: &'a str,
    ) -> LocalBoxFuture<'a, anyhow::Result<LoadedResource>> {
        async move {
            let uploader = self.uploader()?;
            let resource = match kind {
                ResourceKind::Mesh => LoadedResource::Mesh(
                    resources::gltf::load_scene(path, &uploader, &self.registry).await?,
                ),
                ResourceKind::Texture => {
                    LoadedResource::Texture(self.load_texture(&uploader, path, false).await?)
                }
                ResourceKind::Panorama => {
                    LoadedResource::Panorama(self.load_texture(&uploader, path, true).await?)
                }
                ResourceKind::Video => LoadedResource::Video(self.load_video(&uploader, path)?),
            };
            Ok(resource)
        }
        .boxed_local()
    }

    fn create_material(
        &self,
        label: &str,
        variant: &MaterialVariant,
        textures: &[Texture],
    ) -> anyhow::Result<Material> {
        let uploader = self.uploader()?;
        let view = match textures.first() {
            Some(texture) => Some(self.registry.texture_view(texture.id)?),
            None => None,
        };
        let material = uploader.create_material(label, variant, view.as_ref());
        let id = self.registry.insert(GpuResource::Material(material));
        Ok(Material {
            id,
            label: label.to_string(),
            variant: variant.clone(),
            textures: textures.to_vec(),
        })
    }

    fn create_quad(&self, label: &str, width: f32, height: f32) -> anyhow::Result<Geometry> {
        let uploader = self.uploader()?;
        let mesh = uploader.upload_quad(label, width, height);
        let id = self.registry.insert(GpuResource::Geometry(mesh));
        Ok(Geometry {
            id,
            label: label.to_string(),
        })
    }

    fn render(
        &self,
        renderer: &RendererHandle,
        scene: &SceneGraph,
        camera: &CameraState,
    ) -> anyhow::Result<()> {
        if self.renderer.get() != Some(renderer.id) {
            bail!("Renderer {} is not active", renderer.id);
        }
        let gpu = self.gpu.borrow();
        let gpu = gpu.as_ref().context("No renderer has been created")?;

        gpu.write_camera(camera);
        #[cfg(target_arch = "wasm32")]
        self.upload_video_frames(&gpu.queue);

        let mut draws = Vec::new();
        let mut instances: Vec<InstanceRaw> = Vec::new();
        scene.root.visit_world(&Instance::new(), &mut |node, world| {
            let Some(mesh) = &node.mesh else {
                return;
            };
            // Extra materials are blended into the first one
            if let Some(material) = mesh.materials.first() {
                draws.push(Draw {
                    pass: DrawPass::of(&material.variant),
                    geometry: mesh.geometry.id,
                    material: material.id,
                });
                instances.push(world.to_raw());
            }
        });

        let output = match gpu.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            // Reconfigure the surface if it's lost or outdated
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return Ok(());
            }
            e => bail!("Unable to acquire a frame: {e:?}"),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let instance_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Instance Buffer"),
                contents: bytemuck::cast_slice(&instances),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.registry.with(|resources| {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            if draws.is_empty() {
                return;
            }
            render_pass.set_bind_group(1, &gpu.camera_bind_group, &[]);
            render_pass.set_vertex_buffer(1, instance_buffer.slice(..));

            for pass in DrawPass::ALL {
                render_pass.set_pipeline(gpu.pipelines.get(pass));
                for (i, draw) in draws.iter().enumerate().filter(|(_, draw)| draw.pass == pass) {
                    let (
                        Some(GpuResource::Geometry(mesh)),
                        Some(GpuResource::Material(material)),
                    ) = (resources.get(&draw.geometry), resources.get(&draw.material))
                    else {
                        log::trace!("Skipping draw of released {}", draw.geometry);
                        continue;
                    };
                    let i = i as u32;
                    render_pass.set_bind_group(0, &material.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    render_pass
                        .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.num_elements, 0, i..i + 1);
                }
            }
        });

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn release(&self, id: ResourceId) -> anyhow::Result<()> {
        self.registry.destroy(id)
    }

    fn release_renderer(&self, renderer: RendererHandle) -> anyhow::Result<()> {
        if self.renderer.get() != Some(renderer.id) {
            bail!("Renderer {} is not active", renderer.id);
        }
        self.renderer.set(None);
        self.pending_frame.set(None);
        let gpu = self
            .gpu
            .borrow_mut()
            .take()
            .context("No renderer has been created")?;

        let leftovers = self.registry.clear();
        if leftovers > 0 {
            log::warn!("{leftovers} GPU resources outlived renderer {}", renderer.id);
        }
        if HIDES_SURFACE_ON_RELEASE {
            Self::set_surface_visible(&gpu.window, false);
        }
        gpu.device.destroy();
        log::info!("Renderer {} released", renderer.id);
        Ok(())
    }

    fn request_frame(&self) -> FrameHandle {
        let handle = FrameHandle(self.next_frame.get() + 1);
        self.next_frame.set(handle.0);
        self.pending_frame.set(Some(handle));
        if let Some(gpu) = self.gpu.borrow().as_ref() {
            gpu.window.request_redraw();
        }
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if self.pending_frame.get() == Some(handle) {
            self.pending_frame.set(None);
        }
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::time::sleep(FRAME_INTERVAL).boxed_local()
        }

        #[cfg(target_arch = "wasm32")]
        {
            let promise = js_sys::Promise::new(&mut |resolve, _reject| {
                if let Some(window) = web_sys::window() {
                    if let Err(e) = window.request_animation_frame(&resolve) {
                        log::warn!("Unable to request an animation frame: {e:?}");
                    }
                }
            });
            async move {
                let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
            }
            .boxed_local()
        }
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::time::sleep(duration).boxed_local()
        }

        #[cfg(target_arch = "wasm32")]
        {
            let millis = duration.as_millis().min(i32::MAX as u128) as i32;
            let promise = js_sys::Promise::new(&mut |resolve, _reject| {
                if let Some(window) = web_sys::window() {
                    if let Err(e) = window
                        .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                    {
                        log::warn!("Unable to set a timeout: {e:?}");
                    }
                }
            });
            async move {
                let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
            }
            .boxed_local()
        }
    }
}
