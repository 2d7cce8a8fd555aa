//! The rendering engine as a capability.
//!
//! Everything the orchestrator needs from a renderer is expressed through the
//! [`Engine`] trait: create a renderer for a container, load a resource of a
//! given [`ResourceKind`], create materials and quads, draw a frame, release a
//! GPU handle and schedule animation frames. The crate ships a `wgpu`
//! implementation in [`crate::gpu`]; tests drive the orchestrator through an
//! in-memory one.
//!
//! All futures are `!Send`: the whole experience runs on one logical thread.

use std::{fmt, rc::Rc};

use futures::future::LocalBoxFuture;
use instant::Duration;

use crate::{
    camera::CameraState,
    data_structures::{
        material::{Material, MaterialVariant},
        scene_graph::{SceneGraph, SceneNode},
    },
    manifest::ResourceKind,
};

/// Identity of a GPU-backed resource. Allocated by the engine, unique per engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A vertex/index buffer pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub id: ResourceId,
    pub label: String,
}

/// The playback element behind a video texture.
pub trait MediaElement {
    fn play(&self) -> anyhow::Result<()>;

    fn pause(&self) -> anyhow::Result<()>;

    /// Removes the element from its document and drops its source so that
    /// playback cannot continue in the background.
    fn detach(&self) -> anyhow::Result<()>;

    /// Resolves once the element can present its first frame.
    fn ready(&self) -> LocalBoxFuture<'static, ()>;
}

#[derive(Clone)]
pub struct Texture {
    pub id: ResourceId,
    pub label: String,
    pub media: Option<Rc<dyn MediaElement>>,
}

impl Texture {
    pub fn new(id: ResourceId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            media: None,
        }
    }

    pub fn video(id: ResourceId, label: impl Into<String>, media: Rc<dyn MediaElement>) -> Self {
        Self {
            id,
            label: label.into(),
            media: Some(media),
        }
    }

    pub fn is_video(&self) -> bool {
        self.media.is_some()
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("video", &self.is_video())
            .finish()
    }
}

/// What an engine loader hands back for a manifest entry.
#[derive(Debug)]
pub enum LoadedResource {
    Mesh(SceneNode),
    Texture(Texture),
    Panorama(Texture),
    Video(Texture),
}

impl LoadedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            LoadedResource::Mesh(_) => ResourceKind::Mesh,
            LoadedResource::Texture(_) => ResourceKind::Texture,
            LoadedResource::Panorama(_) => ResourceKind::Panorama,
            LoadedResource::Video(_) => ResourceKind::Video,
        }
    }
}

/// The renderer's GPU context and drawing surface. Not `Clone`: exactly one owner.
#[derive(Debug, PartialEq, Eq)]
pub struct RendererHandle {
    pub id: ResourceId,
}

/// A scheduled animation frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait Engine {
    /// Whatever the renderer draws into (a window, a canvas, ...).
    type Container: Clone;

    fn create_renderer(
        &self,
        container: Self::Container,
    ) -> LocalBoxFuture<'_, anyhow::Result<RendererHandle>>;

    /// Loads and decodes one resource. Meshes come back as a node tree whose
    /// geometry and materials are already registered with the engine.
    fn load<'a>(
        &'a self,
        kind: ResourceKind,
        path: &'a str,
    ) -> LocalBoxFuture<'a, anyhow::Result<LoadedResource>>;

    fn create_material(
        &self,
        label: &str,
        variant: &MaterialVariant,
        textures: &[Texture],
    ) -> anyhow::Result<Material>;

    fn create_quad(&self, label: &str, width: f32, height: f32) -> anyhow::Result<Geometry>;

    fn render(
        &self,
        renderer: &RendererHandle,
        scene: &SceneGraph,
        camera: &CameraState,
    ) -> anyhow::Result<()>;

    /// Releases a geometry, material or texture.
    fn release(&self, id: ResourceId) -> anyhow::Result<()>;

    /// Force-releases the GPU context and removes the drawing surface.
    fn release_renderer(&self, renderer: RendererHandle) -> anyhow::Result<()>;

    fn request_frame(&self) -> FrameHandle;

    fn cancel_frame(&self, handle: FrameHandle);

    /// Resolves at the next animation-frame boundary.
    fn next_frame(&self) -> LocalBoxFuture<'static, ()>;

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}
