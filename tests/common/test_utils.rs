#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
};

use anyhow::bail;
use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, LocalBoxFuture},
};
use instant::Duration;
use room_ngin::{
    camera::CameraState,
    config::RoomConfig,
    data_structures::{
        material::{BakedLayer, Material, MaterialVariant},
        scene_graph::{SceneGraph, SceneNode},
    },
    engine::{
        Engine, FrameHandle, Geometry, LoadedResource, MediaElement, RendererHandle, ResourceId,
        Texture,
    },
    events::{EventSink, ProgressSink, RoomEvent},
    manifest::{AssetEntry, AssetManifest, AssetRole, ResourceKind},
    room::{Mount, Room},
    storage::MemoryStore,
};

pub type Journal = Rc<RefCell<Vec<String>>>;

fn stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}

pub struct MockMedia {
    label: String,
    journal: Journal,
    ready: bool,
}

impl MediaElement for MockMedia {
    fn play(&self) -> anyhow::Result<()> {
        self.journal.borrow_mut().push(format!("play {}", self.label));
        Ok(())
    }

    fn pause(&self) -> anyhow::Result<()> {
        self.journal.borrow_mut().push(format!("pause {}", self.label));
        Ok(())
    }

    fn detach(&self) -> anyhow::Result<()> {
        self.journal.borrow_mut().push(format!("detach {}", self.label));
        Ok(())
    }

    fn ready(&self) -> LocalBoxFuture<'static, ()> {
        if self.ready {
            future::ready(()).boxed_local()
        } else {
            future::pending().boxed_local()
        }
    }
}

/// An in-memory engine that records what the room asks of it.
pub struct MockEngine {
    next_id: Cell<u64>,
    /// Node names of mesh files, keyed by file stem.
    meshes: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    gates: RefCell<HashMap<String, oneshot::Receiver<()>>>,
    media_ready: bool,
    fail_renderer: bool,
    journal: Journal,
    loads: RefCell<Vec<String>>,
    live: RefCell<HashSet<ResourceId>>,
    released: RefCell<Vec<ResourceId>>,
    double_releases: Cell<usize>,
    renders: Cell<usize>,
    frames: Cell<u64>,
    cancelled: RefCell<Vec<FrameHandle>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            meshes: HashMap::new(),
            failing: HashSet::new(),
            gates: RefCell::new(HashMap::new()),
            media_ready: true,
            fail_renderer: false,
            journal: Rc::new(RefCell::new(Vec::new())),
            loads: RefCell::new(Vec::new()),
            live: RefCell::new(HashSet::new()),
            released: RefCell::new(Vec::new()),
            double_releases: Cell::new(0),
            renders: Cell::new(0),
            frames: Cell::new(0),
            cancelled: RefCell::new(Vec::new()),
        }
    }

    /// Mesh files named `stem.*` load as a container with one mesh per name.
    pub fn with_mesh(mut self, stem: &str, names: &[&str]) -> Self {
        self.meshes.insert(
            stem.to_string(),
            names.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn never_ready_media(mut self) -> Self {
        self.media_ready = false;
        self
    }

    pub fn failing_renderer(mut self) -> Self {
        self.fail_renderer = true;
        self
    }

    /// Holds the next load of `path` until the returned sender fires.
    pub fn gate(&self, path: &str) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.gates.borrow_mut().insert(path.to_string(), receiver);
        sender
    }

    fn allocate(&self) -> ResourceId {
        let id = ResourceId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.live.borrow_mut().insert(id);
        id
    }

    fn mesh(&self, path: &str) -> SceneNode {
        let names = self
            .meshes
            .get(stem(path))
            .cloned()
            .unwrap_or_else(|| vec!["body".to_string()]);
        let material = Material {
            id: self.allocate(),
            label: format!("{path}#material"),
            variant: MaterialVariant::Native {
                base_colour: [1.0; 4],
            },
            textures: Vec::new(),
        };
        let mut root = SceneNode::container(stem(path));
        for name in names {
            let geometry = Geometry {
                id: self.allocate(),
                label: name.clone(),
            };
            root.add_child(SceneNode::with_mesh(name, geometry, vec![material.clone()]));
        }
        root
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    /// Index of the first journal entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.journal.borrow().iter().position(|e| e == entry)
    }

    pub fn loads_of(&self, path: &str) -> usize {
        self.loads.borrow().iter().filter(|p| *p == path).count()
    }

    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.live.borrow().contains(&id)
    }

    pub fn released(&self) -> Vec<ResourceId> {
        self.released.borrow().clone()
    }

    pub fn double_releases(&self) -> usize {
        self.double_releases.get()
    }

    pub fn renders(&self) -> usize {
        self.renders.get()
    }

    pub fn cancelled(&self) -> Vec<FrameHandle> {
        self.cancelled.borrow().clone()
    }

    fn free(&self, id: ResourceId) -> anyhow::Result<()> {
        if !self.live.borrow_mut().remove(&id) {
            self.double_releases.set(self.double_releases.get() + 1);
            bail!("{id} is not live");
        }
        self.released.borrow_mut().push(id);
        Ok(())
    }
}

impl Engine for MockEngine {
    type Container = ();

    fn create_renderer(&self, _container: ()) -> LocalBoxFuture<'_, anyhow::Result<RendererHandle>> {
        async move {
            if self.fail_renderer {
                bail!("no adapter");
            }
            let id = self.allocate();
            self.journal.borrow_mut().push(format!("create_renderer {id}"));
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
            self.journal.borrow_mut().push(format!("load {path}"));
            self.loads.borrow_mut().push(path.to_string());
            let gate = self.gates.borrow_mut().remove(path);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.failing.contains(path) {
                bail!("{path} is unreachable");
            }
            let resource = match kind {
                ResourceKind::Mesh => LoadedResource::Mesh(self.mesh(path)),
                ResourceKind::Texture => LoadedResource::Texture(Texture::new(self.allocate(), path)),
                ResourceKind::Panorama => {
                    LoadedResource::Panorama(Texture::new(self.allocate(), path))
                }
                ResourceKind::Video => {
                    let media = MockMedia {
                        label: path.to_string(),
                        journal: self.journal.clone(),
                        ready: self.media_ready,
                    };
                    LoadedResource::Video(Texture::video(self.allocate(), path, Rc::new(media)))
                }
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
        Ok(Material {
            id: self.allocate(),
            label: label.to_string(),
            variant: variant.clone(),
            textures: textures.to_vec(),
        })
    }

    fn create_quad(&self, label: &str, _width: f32, _height: f32) -> anyhow::Result<Geometry> {
        Ok(Geometry {
            id: self.allocate(),
            label: label.to_string(),
        })
    }

    fn render(
        &self,
        _renderer: &RendererHandle,
        _scene: &SceneGraph,
        _camera: &CameraState,
    ) -> anyhow::Result<()> {
        self.renders.set(self.renders.get() + 1);
        Ok(())
    }

    fn release(&self, id: ResourceId) -> anyhow::Result<()> {
        self.journal.borrow_mut().push(format!("release {id}"));
        self.free(id)
    }

    fn release_renderer(&self, renderer: RendererHandle) -> anyhow::Result<()> {
        self.journal
            .borrow_mut()
            .push(format!("release_renderer {}", renderer.id));
        self.free(renderer.id)
    }

    fn request_frame(&self) -> FrameHandle {
        self.frames.set(self.frames.get() + 1);
        FrameHandle(self.frames.get())
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.cancelled.borrow_mut().push(handle);
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        future::ready(()).boxed_local()
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }
}

/// The structure mesh of the test room.
pub const ROOM_NODES: &[&str] = &["wall_north", "ceiling", "desk", "screen_left", "screen_right"];

pub fn room_engine() -> MockEngine {
    MockEngine::new()
        .with_mesh("room", ROOM_NODES)
        .with_mesh("leds", &["led_0", "led_1", "led_2"])
}

/// A room with every kind of asset; only `room` is mandatory.
pub fn test_manifest() -> AssetManifest {
    use AssetRole::*;
    use ResourceKind::*;
    let entries = vec![
        AssetEntry::new("room", "models/room.draco.glb", Mesh, Structure)
            .with_fallback("models/room.glb")
            .mandatory(),
        AssetEntry::new("baked_day", "textures/day.jpg", Texture, Baked(BakedLayer::Day)),
        AssetEntry::new("baked_night", "textures/night.jpg", Texture, Baked(BakedLayer::Night)),
        AssetEntry::new("environment", "environment/studio.hdr", Panorama, Environment),
        AssetEntry::new(
            "screen_left",
            "videos/left.mp4",
            Video,
            Screen {
                target: "screen_left".to_string(),
            },
        ),
        AssetEntry::new("chair", "models/chair.glb", Mesh, Chair),
        AssetEntry::new("leds", "models/leds.glb", Mesh, Leds),
        AssetEntry::new("steam", "textures/steam.png", Texture, Steam),
    ];
    AssetManifest::new(entries, Default::default()).expect("valid manifest")
}

pub fn test_config() -> RoomConfig {
    RoomConfig {
        move_duration_ms: 100,
        intro_duration_ms: 200,
        media_ready_deadline_ms: 20,
        play_intro: false,
        ..Default::default()
    }
}

pub type EventLog = Rc<RefCell<Vec<RoomEvent>>>;

pub fn event_log() -> (EventLog, Rc<dyn EventSink>) {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink: Rc<dyn EventSink> = {
        let log = log.clone();
        Rc::new(move |event: RoomEvent| log.borrow_mut().push(event))
    };
    (log, sink)
}

pub fn progress_values(events: &[RoomEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            RoomEvent::LoadingProgress { progress } => Some(*progress),
            _ => None,
        })
        .collect()
}

pub fn has_error(events: &[RoomEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, RoomEvent::Error { .. }))
}

pub fn test_room(
    engine: MockEngine,
    manifest: AssetManifest,
    config: RoomConfig,
) -> (Room<MockEngine>, EventLog) {
    let (log, sink) = event_log();
    let mount = Mount {
        container: (),
        manifest,
        initial_camera: None,
    };
    let room = Room::new(engine, mount, config, sink, Rc::new(MemoryStore::new()));
    (room, log)
}

/// Records loader callbacks.
#[derive(Default)]
pub struct RecordingProgress {
    pub progress: RefCell<Vec<(String, usize, usize)>>,
    pub errors: RefCell<Vec<String>>,
    pub loads: Cell<usize>,
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, asset: &str, loaded: usize, total: usize) {
        self.progress
            .borrow_mut()
            .push((asset.to_string(), loaded, total));
    }

    fn on_load(&self) {
        self.loads.set(self.loads.get() + 1);
    }

    fn on_error(&self, asset: &str, _message: &str) {
        self.errors.borrow_mut().push(asset.to_string());
    }
}
