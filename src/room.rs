//! The lifecycle facade of the room.
//!
//! ```text
//! Uninitialized --initialize--> Loading --> Ready --launch_application--> Launched
//!                                  |          |                              |
//!                                  v          |            exit_application  |
//!                               Failed        |   Uninitialized <------------+
//!                                             v
//!                 (any) ------dispose------> Disposed
//! ```
//!
//! A [`Room`] is driven from one thread. Its operations take `&self` so that
//! `dispose` can be called while `initialize` is suspended on a load; results
//! that arrive after such a dispose are released instead of attached.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::StreamExt;
use instant::Duration;

use crate::{
    builder::SceneGraphBuilder,
    camera::{
        CameraIntent, CameraPose, CameraRig, CameraState, TransitionCallback, TransitionOutcome,
        Viewpoints,
    },
    config::RoomConfig,
    context::SceneContext,
    data_structures::scene_graph::SceneGraph,
    disposal::DisposalManager,
    engine::Engine,
    error::{RoomError, RoomResult},
    events::{EventForwarder, EventSink, ProgressSink, RoomEvent},
    features,
    manifest::AssetManifest,
    resources::LoadOrchestrator,
    storage::{self, StateStore},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomState {
    Uninitialized,
    Loading,
    Ready,
    Launched,
    Disposed,
    Failed,
}

/// What a room is mounted with.
pub struct Mount<C> {
    pub container: C,
    pub manifest: AssetManifest,
    /// Overrides the manifest's initial viewpoint unless a persisted pose exists.
    pub initial_camera: Option<CameraPose>,
}

struct RoomInner {
    state: RoomState,
    ctx: SceneContext,
    disposal: DisposalManager,
    /// Bumped whenever the current scene is torn down.
    epoch: u64,
    elapsed: Duration,
    launch_requested: Rc<Cell<bool>>,
}

pub struct Room<E: Engine> {
    engine: E,
    container: E::Container,
    manifest: AssetManifest,
    initial_camera: Option<CameraPose>,
    config: RoomConfig,
    events: Rc<dyn EventSink>,
    store: Rc<dyn StateStore>,
    inner: RefCell<RoomInner>,
}

impl<E: Engine> Room<E> {
    pub fn new(
        engine: E,
        mount: Mount<E::Container>,
        config: RoomConfig,
        events: Rc<dyn EventSink>,
        store: Rc<dyn StateStore>,
    ) -> Self {
        Self {
            engine,
            container: mount.container,
            manifest: mount.manifest,
            initial_camera: mount.initial_camera,
            config,
            events,
            store,
            inner: RefCell::new(RoomInner {
                state: RoomState::Uninitialized,
                ctx: SceneContext::default(),
                disposal: DisposalManager::new(),
                epoch: 0,
                elapsed: Duration::ZERO,
                launch_requested: Rc::new(Cell::new(false)),
            }),
        }
    }

    pub fn state(&self) -> RoomState {
        self.inner.borrow().state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    /// Number of nodes in the live scene, 0 without one.
    pub fn node_count(&self) -> usize {
        self.with_scene(SceneGraph::node_count).unwrap_or(0)
    }

    pub fn with_scene<R>(&self, f: impl FnOnce(&SceneGraph) -> R) -> Option<R> {
        self.inner.borrow().ctx.scene.as_ref().map(f)
    }

    pub fn camera(&self) -> Option<CameraState> {
        self.inner.borrow().ctx.rig.as_ref().map(|rig| *rig.camera())
    }

    pub fn is_transitioning(&self) -> bool {
        self.inner
            .borrow()
            .ctx
            .rig
            .as_ref()
            .is_some_and(CameraRig::is_transitioning)
    }

    fn expect_state(&self, operation: &'static str, expected: RoomState) -> RoomResult<()> {
        let state = self.state();
        if state == expected {
            return Ok(());
        }
        let err = RoomError::InvalidState { operation, state };
        log::warn!("{err}");
        Err(err)
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.inner.borrow().epoch != epoch
    }

    /// The manifest viewpoints with the initial pose resolved.
    fn viewpoints(&self) -> Viewpoints {
        let mut viewpoints = *self.manifest.viewpoints();
        let persisted = storage::read_camera_pose(&*self.store, &self.config.storage_key);
        if let Some(pose) = persisted.or(self.initial_camera) {
            viewpoints.initial.pose = pose;
        }
        viewpoints
    }

    /**
     * Loads the manifest, builds the scene and starts the intro.
     *
     * Resolves once the first frame has been presented. Fails if a mandatory
     * asset or the renderer cannot be created; the partial scene is disposed
     * and the room stays `Failed`. If the room is disposed while loading, this
     * resolves `Ok(())` without attaching anything else.
     */
    pub async fn initialize(&self) -> RoomResult<()> {
        self.expect_state("initialize", RoomState::Uninitialized)?;
        let epoch = {
            let mut inner = self.inner.borrow_mut();
            inner.state = RoomState::Loading;
            inner.elapsed = Duration::ZERO;
            inner.launch_requested.set(false);
            inner.epoch
        };
        log::info!("Initializing room with {} assets", self.manifest.entries().len());
        let viewpoints = self.viewpoints();

        let renderer = match self.engine.create_renderer(self.container.clone()).await {
            Ok(renderer) => renderer,
            Err(_) if self.is_stale(epoch) => return Ok(()),
            Err(e) => {
                log::error!("Renderer could not be created: {:#}", e);
                self.events.emit(RoomEvent::Error {
                    message: format!("{e:#}"),
                });
                self.inner.borrow_mut().state = RoomState::Failed;
                return Err(RoomError::Renderer(e));
            }
        };
        if self.is_stale(epoch) {
            if let Err(e) = self.engine.release_renderer(renderer) {
                log::error!("Failed to release a superseded renderer: {:#}", e);
            }
            return Ok(());
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.ctx.renderer = Some(renderer);
            inner.ctx.scene = Some(SceneGraph::new());
        }

        let forwarder = EventForwarder::new(&*self.events);
        let orchestrator = LoadOrchestrator::new(&self.engine, self.config.media_ready_deadline());
        let mut tasks = orchestrator.stream(&self.manifest, &forwarder);
        let mut mandatory_failure = None;
        while let Some(task) = tasks.next().await {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let Some(resource) = task.handle else {
                if task.mandatory && mandatory_failure.is_none() {
                    let source = task
                        .error
                        .unwrap_or_else(|| anyhow::anyhow!("{} produced nothing", task.name));
                    mandatory_failure = Some((task.name, source));
                }
                continue;
            };
            let scene = match inner.ctx.scene.as_mut() {
                Some(scene) if inner.epoch == epoch => scene,
                _ => {
                    inner.disposal.release_orphan(&self.engine, resource);
                    continue;
                }
            };
            let mut builder =
                SceneGraphBuilder::new(scene, &self.engine, &self.manifest, &self.config.ambient);
            if let Err(rejected) = builder.attach(&task.name, resource) {
                inner.disposal.release_orphan(&self.engine, rejected);
            }
        }
        drop(tasks);

        if self.is_stale(epoch) {
            log::info!("Initialization was superseded by dispose");
            return Ok(());
        }
        if let Some((name, source)) = mandatory_failure {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.disposal.dispose_all(&self.engine, &mut inner.ctx);
            inner.state = RoomState::Failed;
            return Err(RoomError::MandatoryAsset { name, source });
        }

        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if let Some(scene) = inner.ctx.scene.as_mut() {
                SceneGraphBuilder::new(scene, &self.engine, &self.manifest, &self.config.ambient)
                    .finalize();
                inner.disposal.release_retired(&self.engine, scene);
                inner.ctx.animators = features::ambient_animators(scene, &self.config.ambient);
            }
            let rig = CameraRig::new(
                viewpoints,
                self.config.move_duration(),
                self.config.intro_duration(),
            );
            if let (Some(renderer), Some(scene)) = (&inner.ctx.renderer, &inner.ctx.scene) {
                if let Err(e) = self.engine.render(renderer, scene, rig.camera()) {
                    log::error!("First frame could not be rendered: {:#}", e);
                }
            }
            inner.ctx.rig = Some(rig);
        }
        self.engine.next_frame().await;
        if self.is_stale(epoch) {
            return Ok(());
        }

        let nodes = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.state = RoomState::Ready;
            if self.config.play_intro {
                if let Some(rig) = inner.ctx.rig.as_mut() {
                    rig.request(CameraIntent::IntroAnimation, None);
                }
            }
            inner.ctx.frame = Some(self.engine.request_frame());
            inner.ctx.scene.as_ref().map_or(0, SceneGraph::node_count)
        };
        log::info!("Room is ready with {nodes} nodes");
        forwarder.on_load();
        Ok(())
    }

    /// Tears the scene down and hands over to the 2D application.
    pub fn launch_application(&self) -> RoomResult<()> {
        self.expect_state("launch_application", RoomState::Ready)?;
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.epoch += 1;
            inner.disposal.dispose_all(&self.engine, &mut inner.ctx);
            inner.state = RoomState::Launched;
        }
        log::info!("Application launched");
        self.events.emit(RoomEvent::ApplicationLaunched);
        Ok(())
    }

    /// Returns from the 2D application and rebuilds the room from scratch.
    pub async fn exit_application(&self) -> RoomResult<()> {
        self.expect_state("exit_application", RoomState::Launched)?;
        self.inner.borrow_mut().state = RoomState::Uninitialized;
        log::info!("Returning to the room");
        self.initialize().await
    }

    /// Releases everything. Valid in every state; repeated calls do nothing.
    pub fn dispose(&self) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.state == RoomState::Disposed {
            log::debug!("Room is already disposed");
            return;
        }
        log::info!("Disposing room ({:?})", inner.state);
        inner.epoch += 1;
        inner.disposal.dispose_all(&self.engine, &mut inner.ctx);
        inner.state = RoomState::Disposed;
    }

    /// Consumes an inbound event. Only `ExitApplication` is acted upon.
    pub async fn handle_event(&self, event: RoomEvent) -> RoomResult<()> {
        match event {
            RoomEvent::ExitApplication => self.exit_application().await,
            other => {
                log::debug!("Ignoring inbound {}", other.name());
                Ok(())
            }
        }
    }

    /**
     * Forwards a camera intent to the rig.
     *
     * `on_complete` runs inside [`Room::frame`] when the camera arrives and must
     * not call back into the room.
     */
    pub fn move_camera(
        &self,
        intent: CameraIntent,
        on_complete: Option<TransitionCallback>,
    ) -> RoomResult<TransitionOutcome> {
        self.expect_state("move_camera", RoomState::Ready)?;
        let mut inner = self.inner.borrow_mut();
        Ok(inner
            .ctx
            .rig
            .as_mut()
            .map_or(TransitionOutcome::Rejected, |rig| {
                rig.request(intent, on_complete)
            }))
    }

    /// Flies to the screen and launches the application once the camera arrives.
    pub fn enter_application(&self) -> RoomResult<TransitionOutcome> {
        let launch = self.inner.borrow().launch_requested.clone();
        self.move_camera(
            CameraIntent::MoveToScreen,
            Some(Box::new(move |_| launch.set(true))),
        )
    }

    pub fn drag(&self, dx: f32, dy: f32) -> bool {
        self.with_idle_rig(|rig| rig.drag(dx, dy))
    }

    pub fn zoom(&self, delta: f32) -> bool {
        self.with_idle_rig(|rig| rig.zoom(delta))
    }

    fn with_idle_rig(&self, f: impl FnOnce(&mut CameraRig) -> bool) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.state != RoomState::Ready {
            return false;
        }
        inner.ctx.rig.as_mut().is_some_and(f)
    }

    /// Stores the current camera pose as the initial pose of the next `initialize`.
    pub fn persist_camera(&self) -> anyhow::Result<()> {
        let camera = self
            .camera()
            .ok_or_else(|| anyhow::anyhow!("There is no camera to persist"))?;
        let pose = CameraPose::new(camera.position.into(), camera.look_at.into());
        storage::write_camera_pose(&*self.store, &self.config.storage_key, pose)
    }

    /// One steady-state tick: advances the camera and feature animations, renders and
    /// schedules the next frame. Does nothing unless the room is `Ready`.
    pub fn frame(&self, dt: Duration) {
        let launch = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if inner.state != RoomState::Ready {
                return;
            }
            // the scheduled frame is the one running now
            inner.ctx.frame = None;
            inner.elapsed += dt;
            let elapsed = inner.elapsed;
            let ctx = &mut inner.ctx;
            if let Some(rig) = ctx.rig.as_mut() {
                rig.update(dt);
            }
            if let Some(scene) = ctx.scene.as_mut() {
                features::animate_all(&mut ctx.animators, scene, elapsed, dt);
            }
            if let (Some(renderer), Some(scene), Some(rig)) = (&ctx.renderer, &ctx.scene, &ctx.rig)
            {
                if let Err(e) = self.engine.render(renderer, scene, rig.camera()) {
                    log::error!("Unable to render {:#}", e);
                }
            }
            ctx.frame = Some(self.engine.request_frame());
            inner.launch_requested.replace(false)
        };
        if launch {
            if let Err(e) = self.launch_application() {
                log::warn!("Launch after camera arrival failed: {e}");
            }
        }
    }
}

impl<E: Engine> Drop for Room<E> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.disposal.dispose_all(&self.engine, &mut inner.ctx);
    }
}
