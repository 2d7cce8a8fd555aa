//! Runs a [`Room`] in a winit window.
//!
//! The host owns the event loop, creates the window (the `canvas` element in
//! the browser) once the application is resumed and translates input into room
//! operations:
//!
//! - left-drag orbits, the wheel zooms
//! - `1`, `2`, `3` fly to the initial, computer and screen viewpoints
//! - `Enter` flies to the screen and launches the application on arrival
//! - `Escape` returns from the application to the room
//!
//! Natively, async room operations are driven to completion on a tokio runtime
//! before the next window event is handled. In the browser they are spawned.
//!
//! After the application is launched the browser canvas is hidden. A native
//! window stays open and keeps its last frame until `Escape` rebuilds the room.

use std::{rc::Rc, sync::Arc};

use futures::{FutureExt, future::LocalBoxFuture};
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    camera::CameraIntent,
    config::RoomConfig,
    error::RoomResult,
    events::{EventSink, RoomEvent},
    gpu::WgpuEngine,
    manifest::AssetManifest,
    room::{Mount, Room},
    storage::StateStore,
};

/// Wheel lines are reported in pixels on some platforms.
const PIXELS_PER_LINE: f32 = 100.0;

fn log_event(event: RoomEvent) {
    match &event {
        RoomEvent::Error { message } => log::error!("{}: {message}", event.name()),
        RoomEvent::LoadingProgress { progress } => log::info!("{}: {progress}%", event.name()),
        _ => log::info!("{}", event.name()),
    }
}

struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    manifest: Option<AssetManifest>,
    config: RoomConfig,
    room: Option<Rc<Room<WgpuEngine>>>,
    last_time: Instant,
    dragging: bool,
    cursor: Option<PhysicalPosition<f64>>,
}

impl App {
    fn new(manifest: AssetManifest, config: RoomConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            manifest: Some(manifest),
            config,
            room: None,
            last_time: Instant::now(),
            dragging: false,
            cursor: None,
        })
    }

    fn store() -> Rc<dyn StateStore> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            Rc::new(crate::storage::FileStore::new(
                std::path::Path::new("./").join(".room-state"),
            ))
        }

        #[cfg(target_arch = "wasm32")]
        {
            Rc::new(crate::storage::LocalStorage)
        }
    }

    /// Runs (or spawns) an async room operation and logs its failure.
    fn drive(&self, operation: &'static str, fut: LocalBoxFuture<'static, RoomResult<()>>) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Err(e) = self.async_runtime.block_on(fut) {
                log::error!("{operation} failed: {e}");
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = fut.await {
                    log::error!("{operation} failed: {e}");
                }
            });
        }
    }

    fn move_camera(room: &Room<WgpuEngine>, intent: CameraIntent) {
        match room.move_camera(intent, None) {
            Ok(outcome) => log::debug!("{intent:?}: {outcome:?}"),
            Err(e) => log::debug!("{e}"),
        }
    }

    fn handle_key(&self, room: &Rc<Room<WgpuEngine>>, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        match code {
            KeyCode::Digit1 => Self::move_camera(room, CameraIntent::MoveToInitial),
            KeyCode::Digit2 => Self::move_camera(room, CameraIntent::MoveToComputer),
            KeyCode::Digit3 => Self::move_camera(room, CameraIntent::MoveToScreen),
            KeyCode::Enter => {
                if let Err(e) = room.enter_application() {
                    log::debug!("{e}");
                }
            }
            KeyCode::Escape => {
                let room = room.clone();
                self.drive(
                    "exit-application",
                    async move { room.handle_event(RoomEvent::ExitApplication).await }
                        .boxed_local(),
                );
            }
            _ => (),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(manifest) = self.manifest.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("room-ngin");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .and_then(|canvas| canvas.dyn_into().ok());
            window_attributes = window_attributes.with_canvas(canvas);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let events: Rc<dyn EventSink> = Rc::new(log_event);
        let mount = Mount {
            container: window,
            manifest,
            initial_camera: None,
        };
        let engine = WgpuEngine::new(self.config.clear_colour);
        let room = Rc::new(Room::new(
            engine,
            mount,
            self.config.clone(),
            events,
            Self::store(),
        ));
        self.room = Some(room.clone());
        self.last_time = Instant::now();
        self.drive(
            "initialize",
            async move { room.initialize().await }.boxed_local(),
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(room) = self.room.clone() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                if let Err(e) = room.persist_camera() {
                    log::debug!("Camera not persisted: {e:#}");
                }
                room.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => room.engine().resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                if room.engine().take_frame().is_some() {
                    room.frame(dt);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.dragging = true,
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => self.dragging = false,
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some(last)) = (self.dragging, self.cursor) {
                    room.drag((position.x - last.x) as f32, (position.y - last.y) as f32);
                }
                self.cursor = Some(position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
                };
                room.zoom(lines);
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&room, &event),
            _ => {}
        }
    }
}

/// Opens a window and runs the room described by `manifest` until it is closed.
pub fn run(manifest: AssetManifest, config: RoomConfig) -> anyhow::Result<()> {
    crate::init_logging();

    let event_loop = EventLoop::new()?;
    let mut app = App::new(manifest, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
