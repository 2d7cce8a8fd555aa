//! room-ngin
//!
//! Scene lifecycle and transition orchestration for a cinematic 3D room that
//! hands off to a 2D application. The crate loads a manifest of meshes, baked
//! lighting layers, an environment panorama and looping videos in parallel,
//! builds the scene graph while the loads are still settling, animates the
//! camera between named viewpoints and tears every GPU handle down exactly once
//! when the 2D application takes over.
//!
//! High-level modules
//! - `room`: the lifecycle facade (`initialize`, `launch_application`, `exit_application`, `dispose`)
//! - `resources`: the parallel resource loader and the file/glTF helpers
//! - `builder`: incremental scene graph construction and the baked material pass
//! - `camera`: camera state, orbit controls and the transition state machine
//! - `disposal`: the release ledger and scene teardown
//! - `engine`: the rendering engine capability the core is written against
//! - `gpu`: the wgpu implementation of that capability
//! - `host`: a winit application running a room in a window
//! - `data_structures`: scene graph, materials and transforms
//! - `features`, `events`, `storage`, `config`, `context`, `manifest`, `error`
//!

pub mod builder;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod disposal;
pub mod engine;
pub mod error;
pub mod events;
pub mod features;
pub mod gpu;
pub mod host;
pub mod manifest;
pub mod resources;
pub mod room;
pub mod storage;

// Re-exports commonly used types for convenience in downstream code.
pub use camera::{CameraIntent, CameraPose, TransitionOutcome, ViewpointName};
pub use config::RoomConfig;
pub use engine::Engine;
pub use error::{RoomError, RoomResult};
pub use events::{EventSink, RoomEvent};
pub use manifest::AssetManifest;
pub use room::{Mount, Room, RoomState};

/// Installs the platform logger. Calling it more than once is harmless.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("Logger already initialized: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("Logger already initialized: {}", e);
        }
    }
}
