//! Client-local key-value storage and the persisted camera pose.
//!
//! The camera pose is stored under [`CAMERA_STATE_KEY`] as
//! `{ "initial": [x, y, z], "lookAt": [x, y, z] }`.

use std::{cell::RefCell, collections::HashMap};

use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;

pub const CAMERA_STATE_KEY: &str = "operator_room_state";

pub trait StateStore {
    fn read(&self, key: &str) -> Option<String>;

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key below a directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileStore {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> std::path::PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl StateStore for FileStore {
    fn read(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path(key)).ok()
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), value)?;
        Ok(())
    }
}

/// The browser's `window.localStorage`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

#[cfg(target_arch = "wasm32")]
impl StateStore for LocalStorage {
    fn read(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let storage =
            Self::storage().ok_or_else(|| anyhow::anyhow!("localStorage is not available"))?;
        storage
            .set_item(key, value)
            .map_err(|e| anyhow::anyhow!("localStorage write failed: {e:?}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedCamera {
    pub initial: [f32; 3],
    #[serde(rename = "lookAt")]
    pub look_at: [f32; 3],
}

impl From<CameraPose> for PersistedCamera {
    fn from(pose: CameraPose) -> Self {
        Self {
            initial: pose.position,
            look_at: pose.target,
        }
    }
}

impl From<PersistedCamera> for CameraPose {
    fn from(persisted: PersistedCamera) -> Self {
        CameraPose::new(persisted.initial, persisted.look_at)
    }
}

/// The stored pose, or `None` if it is missing or unusable.
pub fn read_camera_pose(store: &dyn StateStore, key: &str) -> Option<CameraPose> {
    let raw = store.read(key)?;
    let persisted: PersistedCamera = match serde_json::from_str(&raw) {
        Ok(persisted) => persisted,
        Err(e) => {
            log::warn!("Ignoring malformed camera state under `{key}`: {e}");
            return None;
        }
    };
    let finite = persisted
        .initial
        .iter()
        .chain(persisted.look_at.iter())
        .all(|v| v.is_finite());
    if !finite {
        log::warn!("Ignoring non-finite camera state under `{key}`");
        return None;
    }
    Some(persisted.into())
}

pub fn write_camera_pose(
    store: &dyn StateStore,
    key: &str,
    pose: CameraPose,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(&PersistedCamera::from(pose))?;
    store.write(key, &json)
}
