//! The static asset manifest.
//!
//! An [`AssetManifest`] maps logical asset names to load paths and resource
//! kinds and declares the camera viewpoints of the room. It is immutable once
//! constructed and can be deserialized from JSON:
//!
//! ```json
//! {
//!   "entries": [
//!     { "name": "room", "path": "models/room.draco.glb", "fallback": "models/room.glb",
//!       "kind": "mesh", "role": "structure", "mandatory": true },
//!     { "name": "baked_day", "path": "textures/day.jpg", "kind": "texture",
//!       "role": { "baked": "day" } },
//!     { "name": "screen_left", "path": "videos/left.mp4", "kind": "video",
//!       "role": { "screen": { "target": "screen_left" } } }
//!   ],
//!   "viewpoints": { ... }
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{camera::Viewpoints, data_structures::material::BakedLayer, error::RoomError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Mesh,
    Texture,
    Panorama,
    Video,
}

/// What the scene does with an asset once it is loaded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    /// The primary room mesh every baked surface lives on.
    Structure,
    Baked(BakedLayer),
    Environment,
    /// A looping video shown on the screen mesh named `target`.
    Screen { target: String },
    Chair,
    Leds,
    Steam,
}

impl AssetRole {
    /// The only resource kind this role accepts.
    pub fn expected_kind(&self) -> ResourceKind {
        match self {
            AssetRole::Structure | AssetRole::Chair | AssetRole::Leds => ResourceKind::Mesh,
            AssetRole::Baked(_) | AssetRole::Steam => ResourceKind::Texture,
            AssetRole::Environment => ResourceKind::Panorama,
            AssetRole::Screen { .. } => ResourceKind::Video,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub fallback: Option<String>,
    pub kind: ResourceKind,
    pub role: AssetRole,
    /// Mandatory assets fail the whole initialization when they cannot be loaded.
    #[serde(default)]
    pub mandatory: bool,
}

impl AssetEntry {
    pub fn new(name: &str, path: &str, kind: ResourceKind, role: AssetRole) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            fallback: None,
            kind,
            role,
            mandatory: false,
        }
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = Some(fallback.to_string());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// Name fragments the builder uses to classify nodes of the structure mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneMarkers {
    /// Nodes whose name contains this marker, and everything below them, are screens.
    pub screen: String,
    /// Wall-like surfaces receive the back-face tinted baked material.
    pub structural: Vec<String>,
}

impl Default for SceneMarkers {
    fn default() -> Self {
        Self {
            screen: "screen".to_string(),
            structural: vec!["wall".to_string(), "ceiling".to_string()],
        }
    }
}

impl SceneMarkers {
    pub fn is_screen(&self, name: &str) -> bool {
        name.to_lowercase().contains(&self.screen.to_lowercase())
    }

    pub fn is_structural(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.structural
            .iter()
            .any(|marker| name.contains(&marker.to_lowercase()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    entries: Vec<AssetEntry>,
    #[serde(default)]
    viewpoints: Viewpoints,
    #[serde(default)]
    markers: SceneMarkers,
}

impl AssetManifest {
    pub fn new(entries: Vec<AssetEntry>, viewpoints: Viewpoints) -> Result<Self, RoomError> {
        let manifest = Self {
            entries,
            viewpoints,
            markers: SceneMarkers::default(),
        };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn with_markers(mut self, markers: SceneMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, RoomError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn entries(&self) -> &[AssetEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&AssetEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn viewpoints(&self) -> &Viewpoints {
        &self.viewpoints
    }

    pub fn markers(&self) -> &SceneMarkers {
        &self.markers
    }

    fn validate(&self) -> Result<(), RoomError> {
        let mut names = HashSet::new();
        let mut structures = 0;
        let mut environments = 0;
        for entry in &self.entries {
            if !names.insert(entry.name.as_str()) {
                return Err(RoomError::Manifest(format!(
                    "asset `{}` is declared twice",
                    entry.name
                )));
            }
            if entry.role.expected_kind() != entry.kind {
                return Err(RoomError::Manifest(format!(
                    "asset `{}` has kind {:?} but its role {:?} needs {:?}",
                    entry.name,
                    entry.kind,
                    entry.role,
                    entry.role.expected_kind()
                )));
            }
            match entry.role {
                AssetRole::Structure => structures += 1,
                AssetRole::Environment => environments += 1,
                _ => (),
            }
        }
        if structures > 1 || environments > 1 {
            return Err(RoomError::Manifest(
                "at most one structure and one environment asset are supported".to_string(),
            ));
        }
        Ok(())
    }

    /// The stock operator room.
    pub fn operator_room() -> Self {
        use AssetRole::*;
        use ResourceKind::*;
        let entries = vec![
            AssetEntry::new("room", "models/room.draco.glb", Mesh, Structure)
                .with_fallback("models/room.glb")
                .mandatory(),
            AssetEntry::new("baked_day", "textures/baked_day.jpg", Texture, Baked(BakedLayer::Day)),
            AssetEntry::new(
                "baked_night",
                "textures/baked_night.jpg",
                Texture,
                Baked(BakedLayer::Night),
            ),
            AssetEntry::new(
                "baked_neutral",
                "textures/baked_neutral.jpg",
                Texture,
                Baked(BakedLayer::Neutral),
            ),
            AssetEntry::new(
                "light_map",
                "textures/light_map.jpg",
                Texture,
                Baked(BakedLayer::LightMap),
            ),
            AssetEntry::new("environment", "environment/studio.hdr", Panorama, Environment),
            AssetEntry::new(
                "screen_left",
                "videos/screen_left.mp4",
                Video,
                Screen {
                    target: "screen_left".to_string(),
                },
            ),
            AssetEntry::new(
                "screen_right",
                "videos/screen_right.mp4",
                Video,
                Screen {
                    target: "screen_right".to_string(),
                },
            ),
            AssetEntry::new("chair", "models/chair.glb", Mesh, Chair),
            AssetEntry::new("leds", "models/leds.glb", Mesh, Leds),
            AssetEntry::new("steam", "textures/steam.png", Texture, Steam),
        ];
        Self {
            entries,
            viewpoints: Viewpoints::default(),
            markers: SceneMarkers::default(),
        }
    }
}
