//! Material descriptors bound to scene meshes.
//!
//! A [`Material`] is a GPU-backed resource (it owns a [`ResourceId`] allocated
//! by the engine) that references zero or more [`Texture`]s. Cloning a
//! `Material` clones the handle, not the GPU object: two meshes holding clones
//! of the same material share one instance and it is released once.

use serde::{Deserialize, Serialize};

use crate::engine::{ResourceId, Texture};

/// One of the precomputed lighting layers a baked material blends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BakedLayer {
    Day,
    Night,
    Neutral,
    LightMap,
}

/// Which flavour of the baked material a structural mesh receives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BakedVariant {
    Standard,
    /// Wall-like surfaces are seen from both sides; the back face is tinted.
    WallVariant { back_face_colour: [f32; 3] },
}

#[derive(Clone, Debug, PartialEq)]
pub enum MaterialVariant {
    /// Whatever the mesh file declared.
    Native { base_colour: [f32; 4] },
    Baked(BakedVariant),
    Video,
    Particle { opacity: f32 },
}

impl MaterialVariant {
    pub fn label(&self) -> &'static str {
        match self {
            MaterialVariant::Native { .. } => "native",
            MaterialVariant::Baked(BakedVariant::Standard) => "baked",
            MaterialVariant::Baked(BakedVariant::WallVariant { .. }) => "baked-wall",
            MaterialVariant::Video => "video",
            MaterialVariant::Particle { .. } => "particle",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    pub id: ResourceId,
    pub label: String,
    pub variant: MaterialVariant,
    pub textures: Vec<Texture>,
}

impl Material {
    pub fn is_baked(&self) -> bool {
        matches!(self.variant, MaterialVariant::Baked(_))
    }

    /// The texture sampled by an unlit pass, if any.
    pub fn primary_texture(&self) -> Option<&Texture> {
        self.textures.first()
    }
}
