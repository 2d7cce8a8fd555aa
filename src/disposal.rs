//! Deterministic teardown of everything the GPU holds for a room.
//!
//! The [`DisposalManager`] keeps a ledger of released [`ResourceId`]s and is
//! the only place that asks the engine to release anything. A handle shared
//! by several meshes is released once, and a failing release is logged
//! without stopping the walk.

use std::collections::HashSet;

use crate::{
    context::SceneContext,
    data_structures::{
        material::Material,
        scene_graph::{ParkedVideo, SceneGraph, SceneNode},
    },
    engine::{Engine, LoadedResource, ResourceId, Texture},
};

#[derive(Debug, Default)]
pub struct DisposalManager {
    released: HashSet<ResourceId>,
}

impl DisposalManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_released(&self, id: ResourceId) -> bool {
        self.released.contains(&id)
    }

    pub fn released_count(&self) -> usize {
        self.released.len()
    }

    /**
     * Tears down a scene context.
     *
     * The frame loop is cancelled first. The node tree is then walked once;
     * every node releases its geometry, its materials and their textures before
     * it is detached. Resources held outside the tree follow, then the
     * renderer. The context is left empty, so a second call does nothing.
     */
    pub fn dispose_all<E: Engine>(&mut self, engine: &E, ctx: &mut SceneContext) {
        if ctx.is_empty() {
            log::debug!("Nothing to dispose");
            return;
        }
        let before = self.released.len();

        if let Some(frame) = ctx.frame.take() {
            engine.cancel_frame(frame);
        }
        if let Some(scene) = ctx.scene.take() {
            self.release_scene(engine, scene);
        }
        if let Some(renderer) = ctx.renderer.take() {
            let id = renderer.id;
            if self.released.insert(id) {
                if let Err(e) = engine.release_renderer(renderer) {
                    log::error!("Failed to release renderer {id}: {:#}", e);
                }
            }
        }
        ctx.rig = None;
        ctx.animators.clear();

        log::info!("Disposed scene, {} handles released", self.released.len() - before);
    }

    /**
     * Releases the materials and textures the builder stopped using.
     *
     * A retired baked material only gives up its own handle: its layer
     * textures belong to `scene.baked_layers` and stay alive with the scene.
     */
    pub fn release_retired<E: Engine>(&mut self, engine: &E, scene: &mut SceneGraph) {
        for material in std::mem::take(&mut scene.retired) {
            if material.is_baked() {
                self.release(engine, material.id, &material.label);
            } else {
                self.release_material(engine, material);
            }
        }
        for texture in std::mem::take(&mut scene.unused) {
            self.release_texture(engine, texture);
        }
    }

    /// Releases a resource that was loaded but never made it into a scene.
    pub fn release_orphan<E: Engine>(&mut self, engine: &E, resource: LoadedResource) {
        log::debug!("Releasing orphaned {:?} resource", resource.kind());
        match resource {
            LoadedResource::Mesh(node) => self.release_node(engine, node),
            LoadedResource::Texture(texture)
            | LoadedResource::Panorama(texture)
            | LoadedResource::Video(texture) => self.release_texture(engine, texture),
        }
    }

    fn release_scene<E: Engine>(&mut self, engine: &E, scene: SceneGraph) {
        let SceneGraph {
            root,
            environment,
            baked_layers,
            parked_videos,
            retired,
            unused,
            ..
        } = scene;

        self.release_node(engine, root);
        if let Some(environment) = environment {
            self.release_texture(engine, environment);
        }
        for (_, texture) in baked_layers {
            self.release_texture(engine, texture);
        }
        for ParkedVideo { texture, .. } in parked_videos {
            self.release_texture(engine, texture);
        }
        for material in retired {
            self.release_material(engine, material);
        }
        for texture in unused {
            self.release_texture(engine, texture);
        }
    }

    fn release_node<E: Engine>(&mut self, engine: &E, mut node: SceneNode) {
        if let Some(binding) = node.mesh.take() {
            self.release(engine, binding.geometry.id, &binding.geometry.label);
            for material in binding.materials {
                self.release_material(engine, material);
            }
        }
        for child in node.children.drain(..) {
            self.release_node(engine, child);
        }
        log::trace!("Detached {}", node.name);
    }

    fn release_material<E: Engine>(&mut self, engine: &E, material: Material) {
        self.release(engine, material.id, &material.label);
        for texture in material.textures {
            self.release_texture(engine, texture);
        }
    }

    fn release_texture<E: Engine>(&mut self, engine: &E, texture: Texture) {
        if self.released.contains(&texture.id) {
            return;
        }
        // a video must stop before its texture goes away
        if let Some(media) = &texture.media {
            if let Err(e) = media.pause() {
                log::error!("Failed to pause video {}: {:#}", texture.label, e);
            }
            if let Err(e) = media.detach() {
                log::error!("Failed to detach video {}: {:#}", texture.label, e);
            }
        }
        self.release(engine, texture.id, &texture.label);
    }

    fn release<E: Engine>(&mut self, engine: &E, id: ResourceId, label: &str) {
        if !self.released.insert(id) {
            log::trace!("{label} ({id}) is already released");
            return;
        }
        if let Err(e) = engine.release(id) {
            log::error!("Failed to release {label} ({id}): {:#}", e);
        }
    }
}
