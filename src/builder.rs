//! Incremental construction of the room's scene graph.
//!
//! Resources are attached one by one as the loader resolves them, in whatever
//! order they settle. Once every load has settled, [`SceneGraphBuilder::finalize`]
//! runs the baked material pass over the structure mesh:
//!
//! 1. meshes under a screen are left untouched
//! 2. wall-like meshes receive the shared [`BakedVariant::WallVariant`] material
//! 3. every other structure mesh receives the shared [`BakedVariant::Standard`] material
//!
//! The first matching rule wins.

use std::collections::HashSet;

use cgmath::Vector3;

use crate::{
    config::AmbientConfig,
    data_structures::{
        instance::Instance,
        material::{BakedVariant, Material, MaterialVariant},
        scene_graph::{NodeRole, Owner, ParkedVideo, SceneGraph, SceneNode},
    },
    engine::{Engine, LoadedResource, ResourceId, Texture},
    manifest::{AssetManifest, AssetRole, SceneMarkers},
};

/// Back faces of walls are tinted so that looking through a wall from outside
/// the room does not show the lit interior.
const WALL_BACK_FACE_COLOUR: [f32; 3] = [0.08, 0.08, 0.1];
const STEAM_QUAD_SIZE: f32 = 0.12;

pub struct SceneGraphBuilder<'a, E: Engine> {
    graph: &'a mut SceneGraph,
    engine: &'a E,
    manifest: &'a AssetManifest,
    ambient: &'a AmbientConfig,
}

impl<'a, E: Engine> SceneGraphBuilder<'a, E> {
    pub fn new(
        graph: &'a mut SceneGraph,
        engine: &'a E,
        manifest: &'a AssetManifest,
        ambient: &'a AmbientConfig,
    ) -> Self {
        Self {
            graph,
            engine,
            manifest,
            ambient,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn markers(&self) -> &'a SceneMarkers {
        self.manifest.markers()
    }

    /**
     * Attaches the resource loaded for asset `name`.
     *
     * Attaching a name a second time, an unknown name or a resource of the
     * wrong kind leaves the graph untouched and hands the resource back so the
     * caller can release it.
     */
    pub fn attach(&mut self, name: &str, resource: LoadedResource) -> Result<(), LoadedResource> {
        let manifest = self.manifest;
        let Some(entry) = manifest.get(name) else {
            log::warn!("Rejecting {name}: not part of the manifest");
            return Err(resource);
        };
        if self.graph.is_attached(name) {
            log::warn!("Rejecting {name}: already attached");
            return Err(resource);
        }
        if entry.role.expected_kind() != resource.kind() {
            log::warn!(
                "Rejecting {name}: expected {:?}, got {:?}",
                entry.role.expected_kind(),
                resource.kind()
            );
            return Err(resource);
        }

        match (entry.role.clone(), resource) {
            (AssetRole::Structure, LoadedResource::Mesh(mut node)) => {
                node.claim(NodeRole::Structural, Owner::Structure);
                tag_screens(&mut node, self.markers());
                self.graph.root.add_child(node);
                self.bind_parked_videos();
            }
            (AssetRole::Chair, LoadedResource::Mesh(mut node)) => {
                node.claim(NodeRole::Interactive, Owner::Chair);
                self.graph.root.add_child(node);
            }
            (AssetRole::Leds, LoadedResource::Mesh(mut node)) => {
                node.claim(NodeRole::Decorative, Owner::Leds);
                self.graph.root.add_child(node);
            }
            (AssetRole::Baked(layer), LoadedResource::Texture(texture)) => {
                self.graph.baked_layers.push((layer, texture));
            }
            (AssetRole::Environment, LoadedResource::Panorama(texture)) => {
                if let Some(previous) = self.graph.environment.replace(texture) {
                    self.graph.unused.push(previous);
                }
            }
            (AssetRole::Screen { target }, LoadedResource::Video(texture)) => {
                if let Some(media) = &texture.media {
                    if let Err(e) = media.play() {
                        log::warn!("Video {} does not play: {:#}", texture.label, e);
                    }
                }
                if self.graph.root.find(&target).is_some() {
                    self.bind_video(&target, texture);
                } else {
                    log::debug!("Parking video {} until {} is attached", texture.label, target);
                    self.graph.parked_videos.push(ParkedVideo { target, texture });
                }
            }
            (AssetRole::Steam, LoadedResource::Texture(texture)) => {
                self.build_steam(texture);
            }
            (_, resource) => return Err(resource),
        }

        self.graph.attached.insert(name.to_string());
        log::debug!("Attached {name}, {} nodes", self.graph.node_count());
        Ok(())
    }

    fn bind_parked_videos(&mut self) {
        let parked = std::mem::take(&mut self.graph.parked_videos);
        for ParkedVideo { target, texture } in parked {
            if self.graph.root.find(&target).is_some() {
                self.bind_video(&target, texture);
            } else {
                log::warn!("Screen {target} does not exist, video {} stays unused", texture.label);
                self.graph.unused.push(texture);
            }
        }
    }

    /// Binds one video material to every mesh below the node named `target`.
    fn bind_video(&mut self, target: &str, texture: Texture) {
        let material = match self.engine.create_material(
            &format!("video:{target}"),
            &MaterialVariant::Video,
            std::slice::from_ref(&texture),
        ) {
            Ok(material) => material,
            Err(e) => {
                log::warn!("No video material for {target}: {:#}", e);
                self.graph.unused.push(texture);
                return;
            }
        };

        let mut replaced = Vec::new();
        let mut bound = 0;
        if let Some(node) = self.graph.root.find_mut(target) {
            node.walk_mut(&mut |node| {
                if let Some(binding) = node.mesh.as_mut() {
                    replaced.extend(std::mem::replace(
                        &mut binding.materials,
                        vec![material.clone()],
                    ));
                    bound += 1;
                }
            });
        }
        if bound == 0 {
            log::warn!("Screen {target} has no mesh to show {} on", texture.label);
            self.graph.retired.push(material);
            return;
        }
        log::debug!("{target} -> {}", material.label);
        self.retire(replaced);
    }

    fn build_steam(&mut self, texture: Texture) {
        let ambient = self.ambient;
        let material = match self.engine.create_material(
            "steam",
            &MaterialVariant::Particle {
                opacity: ambient.steam_opacity,
            },
            std::slice::from_ref(&texture),
        ) {
            Ok(material) => material,
            Err(e) => {
                log::warn!("Steam is skipped: {:#}", e);
                self.graph.unused.push(texture);
                return;
            }
        };

        let mut steam = SceneNode::container("steam");
        steam.transform = Instance::from_position(ambient.steam_origin.into());
        let count = ambient.steam_particles.max(1);
        let spacing = ambient.steam_height / count as f32;
        for i in 0..count {
            let label = format!("steam_{i}");
            let quad = match self
                .engine
                .create_quad(&label, STEAM_QUAD_SIZE, STEAM_QUAD_SIZE)
            {
                Ok(quad) => quad,
                Err(e) => {
                    log::warn!("Steam particle {label} is skipped: {:#}", e);
                    break;
                }
            };
            let mut particle = SceneNode::with_mesh(label, quad, vec![material.clone()]);
            // alternate sides so the column does not look like a ladder
            let sway = if i % 2 == 0 { 0.015 } else { -0.015 };
            particle.transform = Instance::from_position(Vector3::new(sway, i as f32 * spacing, 0.0));
            steam.add_child(particle);
        }

        if steam.children.is_empty() {
            self.graph.retired.push(material);
            return;
        }
        steam.claim(NodeRole::Decorative, Owner::Steam);
        self.graph.root.add_child(steam);
    }

    /**
     * Runs the baked material pass. Returns the number of meshes that were
     * assigned a baked material.
     *
     * Without baked layers the structure keeps the materials it was loaded with.
     */
    pub fn finalize(&mut self) -> usize {
        for ParkedVideo { target, texture } in std::mem::take(&mut self.graph.parked_videos) {
            log::warn!("Screen {target} never arrived, video {} stays unused", texture.label);
            self.graph.unused.push(texture);
        }

        if self.graph.baked_layers.is_empty() {
            log::info!("No baked layers loaded, the structure keeps its own materials");
            return 0;
        }
        let mut layers = self.graph.baked_layers.clone();
        layers.sort_by_key(|(layer, _)| *layer);
        let textures: Vec<Texture> = layers.into_iter().map(|(_, texture)| texture).collect();

        let markers = self.markers();
        let mut needs_wall = false;
        let mut needs_standard = false;
        if let Some(structure) = self.graph.subtree(Owner::Structure) {
            structure.walk(&mut |node| {
                if node.mesh.is_none() || node.role == NodeRole::Screen {
                    return;
                }
                if markers.is_structural(&node.name) {
                    needs_wall = true;
                } else if node.owner == Owner::Structure {
                    needs_standard = true;
                }
            });
        }

        // both variants sample the layer textures held by `baked_layers`
        let wall = if needs_wall {
            self.engine
                .create_material(
                    "baked-wall",
                    &MaterialVariant::Baked(BakedVariant::WallVariant {
                        back_face_colour: WALL_BACK_FACE_COLOUR,
                    }),
                    &textures,
                )
                .inspect_err(|e| log::warn!("Walls fall back to the standard baked material: {:#}", e))
                .ok()
        } else {
            None
        };
        let standard = if needs_standard || (needs_wall && wall.is_none()) {
            self.engine
                .create_material(
                    "baked",
                    &MaterialVariant::Baked(BakedVariant::Standard),
                    &textures,
                )
                .inspect_err(|e| log::warn!("Baked material could not be created: {:#}", e))
                .ok()
        } else {
            None
        };

        let mut assigned = 0;
        let mut replaced = Vec::new();
        if let Some(structure) = self
            .graph
            .root
            .children
            .iter_mut()
            .find(|child| child.owner == Owner::Structure)
        {
            structure.walk_mut(&mut |node| {
                let Some(binding) = node.mesh.as_mut() else {
                    return;
                };
                let material = if node.role == NodeRole::Screen {
                    return;
                } else if markers.is_structural(&node.name) {
                    wall.as_ref().or(standard.as_ref())
                } else if node.owner == Owner::Structure {
                    standard.as_ref()
                } else {
                    return;
                };
                let Some(material) = material else {
                    return;
                };
                log::debug!("{} -> {}", node.name, material.label);
                replaced.extend(std::mem::replace(
                    &mut binding.materials,
                    vec![material.clone()],
                ));
                assigned += 1;
            });
        }

        self.retire(replaced);
        log::info!("Baked material pass assigned {assigned} meshes");
        assigned
    }

    /// Hands replaced materials over for release unless a node still draws with them.
    fn retire(&mut self, materials: Vec<Material>) {
        let mut in_use = HashSet::new();
        self.graph.root.walk(&mut |node| {
            if let Some(binding) = &node.mesh {
                in_use.extend(binding.materials.iter().map(|material| material.id));
            }
        });
        let mut seen: HashSet<ResourceId> =
            self.graph.retired.iter().map(|material| material.id).collect();
        for material in materials {
            if !in_use.contains(&material.id) && seen.insert(material.id) {
                self.graph.retired.push(material);
            }
        }
    }
}

/// Everything at and below a node whose name carries the screen marker is a screen.
fn tag_screens(node: &mut SceneNode, markers: &SceneMarkers) {
    if markers.is_screen(&node.name) {
        node.claim(NodeRole::Screen, Owner::Screens);
        return;
    }
    for child in node.children.iter_mut() {
        tag_screens(child, markers);
    }
}
