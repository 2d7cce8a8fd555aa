use std::io::{BufReader, Cursor};

use anyhow::{Context as _, bail};

use crate::{
    data_structures::{
        instance::Instance,
        material::{Material, MaterialVariant},
        scene_graph::SceneNode,
    },
    engine::{Geometry, ResourceId, Texture},
    gpu::{
        texture::GpuTexture,
        upload::{GpuResource, ModelVertex, Registry, Uploader},
    },
    resources::fetch::{self, load_binary},
};

const DRACO: &str = "KHR_draco_mesh_compression";

/**
 * Loads a glTF/GLB file into a node tree whose geometry, materials and
 * textures are registered with `registry`.
 *
 * Draco-compressed files are rejected so that the caller can fall back to an
 * uncompressed copy. On error nothing stays registered.
 */
pub async fn load_scene(
    path: &str,
    uploader: &Uploader,
    registry: &Registry,
) -> anyhow::Result<SceneNode> {
    let mut created = Vec::new();
    match load(path, uploader, registry, &mut created).await {
        Ok(node) => Ok(node),
        Err(e) => {
            for id in created {
                if let Err(e) = registry.destroy(id) {
                    log::warn!("Unable to roll back {path}: {e}");
                }
            }
            Err(e)
        }
    }
}

async fn load(
    path: &str,
    uploader: &Uploader,
    registry: &Registry,
    created: &mut Vec<ResourceId>,
) -> anyhow::Result<SceneNode> {
    let gltf_bytes = load_binary(path).await?;
    let gltf_reader = BufReader::new(Cursor::new(gltf_bytes));
    let gltf = gltf::Gltf::from_reader(gltf_reader).with_context(|| format!("{path} is not glTF"))?;

    if gltf.extensions_used().any(|ext| ext == DRACO) {
        bail!("{path} uses {DRACO}, which is not supported");
    }

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{path} has no binary chunk"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(load_binary(&fetch::sibling(path, uri)).await?);
            }
        }
    }

    // Load materials
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let label = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}#{}", fetch::stem(path), materials.len()));

        let mut textures = Vec::new();
        if let Some(info) = pbr.base_color_texture() {
            let gpu_texture = match info.texture().source().source() {
                gltf::image::Source::View { view, mime_type } => {
                    let data = buffer_data
                        .get(view.buffer().index())
                        .and_then(|buffer| buffer.get(view.offset()..view.offset() + view.length()))
                        .with_context(|| format!("{label}: image view out of bounds"))?;
                    GpuTexture::from_bytes(
                        &uploader.device,
                        &uploader.queue,
                        data,
                        &label,
                        mime_type.split('/').next_back(),
                    )?
                }
                gltf::image::Source::Uri { uri, mime_type } => {
                    let uri = fetch::sibling(path, uri);
                    let data = load_binary(&uri).await?;
                    let ext = fetch::extension(&uri);
                    let format = mime_type
                        .and_then(|mt| mt.split('/').next_back())
                        .or(ext.as_deref());
                    GpuTexture::from_bytes(&uploader.device, &uploader.queue, &data, &uri, format)?
                }
            };
            let view = gpu_texture.view.clone();
            let id = registry.insert(GpuResource::Texture(gpu_texture));
            created.push(id);
            textures.push((Texture::new(id, label.clone()), view));
        }

        let variant = MaterialVariant::Native {
            base_colour: pbr.base_color_factor(),
        };
        let gpu_material =
            uploader.create_material(&label, &variant, textures.first().map(|(_, view)| view));
        let id = registry.insert(GpuResource::Material(gpu_material));
        created.push(id);
        materials.push(Material {
            id,
            label,
            variant,
            textures: textures.into_iter().map(|(texture, _)| texture).collect(),
        });
    }

    let mut builder = NodeBuilder {
        path,
        buffers: &buffer_data,
        materials,
        fallback: None,
        uploader,
        registry,
        created,
    };

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{path} contains no scene"))?;
    let mut roots = Vec::new();
    for node in scene.nodes() {
        roots.push(builder.node(node)?);
    }

    let root = if roots.len() == 1 {
        roots.remove(0)
    } else {
        let mut root = SceneNode::container(fetch::stem(path));
        root.children = roots;
        root
    };
    Ok(root)
}

struct NodeBuilder<'a> {
    path: &'a str,
    buffers: &'a [Vec<u8>],
    materials: Vec<Material>,
    /// Shared by primitives that reference no material.
    fallback: Option<Material>,
    uploader: &'a Uploader,
    registry: &'a Registry,
    created: &'a mut Vec<ResourceId>,
}

impl NodeBuilder<'_> {
    fn node(&mut self, node: gltf::scene::Node) -> anyhow::Result<SceneNode> {
        let name = node
            .name()
            .or_else(|| node.mesh().and_then(|mesh| mesh.name()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));

        let mut primitives = Vec::new();
        if let Some(mesh) = node.mesh() {
            for (i, primitive) in mesh.primitives().enumerate() {
                let label = if i == 0 { name.clone() } else { format!("{name}.{i}") };
                if let Some(prim) = self.primitive(&label, &primitive)? {
                    primitives.push(prim);
                }
            }
        }

        let mut primitives = primitives.into_iter();
        let mut scene_node = match primitives.next() {
            Some((geometry, material)) => SceneNode::with_mesh(name.clone(), geometry, vec![material]),
            None => SceneNode::container(name.clone()),
        };
        for (i, (geometry, material)) in primitives.enumerate() {
            scene_node.add_child(SceneNode::with_mesh(
                format!("{name}.{}", i + 1),
                geometry,
                vec![material],
            ));
        }

        let (translation, rotation, scale) = node.transform().decomposed();
        scene_node.transform = Instance {
            position: translation.into(),
            rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
            scale: scale.into(),
        };

        for child in node.children() {
            let child = self.node(child)?;
            scene_node.add_child(child);
        }
        Ok(scene_node)
    }

    fn primitive(
        &mut self,
        label: &str,
        primitive: &gltf::Primitive,
    ) -> anyhow::Result<Option<(Geometry, Material)>> {
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

        let Some(positions) = reader.read_positions() else {
            log::warn!("{}: primitive {label} has no positions", self.path);
            return Ok(None);
        };
        let mut vertices: Vec<ModelVertex> = positions
            .map(|position| ModelVertex {
                position,
                ..Default::default()
            })
            .collect();
        if let Some(normals) = reader.read_normals() {
            for (vertex, normal) in vertices.iter_mut().zip(normals) {
                vertex.normal = normal;
            }
        }
        if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
            for (vertex, tex_coord) in vertices.iter_mut().zip(tex_coords) {
                vertex.tex_coords = tex_coord;
            }
        }
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };

        let mesh = self.uploader.upload_mesh(label, &vertices, &indices);
        let id = self.registry.insert(GpuResource::Geometry(mesh));
        self.created.push(id);
        let geometry = Geometry {
            id,
            label: label.to_string(),
        };

        let material = match primitive.material().index() {
            Some(index) => self
                .materials
                .get(index)
                .cloned()
                .with_context(|| format!("{label}: unknown material {index}"))?,
            None => self.fallback_material(),
        };
        Ok(Some((geometry, material)))
    }

    fn fallback_material(&mut self) -> Material {
        if let Some(material) = &self.fallback {
            return material.clone();
        }
        let variant = MaterialVariant::Native {
            base_colour: [1.0; 4],
        };
        let label = format!("{}#default", fetch::stem(self.path));
        let gpu_material = self.uploader.create_material(&label, &variant, None);
        let id = self.registry.insert(GpuResource::Material(gpu_material));
        self.created.push(id);
        let material = Material {
            id,
            label,
            variant,
            textures: Vec::new(),
        };
        self.fallback = Some(material.clone());
        material
    }
}
