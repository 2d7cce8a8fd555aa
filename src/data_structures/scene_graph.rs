//! Scene graph and hierarchical scene organization.
//!
//! The graph is a tree of [`SceneNode`]s below a single root container. Each
//! node records which [`NodeRole`] it plays and which feature ([`Owner`]) owns
//! its subtree. Mesh nodes hold a [`MeshBinding`] of GPU handles.
//!
//! Insertion into and removal from the root is reserved to the
//! [`SceneGraphBuilder`](crate::builder::SceneGraphBuilder) and the
//! [`DisposalManager`](crate::disposal::DisposalManager). Feature animators
//! only receive their own subtree.

use std::collections::HashSet;

use crate::{
    data_structures::{
        instance::Instance,
        material::{BakedLayer, Material},
    },
    engine::{Geometry, Texture},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Structural,
    Interactive,
    Screen,
    Decorative,
}

/// The feature responsible for a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    Root,
    Structure,
    Screens,
    Chair,
    Leds,
    Steam,
}

/// Geometry plus the material(s) it is drawn with.
#[derive(Clone, Debug)]
pub struct MeshBinding {
    pub geometry: Geometry,
    pub materials: Vec<Material>,
}

#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    pub role: NodeRole,
    pub owner: Owner,
    pub transform: Instance,
    pub visible: bool,
    pub mesh: Option<MeshBinding>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// A node without geometry that only groups children.
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: NodeRole::Structural,
            owner: Owner::Root,
            transform: Instance::new(),
            visible: true,
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn with_mesh(name: impl Into<String>, geometry: Geometry, materials: Vec<Material>) -> Self {
        Self {
            mesh: Some(MeshBinding {
                geometry,
                materials,
            }),
            ..Self::container(name)
        }
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(name))
    }

    pub fn walk(&self, visit: &mut dyn FnMut(&SceneNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut SceneNode)) {
        visit(self);
        for child in self.children.iter_mut() {
            child.walk_mut(visit);
        }
    }

    /// Assigns `role` and `owner` to the whole subtree.
    pub fn claim(&mut self, role: NodeRole, owner: Owner) {
        self.walk_mut(&mut |node| {
            node.role = role;
            node.owner = owner;
        });
    }

    /**
     * Visits every visible node together with its world transform.
     *
     * Invisible nodes hide their whole subtree.
     */
    pub fn visit_world(&self, parent: &Instance, visit: &mut dyn FnMut(&SceneNode, &Instance)) {
        if !self.visible {
            return;
        }
        let world = parent * &self.transform;
        visit(self, &world);
        for child in &self.children {
            child.visit_world(&world, visit);
        }
    }
}

/// A video waiting for the screen mesh it should be shown on.
#[derive(Debug)]
pub struct ParkedVideo {
    pub target: String,
    pub texture: Texture,
}

/**
 * The live scene: the root container plus resources that are held by the
 * scene without being bound to a node.
 */
#[derive(Debug)]
pub struct SceneGraph {
    pub root: SceneNode,
    pub environment: Option<Texture>,
    pub baked_layers: Vec<(BakedLayer, Texture)>,
    pub parked_videos: Vec<ParkedVideo>,
    /// Materials replaced by the builder that still need to be released.
    pub retired: Vec<Material>,
    /// Textures that ended up without a consumer and still need to be released.
    pub unused: Vec<Texture>,
    pub(crate) attached: HashSet<String>,
}

impl SceneGraph {
    pub const ROOT_NAME: &'static str = "room";

    pub fn new() -> Self {
        Self {
            root: SceneNode::container(Self::ROOT_NAME),
            environment: None,
            baked_layers: Vec::new(),
            parked_videos: Vec::new(),
            retired: Vec::new(),
            unused: Vec::new(),
            attached: HashSet::new(),
        }
    }

    /// Number of nodes below (and including) the root container.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn is_attached(&self, asset: &str) -> bool {
        self.attached.contains(asset)
    }

    /// The direct child of the root owned by `owner`.
    pub fn subtree(&self, owner: Owner) -> Option<&SceneNode> {
        self.root.children.iter().find(|child| child.owner == owner)
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
