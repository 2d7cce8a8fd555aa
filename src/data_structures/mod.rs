//! Scene data structures: transforms, materials and the scene graph.
//!
//! - `instance` holds per-node transformation data
//! - `material` contains material descriptors and the baked material variants
//! - `scene_graph` enables hierarchical scene organization

pub mod instance;
pub mod material;
pub mod scene_graph;
