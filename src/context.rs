//! Everything a live room holds on to between `initialize` and disposal.

use crate::{
    camera::CameraRig,
    data_structures::scene_graph::SceneGraph,
    engine::{FrameHandle, RendererHandle},
    features::FeatureAnimator,
};

/// The typed set of handles owned by one initialized scene.
///
/// Every field is optional so that a partially built scene can be torn down
/// with the same code path as a complete one. The
/// [`DisposalManager`](crate::disposal::DisposalManager) empties it.
#[derive(Default)]
pub struct SceneContext {
    pub renderer: Option<RendererHandle>,
    pub rig: Option<CameraRig>,
    pub scene: Option<SceneGraph>,
    pub animators: Vec<Box<dyn FeatureAnimator>>,
    /// The scheduled render loop frame.
    pub frame: Option<FrameHandle>,
}

impl SceneContext {
    pub fn is_empty(&self) -> bool {
        self.renderer.is_none()
            && self.rig.is_none()
            && self.scene.is_none()
            && self.animators.is_empty()
            && self.frame.is_none()
    }
}
