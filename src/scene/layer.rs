// scene/layer.rs
use glam::Vec3;

use crate::renderer::Renderer;
use crate::resource::Handle;
use crate::scene::Camera;
use crate::spatial::ClippingBox;
use crate::{BufferIndex, BUFFER_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerBehavior {
    /// Drawn in depth index order.
    #[default]
    Ui,
    /// Drawn by distance from the camera, opaque first.
    ThreeD,
}

/// Maps a view-space position to the value items are sorted by.
pub type SortFunction = fn(Vec3) -> f32;

/// A node paired with one of its renderers, or with none for a scissor
/// clip that has nothing to draw itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderable {
    pub node: hecs::Entity,
    pub renderer: Option<Handle<Renderer>>,
}

impl Renderable {
    pub fn new(node: hecs::Entity, renderer: Option<Handle<Renderer>>) -> Self {
        Self { node, renderer }
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub behavior: LayerBehavior,
    pub sort_function: Option<SortFunction>,
    /// Window-space box everything in the layer is scissored to.
    pub clipping_box: Option<ClippingBox>,
    /// Hit testing stops at this layer even when nothing in it was hit.
    pub consumes_touch: bool,

    pub(crate) root: Option<hecs::Entity>,
    pub(crate) color_renderables: Vec<Renderable>,
    pub(crate) overlay_renderables: Vec<Renderable>,
    all_child_transforms_clean: [bool; BUFFER_COUNT],
    last_camera: Option<Handle<Camera>>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: LayerBehavior::Ui,
            sort_function: None,
            clipping_box: None,
            consumes_touch: false,
            root: None,
            color_renderables: Vec::new(),
            overlay_renderables: Vec::new(),
            all_child_transforms_clean: [false; BUFFER_COUNT],
            last_camera: None,
        }
    }

    pub fn with_behavior(mut self, behavior: LayerBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_sort_function(mut self, sort_function: SortFunction) -> Self {
        self.sort_function = Some(sort_function);
        self
    }

    pub fn with_clipping_box(mut self, clipping_box: ClippingBox) -> Self {
        self.clipping_box = Some(clipping_box);
        self
    }

    pub fn with_consumes_touch(mut self, consumes: bool) -> Self {
        self.consumes_touch = consumes;
        self
    }

    pub fn is_3d(&self) -> bool {
        self.behavior == LayerBehavior::ThreeD
    }

    pub fn is_clipping(&self) -> bool {
        self.clipping_box.is_some()
    }

    /// The actor this layer is attached to.
    pub fn root(&self) -> Option<hecs::Entity> {
        self.root
    }

    pub fn color_renderables(&self) -> &[Renderable] {
        &self.color_renderables
    }

    pub fn overlay_renderables(&self) -> &[Renderable] {
        &self.overlay_renderables
    }

    pub fn has_renderables(&self) -> bool {
        !self.color_renderables.is_empty() || !self.overlay_renderables.is_empty()
    }

    pub(crate) fn clear_renderables(&mut self) {
        self.color_renderables.clear();
        self.overlay_renderables.clear();
    }

    pub fn all_child_transforms_clean(&self, buffer: BufferIndex) -> bool {
        self.all_child_transforms_clean[buffer]
    }

    pub(crate) fn set_all_child_transforms_clean(&mut self, buffer: BufferIndex, clean: bool) {
        self.all_child_transforms_clean[buffer] = clean;
    }

    /// Whether last frame's render items are still valid for `camera`.
    ///
    /// Records `camera` as the last one asked about, so a second call with
    /// another camera fails.
    pub fn can_reuse_renderers(&mut self, camera: Handle<Camera>) -> bool {
        let reusable = self.all_child_transforms_clean.iter().all(|clean| *clean)
            && self.last_camera == Some(camera);
        self.last_camera = Some(camera);
        reusable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_needs_clean_buffers_and_same_camera() {
        let camera_a = Handle::new(0, 0);
        let camera_b = Handle::new(1, 0);
        let mut layer = Layer::new("ui");

        assert!(!layer.can_reuse_renderers(camera_a));

        layer.set_all_child_transforms_clean(0, true);
        assert!(!layer.can_reuse_renderers(camera_a));

        layer.set_all_child_transforms_clean(1, true);
        assert!(layer.can_reuse_renderers(camera_a));
        assert!(!layer.can_reuse_renderers(camera_b));
        assert!(layer.can_reuse_renderers(camera_b));
    }
}
