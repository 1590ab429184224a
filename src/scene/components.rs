// scene/components.rs
// hecs components of the actor tree. Everything the prepare pass writes is
// indexed by buffer.

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::Renderer;
use crate::resource::Handle;
use crate::scene::layer::Layer;
use crate::scene::Transform;
use crate::{BufferIndex, BUFFER_COUNT};

// ============================================================================
// Authored state
// ============================================================================

/// Local transform relative to the parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformComponent(pub Transform);

/// Actor size in local units. The actor is centred on its origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size(pub Vec3);

/// Local colour; alpha feeds opacity classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub Vec4);

impl Default for Color {
    fn default() -> Self {
        Self(Vec4::ONE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visible(pub bool);

impl Default for Visible {
    fn default() -> Self {
        Self(true)
    }
}

/// Whether the actor (and its subtree) takes part in hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sensitive(pub bool);

impl Default for Sensitive {
    fn default() -> Self {
        Self(true)
    }
}

/// Whether the application wants touch events on this actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchRequired(pub bool);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClippingMode {
    #[default]
    Disabled,
    /// Stencil clip of all descendants to this actor's geometry.
    ClipChildren,
    /// Scissor clip to this actor's window-space bounding box.
    ClipToBoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    #[default]
    Normal,
    /// Drawn after the layer's normal renderables and hit first.
    Overlay2D,
}

/// Author-assigned draw order hint of the actor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthIndex(pub i32);

/// Size of the area touched by the actor when it differs from its size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateSizeHint(pub Vec3);

/// Renderers attached to the actor, drawn in this order.
#[derive(Debug, Clone, Default)]
pub struct NodeRenderers(pub Vec<Handle<Renderer>>);

/// Marks the actor as the root of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerRoot(pub Handle<Layer>);

// ============================================================================
// Hierarchy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub hecs::Entity);

#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<hecs::Entity>);

#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

// ============================================================================
// Derived state, written by `Scene::update` and the prepare pass
// ============================================================================

/// World matrix per buffer and whether the last update changed it.
#[derive(Debug, Clone, Copy)]
pub struct WorldMatrix {
    matrices: [Mat4; BUFFER_COUNT],
    changed: bool,
}

impl WorldMatrix {
    pub(crate) fn new(matrix: Mat4) -> Self {
        Self {
            matrices: [matrix; BUFFER_COUNT],
            changed: true,
        }
    }

    pub fn get(&self, buffer: BufferIndex) -> Mat4 {
        self.matrices[buffer]
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Stores this frame's matrix; compares against the previous frame's.
    pub(crate) fn set(&mut self, buffer: BufferIndex, matrix: Mat4) {
        let previous = self.matrices[(buffer + BUFFER_COUNT - 1) % BUFFER_COUNT];
        self.changed = previous != matrix;
        self.matrices[buffer] = matrix;
    }
}

/// Colour multiplied down the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldColor(pub Vec4);

impl Default for WorldColor {
    fn default() -> Self {
        Self(Vec4::ONE)
    }
}

/// World-space bounding sphere; `w` is the radius.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere(pub Vec4);

impl BoundingSphere {
    pub fn center(&self) -> Vec3 {
        self.0.truncate()
    }

    pub fn radius(&self) -> f32 {
        self.0.w
    }
}

/// Result of the last frustum test, per buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Culled(pub [bool; BUFFER_COUNT]);

/// Depth-first position of the actor in its layer; later is on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortingDepth(pub i32);

/// Clipping information assigned while collecting renderables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClippingInfo {
    /// `(clipping id << 1) | !is_clipping`, or 0 outside any stencil clip.
    pub sort_modifier: u32,
    /// Number of stencil-clipping ancestors including self.
    pub clipping_depth: u32,
    /// Number of scissor-clipping ancestors including self.
    pub scissor_depth: u32,
}

impl ClippingInfo {
    pub fn clipping_id(&self) -> u32 {
        self.sort_modifier >> 1
    }
}
