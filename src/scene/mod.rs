// scene/mod.rs

pub mod builder;
pub mod camera;
pub mod components;
pub(crate) mod internal;
pub mod layer;
pub mod render_task;
pub mod scene;
pub mod transform;

// Re-export commonly used types
pub use builder::{attach_child, detach_child, ActorBuilder};
pub use camera::{Camera, Projection};
pub use internal::transforms::SORTED_DEPTH_MULTIPLIER;
pub use layer::{Layer, LayerBehavior, Renderable, SortFunction};
pub use render_task::{check_exclusivity, RenderTask, RenderTaskList, ScreenToFrameBuffer};
pub use scene::{find_layer, Scene};
pub use transform::{Inherit, Transform};

// Re-export all components
pub use components::{
    BoundingSphere, Children, ClippingInfo, ClippingMode, Color, Culled, DepthIndex, DrawMode,
    LayerRoot, Name, NodeRenderers, Parent, Sensitive, Size, SortingDepth, TouchRequired,
    TransformComponent, UpdateSizeHint, Visible, WorldColor, WorldMatrix,
};
