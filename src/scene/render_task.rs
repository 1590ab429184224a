// scene/render_task.rs
use std::collections::HashMap;

use glam::{Vec2, Vec4};

use crate::renderer::RenderTarget;
use crate::resource::{Handle, ResourceCache};
use crate::scene::components::Parent;
use crate::scene::Camera;
use crate::spatial::Viewport;

/// Converts a screen point to the frame buffer of an off-screen task, or
/// `None` when the point does not land on it.
pub type ScreenToFrameBuffer = fn(Vec2) -> Option<Vec2>;

/// Render this source subtree through this camera into this target.
#[derive(Debug, Clone)]
pub struct RenderTask {
    pub source: hecs::Entity,
    pub camera: Handle<Camera>,
    pub viewport: Option<Viewport>,
    pub clear_color: Option<Vec4>,
    /// `None` renders on screen.
    pub render_target: Option<Handle<RenderTarget>>,
    pub culling_enabled: bool,
    /// Rendering stops after this node's items.
    pub stopper: Option<hecs::Entity>,
    /// The source subtree is drawn and hit only by this task.
    pub exclusive: bool,
    /// Off-screen tasks only take part in hit testing when set.
    pub input_enabled: bool,
    pub screen_to_frame_buffer: Option<ScreenToFrameBuffer>,
}

impl RenderTask {
    pub fn new(source: hecs::Entity, camera: Handle<Camera>) -> Self {
        Self {
            source,
            camera,
            viewport: None,
            clear_color: None,
            render_target: None,
            culling_enabled: true,
            stopper: None,
            exclusive: false,
            input_enabled: true,
            screen_to_frame_buffer: None,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_clear_color(mut self, color: Vec4) -> Self {
        self.clear_color = Some(color);
        self
    }

    pub fn with_render_target(mut self, target: Handle<RenderTarget>) -> Self {
        self.render_target = Some(target);
        self
    }

    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.culling_enabled = enabled;
        self
    }

    pub fn with_stopper(mut self, stopper: hecs::Entity) -> Self {
        self.stopper = Some(stopper);
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_input_enabled(mut self, enabled: bool) -> Self {
        self.input_enabled = enabled;
        self
    }

    pub fn with_screen_to_frame_buffer(mut self, convert: ScreenToFrameBuffer) -> Self {
        self.screen_to_frame_buffer = Some(convert);
        self
    }

    pub fn is_offscreen(&self) -> bool {
        self.render_target.is_some()
    }
}

/// Ordered render tasks. Earlier tasks draw first.
#[derive(Default)]
pub struct RenderTaskList {
    tasks: ResourceCache<RenderTask>,
    order: Vec<Handle<RenderTask>>,
}

impl RenderTaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: RenderTask) -> Handle<RenderTask> {
        let handle = self.tasks.insert(task);
        self.order.push(handle);
        handle
    }

    pub fn remove(&mut self, handle: Handle<RenderTask>) -> Option<RenderTask> {
        self.order.retain(|h| *h != handle);
        self.tasks.remove(handle)
    }

    pub fn get(&self, handle: Handle<RenderTask>) -> Option<&RenderTask> {
        self.tasks.get(handle)
    }

    pub fn get_mut(&mut self, handle: Handle<RenderTask>) -> Option<&mut RenderTask> {
        self.tasks.get_mut(handle)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tasks in draw order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Handle<RenderTask>, &RenderTask)> + '_ {
        self.order
            .iter()
            .filter_map(|&handle| self.tasks.get(handle).map(|task| (handle, task)))
    }

    /// Source actors claimed by exclusive tasks.
    pub fn exclusives(&self) -> HashMap<hecs::Entity, Handle<RenderTask>> {
        self.iter()
            .filter(|(_, task)| task.exclusive)
            .map(|(handle, task)| (task.source, handle))
            .collect()
    }
}

/// False when `node` or an ancestor is exclusive to a task other than `task`.
pub fn check_exclusivity(
    world: &hecs::World,
    exclusives: &HashMap<hecs::Entity, Handle<RenderTask>>,
    node: hecs::Entity,
    task: Handle<RenderTask>,
) -> bool {
    let mut current = Some(node);
    while let Some(entity) = current {
        if let Some(owner) = exclusives.get(&entity) {
            return *owner == task;
        }
        current = world.get::<&Parent>(entity).ok().map(|parent| parent.0);
    }
    true
}
