// scene/builder.rs
// Fluent helper for spawning actors with every component the update and
// prepare passes read.

use glam::{Mat4, Quat, Vec3, Vec4};
use hecs::World;

use super::components::*;
use crate::renderer::Renderer;
use crate::resource::Handle;
use crate::scene::{Inherit, Transform};

pub struct ActorBuilder<'w> {
    world: &'w mut World,
    builder: hecs::EntityBuilder,
    transform: Transform,
    size: Vec3,
    color: Vec4,
    visible: bool,
    sensitive: bool,
    touch_required: bool,
    clipping_mode: ClippingMode,
    draw_mode: DrawMode,
    depth_index: i32,
    renderers: Vec<Handle<Renderer>>,
    parent: Option<hecs::Entity>,
}

impl<'w> ActorBuilder<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            builder: hecs::EntityBuilder::new(),
            transform: Transform::IDENTITY,
            size: Vec3::ZERO,
            color: Vec4::ONE,
            visible: true,
            sensitive: true,
            touch_required: false,
            clipping_mode: ClippingMode::Disabled,
            draw_mode: DrawMode::Normal,
            depth_index: 0,
            renderers: Vec::new(),
            parent: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.builder.add(Name::new(name));
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.translation = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transform.scale = scale;
        self
    }

    pub fn with_inherit(mut self, inherit: Inherit) -> Self {
        self.transform.inherit = inherit;
        self
    }

    pub fn with_size(mut self, size: Vec3) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }

    /// Marks the actor as wanting touch events.
    pub fn touchable(mut self) -> Self {
        self.touch_required = true;
        self
    }

    pub fn with_clipping_mode(mut self, mode: ClippingMode) -> Self {
        self.clipping_mode = mode;
        self
    }

    pub fn with_draw_mode(mut self, mode: DrawMode) -> Self {
        self.draw_mode = mode;
        self
    }

    pub fn with_depth_index(mut self, depth_index: i32) -> Self {
        self.depth_index = depth_index;
        self
    }

    pub fn with_update_size_hint(mut self, size: Vec3) -> Self {
        self.builder.add(UpdateSizeHint(size));
        self
    }

    pub fn with_renderer(mut self, renderer: Handle<Renderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn child_of(mut self, parent: hecs::Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Spawn the actor into the world, linked under its parent if one was set.
    pub fn spawn(mut self) -> hecs::Entity {
        self.builder
            .add(TransformComponent(self.transform))
            .add(Size(self.size))
            .add(Color(self.color))
            .add(Visible(self.visible))
            .add(Sensitive(self.sensitive))
            .add(TouchRequired(self.touch_required))
            .add(self.clipping_mode)
            .add(self.draw_mode)
            .add(DepthIndex(self.depth_index))
            .add(NodeRenderers(self.renderers))
            .add(Children::default())
            .add(WorldMatrix::new(Mat4::IDENTITY))
            .add(WorldColor::default())
            .add(BoundingSphere::default())
            .add(Culled::default())
            .add(SortingDepth::default())
            .add(ClippingInfo::default());

        let entity = self.world.spawn(self.builder.build());
        if let Some(parent) = self.parent {
            attach_child(self.world, parent, entity);
        }
        entity
    }
}

/// Links `child` under `parent`, detaching it from any previous parent.
pub fn attach_child(world: &mut World, parent: hecs::Entity, child: hecs::Entity) {
    detach_child(world, child);
    if world.insert_one(child, Parent(parent)).is_err() {
        log::error!("Cannot attach despawned entity {:?}", child);
        return;
    }
    let mut children_missing = false;
    match world.get::<&mut Children>(parent) {
        Ok(mut children) => children.0.push(child),
        Err(_) => children_missing = true,
    }
    if children_missing {
        if let Err(e) = world.insert_one(parent, Children(vec![child])) {
            log::error!("Failed to insert Children for entity {:?}: {:?}", parent, e);
        }
    }
}

/// Unlinks `child` from its parent. The child keeps its own subtree.
pub fn detach_child(world: &mut World, child: hecs::Entity) {
    let parent = match world.get::<&Parent>(child) {
        Ok(parent) => parent.0,
        Err(_) => return,
    };
    if let Ok(mut children) = world.get::<&mut Children>(parent) {
        children.0.retain(|c| *c != child);
    }
    world.remove_one::<Parent>(child).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_actor_has_derived_components() {
        let mut world = World::new();
        let actor = ActorBuilder::new(&mut world)
            .with_name("box")
            .with_size(Vec3::new(10.0, 10.0, 0.0))
            .spawn();
        assert!(world.get::<&WorldMatrix>(actor).is_ok());
        assert!(world.get::<&Culled>(actor).is_ok());
        assert_eq!(world.get::<&Size>(actor).map(|s| s.0).ok(), Some(Vec3::new(10.0, 10.0, 0.0)));
    }

    #[test]
    fn reparenting_moves_the_child() {
        let mut world = World::new();
        let a = ActorBuilder::new(&mut world).spawn();
        let b = ActorBuilder::new(&mut world).spawn();
        let child = ActorBuilder::new(&mut world).child_of(a).spawn();

        attach_child(&mut world, b, child);
        assert!(world.get::<&Children>(a).map(|c| c.0.is_empty()).unwrap_or(false));
        assert_eq!(world.get::<&Children>(b).map(|c| c.0.clone()).ok(), Some(vec![child]));
        assert_eq!(world.get::<&Parent>(child).map(|p| p.0).ok(), Some(b));
    }
}
