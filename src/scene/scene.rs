// scene/scene.rs
use std::collections::HashSet;

use glam::{Vec2, Vec3};
use hecs::World;

use super::builder::{attach_child, ActorBuilder};
use super::components::*;
use super::internal::transforms::propagate_transforms;
use super::layer::Layer;
use super::render_task::{RenderTask, RenderTaskList};
use crate::renderer::Renderer;
use crate::resource::{Handle, ResourceCache};
use crate::scene::Camera;
use crate::spatial::ClippingBox;
use crate::{BufferIndex, BUFFER_COUNT};

/// The update-side scene: the actor tree plus the renderers, layers,
/// cameras and render tasks that refer into it.
pub struct Scene {
    pub world: World,
    pub renderers: ResourceCache<Renderer>,
    pub layers: ResourceCache<Layer>,
    pub cameras: ResourceCache<Camera>,
    pub tasks: RenderTaskList,
    size: Vec2,
    root: hecs::Entity,
    root_layer: Handle<Layer>,
    default_camera: Handle<Camera>,
    default_task: Handle<RenderTask>,
    layer_order: Vec<Handle<Layer>>,
    /// Layers whose renderers changed since the last update.
    pending_dirty_layers: HashSet<Handle<Layer>>,
}

impl Scene {
    /// Scene of `size` pixels with a root layer, the 2D camera and one
    /// on-screen task covering the whole window.
    pub fn new(size: Vec2) -> Self {
        let mut world = World::new();
        let mut layers = ResourceCache::new();
        let mut cameras = ResourceCache::new();
        let mut tasks = RenderTaskList::new();

        let root_layer = layers.insert(Layer::new("RootLayer"));
        let root = ActorBuilder::new(&mut world)
            .with_name("RootLayer")
            .with_size(size.extend(0.0))
            .spawn();
        world.insert_one(root, LayerRoot(root_layer)).ok();
        if let Some(layer) = layers.get_mut(root_layer) {
            layer.root = Some(root);
        }

        let default_camera = cameras.insert(Camera::for_scene_2d(size));
        let default_task = tasks.add(
            RenderTask::new(root, default_camera).with_viewport(ClippingBox::new(
                0,
                0,
                size.x as i32,
                size.y as i32,
            )),
        );

        log::info!("Created scene {}x{}", size.x, size.y);

        Self {
            world,
            renderers: ResourceCache::new(),
            layers,
            cameras,
            tasks,
            size,
            root,
            root_layer,
            default_camera,
            default_task,
            layer_order: vec![root_layer],
            pending_dirty_layers: HashSet::new(),
        }
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn root(&self) -> hecs::Entity {
        self.root
    }

    pub fn root_layer(&self) -> Handle<Layer> {
        self.root_layer
    }

    pub fn default_camera(&self) -> Handle<Camera> {
        self.default_camera
    }

    pub fn default_task(&self) -> Handle<RenderTask> {
        self.default_task
    }

    /// Layers back to front, as of the last [`update`](Self::update).
    pub fn layer_order(&self) -> &[Handle<Layer>] {
        &self.layer_order
    }

    pub fn add_renderer(&mut self, renderer: Renderer) -> Handle<Renderer> {
        self.renderers.insert(renderer)
    }

    /// Mutable access to a renderer. Every layer drawing it rebuilds its
    /// render lists instead of reusing them.
    ///
    /// Changes made through `renderers` directly are not tracked.
    pub fn renderer_mut(&mut self, handle: Handle<Renderer>) -> Option<&mut Renderer> {
        if self.renderers.contains(handle) {
            let users: Vec<hecs::Entity> = self
                .world
                .query::<&NodeRenderers>()
                .iter()
                .filter(|(_, renderers)| renderers.0.contains(&handle))
                .map(|(entity, _)| entity)
                .collect();
            for entity in users {
                if let Some(layer) = find_layer(&self.world, entity) {
                    self.pending_dirty_layers.insert(layer);
                }
            }
        }
        self.renderers.get_mut(handle)
    }

    pub fn add_camera(&mut self, camera: Camera) -> Handle<Camera> {
        self.cameras.insert(camera)
    }

    pub fn add_task(&mut self, task: RenderTask) -> Handle<RenderTask> {
        self.tasks.add(task)
    }

    /// Starts an actor that will be attached under `parent`.
    pub fn actor(&mut self, parent: hecs::Entity) -> ActorBuilder<'_> {
        ActorBuilder::new(&mut self.world).child_of(parent)
    }

    /// Adds a layer whose actor sits under `parent`. Later layers draw on top
    /// of earlier siblings.
    pub fn add_layer(&mut self, layer: Layer, parent: hecs::Entity) -> (Handle<Layer>, hecs::Entity) {
        let name = layer.name.clone();
        let handle = self.layers.insert(layer);
        let actor = ActorBuilder::new(&mut self.world)
            .with_name(name)
            .with_size(self.size.extend(0.0))
            .child_of(parent)
            .spawn();
        self.world.insert_one(actor, LayerRoot(handle)).ok();
        if let Some(layer) = self.layers.get_mut(handle) {
            layer.root = Some(actor);
        }
        (handle, actor)
    }

    pub fn add_child(&mut self, parent: hecs::Entity, child: hecs::Entity) {
        attach_child(&mut self.world, parent, child);
    }

    /// Nearest layer at or above `node`.
    pub fn find_layer(&self, node: hecs::Entity) -> Option<Handle<Layer>> {
        find_layer(&self.world, node)
    }

    pub fn set_position(&mut self, node: hecs::Entity, position: Vec3) {
        if let Ok(mut transform) = self.world.get::<&mut TransformComponent>(node) {
            transform.0.translation = position;
        }
    }

    pub fn set_color(&mut self, node: hecs::Entity, color: glam::Vec4) {
        if let Ok(mut c) = self.world.get::<&mut Color>(node) {
            c.0 = color;
        }
    }

    pub fn set_visible(&mut self, node: hecs::Entity, visible: bool) {
        if let Ok(mut v) = self.world.get::<&mut Visible>(node) {
            v.0 = visible;
        }
    }

    /// Whether the last prepare pass culled `node` in `buffer`.
    pub fn is_culled(&self, node: hecs::Entity, buffer: BufferIndex) -> bool {
        self.world
            .get::<&Culled>(node)
            .map(|c| c.0[buffer])
            .unwrap_or(false)
    }

    /// Update phase for `buffer`: cameras, world matrices and colours,
    /// bounding spheres, sorting depths and layer clean flags.
    pub fn update(&mut self, buffer: BufferIndex) {
        assert!(buffer < BUFFER_COUNT, "buffer index {} out of range", buffer);

        for (_, camera) in self.cameras.iter_mut() {
            camera.update(buffer);
        }

        let pass = propagate_transforms(&mut self.world, buffer);
        // A dirty flag stays in `buffer` until its next update, so draining the
        // pending set here keeps the other buffer from reusing its older list.
        for (handle, layer) in self.layers.iter_mut() {
            let clean = !pass.dirty_layers.contains(&handle)
                && !self.pending_dirty_layers.contains(&handle);
            layer.set_all_child_transforms_clean(buffer, clean);
        }
        self.pending_dirty_layers.clear();
        self.layer_order = pass.layer_order;

        log::debug!(
            "Scene update (buffer {}): {} layers, {} dirty",
            buffer,
            self.layer_order.len(),
            pass.dirty_layers.len()
        );
    }
}

/// Nearest layer at or above `node` in `world`.
pub fn find_layer(world: &World, node: hecs::Entity) -> Option<Handle<Layer>> {
    let mut current = Some(node);
    while let Some(entity) = current {
        if let Ok(root) = world.get::<&LayerRoot>(entity) {
            return Some(root.0);
        }
        current = world.get::<&Parent>(entity).ok().map(|p| p.0);
    }
    None
}
