pub mod cache;
pub mod handle;
pub mod lifecycle;

pub use cache::ResourceCache;
pub use handle::Handle;
pub use lifecycle::{EventLog, LifecycleEvent, LifecycleObserver, NoObserver};

use crate::renderer::{Geometry, Program, RenderTarget, TextureSet, Topology, VertexBufferFormat};

/// Owner of the graphics resources shared between renderers and the pipeline
/// cache.
///
/// Every operation that destroys a resource or replaces its vertex layout
/// takes the observer to notify and notifies it *before* the change takes
/// effect. There is no silent destroy path.
#[derive(Default)]
pub struct GraphicsResources {
    programs: ResourceCache<Program>,
    geometries: ResourceCache<Geometry>,
    texture_sets: ResourceCache<TextureSet>,
    render_targets: ResourceCache<RenderTarget>,
}

impl GraphicsResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_program(&mut self, program: Program) -> Handle<Program> {
        self.programs.insert(program)
    }

    pub fn program(&self, handle: Handle<Program>) -> Option<&Program> {
        self.programs.get(handle)
    }

    pub fn destroy_program(
        &mut self,
        handle: Handle<Program>,
        observer: &mut dyn LifecycleObserver,
    ) -> Option<Program> {
        if !self.programs.contains(handle) {
            return None;
        }
        observer.on_lifecycle_event(LifecycleEvent::ProgramDestroyed(handle));
        log::debug!("Destroying program {:?}", handle);
        self.programs.remove(handle)
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> Handle<Geometry> {
        self.geometries.insert(geometry)
    }

    pub fn geometry(&self, handle: Handle<Geometry>) -> Option<&Geometry> {
        self.geometries.get(handle)
    }

    /// Replaces the vertex buffer layout of a geometry.
    pub fn set_vertex_buffers(
        &mut self,
        handle: Handle<Geometry>,
        buffers: Vec<VertexBufferFormat>,
        observer: &mut dyn LifecycleObserver,
    ) -> bool {
        if !self.geometries.contains(handle) {
            return false;
        }
        observer.on_lifecycle_event(LifecycleEvent::GeometryBufferChanged(handle));
        match self.geometries.get_mut(handle) {
            Some(geometry) => {
                geometry.vertex_buffers = buffers;
                true
            }
            None => false,
        }
    }

    /// Changing topology needs no notification: topology is part of every
    /// pipeline query, so it selects a different level-1 node.
    pub fn set_topology(&mut self, handle: Handle<Geometry>, topology: Topology) -> bool {
        match self.geometries.get_mut(handle) {
            Some(geometry) => {
                geometry.topology = topology;
                true
            }
            None => false,
        }
    }

    pub fn destroy_geometry(
        &mut self,
        handle: Handle<Geometry>,
        observer: &mut dyn LifecycleObserver,
    ) -> Option<Geometry> {
        if !self.geometries.contains(handle) {
            return None;
        }
        observer.on_lifecycle_event(LifecycleEvent::GeometryDestroyed(handle));
        log::debug!("Destroying geometry {:?}", handle);
        self.geometries.remove(handle)
    }

    pub fn add_texture_set(&mut self, texture_set: TextureSet) -> Handle<TextureSet> {
        self.texture_sets.insert(texture_set)
    }

    pub fn texture_set(&self, handle: Handle<TextureSet>) -> Option<&TextureSet> {
        self.texture_sets.get(handle)
    }

    pub fn remove_texture_set(&mut self, handle: Handle<TextureSet>) -> Option<TextureSet> {
        self.texture_sets.remove(handle)
    }

    pub fn add_render_target(&mut self, target: RenderTarget) -> Handle<RenderTarget> {
        self.render_targets.insert(target)
    }

    pub fn render_target(&self, handle: Handle<RenderTarget>) -> Option<&RenderTarget> {
        self.render_targets.get(handle)
    }

    pub fn destroy_render_target(
        &mut self,
        handle: Handle<RenderTarget>,
        observer: &mut dyn LifecycleObserver,
    ) -> Option<RenderTarget> {
        if !self.render_targets.contains(handle) {
            return None;
        }
        observer.on_lifecycle_event(LifecycleEvent::RenderTargetDestroyed(handle));
        self.render_targets.remove(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{VertexAttributeFormat, VertexFormat};

    #[test]
    fn destroy_notifies_before_removal() {
        let mut resources = GraphicsResources::new();
        let program = resources.add_program(Program::new("basic"));
        let mut log = EventLog::default();

        assert!(resources.destroy_program(program, &mut log).is_some());
        assert_eq!(log.events, vec![LifecycleEvent::ProgramDestroyed(program)]);
        assert!(resources.program(program).is_none());

        // A second destroy is a no-op and must not notify again.
        assert!(resources.destroy_program(program, &mut log).is_none());
        assert_eq!(log.events.len(), 1);
    }

    #[test]
    fn buffer_layout_change_is_notified() {
        let mut resources = GraphicsResources::new();
        let geometry = resources.add_geometry(Geometry::new(Topology::Triangles));
        let mut log = EventLog::default();

        let buffers = vec![VertexBufferFormat::new(vec![VertexAttributeFormat::new(
            "aPosition",
            VertexFormat::Vec2,
        )])];
        assert!(resources.set_vertex_buffers(geometry, buffers, &mut log));
        assert_eq!(
            log.events,
            vec![LifecycleEvent::GeometryBufferChanged(geometry)]
        );
        assert_eq!(resources.geometry(geometry).map(|g| g.vertex_buffers.len()), Some(1));
    }
}
