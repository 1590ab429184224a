use super::Handle;
use crate::renderer::{Geometry, Program, RenderTarget};

/// Notification delivered to observers before a shared graphics resource is
/// destroyed or has its identity-relevant state replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ProgramDestroyed(Handle<Program>),
    GeometryDestroyed(Handle<Geometry>),
    GeometryBufferChanged(Handle<Geometry>),
    RenderTargetDestroyed(Handle<RenderTarget>),
}

/// Receives [`LifecycleEvent`]s. Observers hold handles, never references,
/// so after an event they must drop every handle naming the resource.
pub trait LifecycleObserver {
    fn on_lifecycle_event(&mut self, event: LifecycleEvent);
}

/// Observer that ignores every event, for owners with nothing cached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl LifecycleObserver for NoObserver {
    fn on_lifecycle_event(&mut self, _event: LifecycleEvent) {}
}

/// Records every event it sees.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub events: Vec<LifecycleEvent>,
}

impl LifecycleObserver for EventLog {
    fn on_lifecycle_event(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }
}
