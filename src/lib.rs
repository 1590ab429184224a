pub mod error;
pub mod prepare;
pub mod renderer;
pub mod resource;
pub mod scene;
pub mod settings;
pub mod spatial;

pub use error::{Error, Result};
pub use hit_test::{hit_test, hit_test_task, ActorTouchableCheck, HitTestInterface, HitTestResults, PropagationType};
pub use prepare::{PrepareStats, RenderPreparer};
pub use settings::PrepareSettings;

/// Index of one of the double-buffered slots of per-frame state.
pub type BufferIndex = usize;

/// Number of update buffers: the update phase writes one while the render
/// phase reads the other.
pub const BUFFER_COUNT: usize = 2;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
