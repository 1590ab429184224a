// prepare/mod.rs
// Update-phase pass producing the frame's render instructions.

mod builder;
mod processor;
mod render_item;
mod sorter;
mod task_processor;

pub use processor::RenderInstructionProcessor;
pub use render_item::{RenderInstruction, RenderInstructionContainer, RenderItem, RenderList};
pub use sorter::RenderItemSorter;

use processor::FrameContext;
use task_processor::process_render_tasks;

use crate::resource::{GraphicsResources, Handle};
use crate::scene::{RenderTask, Scene};
use crate::settings::PrepareSettings;
use crate::{BufferIndex, BUFFER_COUNT};

/// Counters of one prepare pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrepareStats {
    pub instructions: usize,
    pub render_lists: usize,
    pub reused_lists: usize,
    pub items: usize,
}

/// Owns the per-buffer instructions and the processors filling them.
#[derive(Debug, Default)]
pub struct RenderPreparer {
    settings: PrepareSettings,
    processor: RenderInstructionProcessor,
    instructions: RenderInstructionContainer,
}

impl RenderPreparer {
    pub fn new(settings: PrepareSettings) -> Self {
        Self {
            settings,
            processor: RenderInstructionProcessor::new(),
            instructions: RenderInstructionContainer::new(),
        }
    }

    pub fn settings(&self) -> &PrepareSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PrepareSettings {
        &mut self.settings
    }

    /// Rebuilds the instructions of `buffer` from `scene`, which must have
    /// been updated for the same buffer.
    pub fn prepare(
        &mut self,
        scene: &mut Scene,
        resources: &GraphicsResources,
        buffer: BufferIndex,
    ) -> PrepareStats {
        assert!(buffer < BUFFER_COUNT, "buffer index {} out of range", buffer);

        self.instructions.reset(buffer);
        let sorted_layers = scene.layer_order().to_vec();
        let frame = FrameContext {
            world: &scene.world,
            renderers: &scene.renderers,
            cameras: &scene.cameras,
            resources,
            settings: &self.settings,
            sorted_layers: &sorted_layers,
            root_layer: scene.root_layer(),
            buffer,
        };
        process_render_tasks(
            &frame,
            &mut scene.layers,
            &scene.tasks,
            &mut self.processor,
            &mut self.instructions,
        );

        let stats = self.stats(buffer);
        log::debug!(
            "Prepared buffer {}: {} instructions, {} lists ({} reused), {} items",
            buffer,
            stats.instructions,
            stats.render_lists,
            stats.reused_lists,
            stats.items
        );
        stats
    }

    pub fn instructions(&self) -> &RenderInstructionContainer {
        &self.instructions
    }

    /// Forgets the pooled instructions of a removed task.
    pub fn remove_task(&mut self, task: Handle<RenderTask>) {
        self.instructions.remove_task(task);
    }

    pub fn stats(&self, buffer: BufferIndex) -> PrepareStats {
        let mut stats = PrepareStats {
            instructions: self.instructions.count(buffer),
            ..PrepareStats::default()
        };
        for instruction in self.instructions.iter(buffer) {
            for list in instruction.render_lists() {
                stats.render_lists += 1;
                stats.reused_lists += usize::from(list.is_reused());
                stats.items += list.len();
            }
        }
        stats
    }
}
