// prepare/processor.rs
// Assembles the render instruction of one render task from its layers.

use hecs::World;

use super::builder::{add_renderers_to_render_list, BuildContext};
use super::render_item::{RenderInstruction, RenderInstructionContainer, RenderList};
use super::sorter::RenderItemSorter;
use crate::renderer::Renderer;
use crate::resource::{GraphicsResources, Handle, ResourceCache};
use crate::scene::{Camera, Layer, RenderTask, Renderable};
use crate::settings::PrepareSettings;
use crate::BufferIndex;

/// Scene state shared by every task of one prepare pass.
pub(crate) struct FrameContext<'a> {
    pub world: &'a World,
    pub renderers: &'a ResourceCache<Renderer>,
    pub cameras: &'a ResourceCache<Camera>,
    pub resources: &'a GraphicsResources,
    pub settings: &'a PrepareSettings,
    /// Layers back to front.
    pub sorted_layers: &'a [Handle<Layer>],
    pub root_layer: Handle<Layer>,
    pub buffer: BufferIndex,
}

/// The task being prepared, with its camera resolved.
pub(crate) struct TaskContext<'a> {
    pub handle: Handle<RenderTask>,
    pub task: &'a RenderTask,
    pub camera_handle: Handle<Camera>,
    pub camera: &'a Camera,
}

/// Which renderables of a layer a list is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Color,
    Overlay,
}

#[derive(Debug, Default)]
pub struct RenderInstructionProcessor {
    sorter: RenderItemSorter,
}

impl RenderInstructionProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the instruction of `task` and appends it to `instructions`
    /// when it has lists to draw, clears colour, or the root layer is dirty.
    pub(crate) fn prepare(
        &mut self,
        frame: &FrameContext<'_>,
        layers: &mut ResourceCache<Layer>,
        task: &TaskContext<'_>,
        has_clipping_nodes: bool,
        instructions: &mut RenderInstructionContainer,
    ) {
        let buffer = frame.buffer;
        let camera = task.camera;
        let view_matrix_not_changed = !camera.view_matrix_updated();
        let stopper = task.task.stopper;

        let instruction = instructions.prepare_instruction(buffer, task.handle, task.camera_handle);
        instruction.view_matrix = camera.view_matrix(buffer);
        instruction.projection_matrix = camera.projection_matrix(buffer);
        instruction.viewport = task.task.viewport;
        instruction.clear_color = task.task.clear_color;
        instruction.render_target = task.task.render_target;
        instruction.camera_using_reflection = camera.is_using_reflection();

        let mut is_render_list_added = false;
        let mut is_root_layer_dirty = false;
        let mut stopper_reached = false;

        for &layer_handle in frame.sorted_layers {
            let Some(layer) = layers.get_mut(layer_handle) else {
                continue;
            };
            let try_reuse = view_matrix_not_changed
                && layer.can_reuse_renderers(task.camera_handle)
                && frame.settings.reuse_render_lists
                && stopper.is_none();

            if layer_handle == frame.root_layer && !layer.all_child_transforms_clean(buffer) {
                is_root_layer_dirty = true;
            }

            let layer: &Layer = layer;
            let ctx = BuildContext {
                world: frame.world,
                renderers: frame.renderers,
                resources: frame.resources,
                camera,
                buffer,
                is_layer_3d: layer.is_3d(),
                viewport: task.task.viewport,
                culling_enabled: frame.settings.culling_enabled && task.task.culling_enabled,
                partial_update_culling: frame.settings.partial_update_culling,
                stopper,
            };

            for kind in [ListKind::Color, ListKind::Overlay] {
                let renderables = match kind {
                    ListKind::Color => layer.color_renderables(),
                    ListKind::Overlay => layer.overlay_renderables(),
                };
                if renderables.is_empty() {
                    continue;
                }

                let list = setup_render_list(instruction, layer_handle, layer, renderables, try_reuse);
                list.set_has_color_render_items(kind == ListKind::Color);
                if !list.is_reused() {
                    stopper_reached = add_renderers_to_render_list(&ctx, renderables, list);
                    list.release_unused_items();
                    // Clip regions are irrelevant to overlays.
                    let respect_clipping = kind == ListKind::Color && has_clipping_nodes;
                    self.sorter
                        .sort(list, layer, respect_clipping, camera.is_orthographic());
                }
                if frame.settings.log_render_lists {
                    log_render_list(&layer.name, kind, list);
                }
                is_render_list_added = true;

                if stopper_reached {
                    break;
                }
            }

            if stopper_reached {
                log::debug!("Stopper reached in layer '{}'", layer.name);
                break;
            }
        }

        let keep = is_render_list_added || instruction.clear_color.is_some() || is_root_layer_dirty;
        log::trace!(
            "Prepared task {:?}: {} lists, {} items, kept: {}",
            task.handle,
            instruction.render_list_count(),
            instruction.item_count(),
            keep
        );
        if keep {
            instructions.push(buffer, task.handle);
        }
    }
}

/// Takes the next list of `instruction` for `layer` and reuses its cached
/// items when nothing they were built from can have changed.
fn setup_render_list<'i>(
    instruction: &'i mut RenderInstruction,
    layer_handle: Handle<Layer>,
    layer: &Layer,
    renderables: &[Renderable],
    try_reuse: bool,
) -> &'i mut RenderList {
    let list = instruction.next_free_render_list();
    list.set_clipping(layer.clipping_box);

    // Renderer identities are summed, not compared one by one; a collision
    // can reuse a stale list.
    if try_reuse
        && list.source_layer() == Some(layer_handle)
        && list.cached_item_count() == renderables.len()
        && renderer_checksum(list.cached_items().iter().map(|item| item.renderer))
            == renderer_checksum(renderables.iter().map(|renderable| renderable.renderer))
    {
        list.reuse_cached_items();
        log::trace!("Reusing render list of layer '{}'", layer.name);
    } else {
        list.reset();
    }
    list.set_source_layer(layer_handle);
    list
}

fn renderer_checksum(renderers: impl Iterator<Item = Option<Handle<Renderer>>>) -> u64 {
    renderers.fold(0u64, |sum, renderer| {
        sum.wrapping_add(renderer.map_or(0, |handle| handle.key()))
    })
}

fn log_render_list(layer: &str, kind: ListKind, list: &RenderList) {
    log::debug!(
        "Layer '{}' {:?} list: {} items{}{}",
        layer,
        kind,
        list.len(),
        if list.is_reused() { " (reused)" } else { "" },
        if list.is_clipping() { " (clipped)" } else { "" }
    );
    for (position, item) in list.iter().enumerate() {
        log::debug!(
            "  [{}] node {:?} renderer {:?} depth {} opaque {} updated {}",
            position,
            item.node,
            item.renderer,
            item.depth_index,
            item.is_opaque,
            item.is_updated
        );
    }
}
