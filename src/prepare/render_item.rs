// prepare/render_item.rs
// Frame-scoped containers written by the update phase and read by the
// render phase. Everything here is pooled: lists and items are reset and
// overwritten, not reallocated, from one frame to the next.

use std::collections::HashMap;

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::{Geometry, Program, RenderTarget, Renderer, TextureSet};
use crate::resource::Handle;
use crate::scene::{Camera, Layer, RenderTask};
use crate::spatial::{ClippingBox, Viewport};
use crate::{BufferIndex, BUFFER_COUNT};

/// One draw call worth of state for one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    pub node: hecs::Entity,
    /// `None` for a scissor clip with nothing to draw.
    pub renderer: Option<Handle<Renderer>>,
    pub program: Option<Handle<Program>>,
    pub geometry: Option<Handle<Geometry>>,
    pub texture_set: Option<Handle<TextureSet>>,
    pub model_matrix: Mat4,
    pub model_view: Mat4,
    pub size: Vec3,
    /// Area the item touches, for partial updates. Zero when unknown.
    pub update_size: Vec3,
    pub color: Vec4,
    pub depth_index: i32,
    pub clipping_sort_modifier: u32,
    pub is_opaque: bool,
    /// Whether anything about the item differs from what was drawn from
    /// this slot last time.
    pub is_updated: bool,
}

impl Default for RenderItem {
    fn default() -> Self {
        Self {
            node: hecs::Entity::DANGLING,
            renderer: None,
            program: None,
            geometry: None,
            texture_set: None,
            model_matrix: Mat4::IDENTITY,
            model_view: Mat4::IDENTITY,
            size: Vec3::ZERO,
            update_size: Vec3::ZERO,
            color: Vec4::ONE,
            depth_index: 0,
            clipping_sort_modifier: 0,
            is_opaque: true,
            is_updated: true,
        }
    }
}

/// Items of one layer and renderable category for one render task.
#[derive(Debug, Default)]
pub struct RenderList {
    items: Vec<RenderItem>,
    /// Draw order, as indices into `items`.
    order: Vec<usize>,
    next_free: usize,
    source_layer: Option<Handle<Layer>>,
    clipping_box: Option<ClippingBox>,
    has_color_render_items: bool,
    reused: bool,
}

impl RenderList {
    /// Starts a rebuild. The items stay allocated so the builder can tell
    /// what changed per slot.
    pub(crate) fn reset(&mut self) {
        self.next_free = 0;
        self.reused = false;
    }

    pub(crate) fn next_free_item(&mut self) -> &mut RenderItem {
        if self.next_free == self.items.len() {
            self.items.push(RenderItem::default());
        }
        self.next_free += 1;
        &mut self.items[self.next_free - 1]
    }

    /// Ends a rebuild: drops slots not written this time and restores the
    /// input order.
    pub(crate) fn release_unused_items(&mut self) {
        self.items.truncate(self.next_free);
        self.order.clear();
        self.order.extend(0..self.next_free);
    }

    /// Keeps last frame's items and order as they are.
    pub(crate) fn reuse_cached_items(&mut self) {
        self.next_free = self.items.len();
        self.reused = true;
    }

    pub(crate) fn set_order(&mut self, order: impl IntoIterator<Item = usize>) {
        self.order.clear();
        self.order.extend(order);
    }

    pub(crate) fn set_source_layer(&mut self, layer: Handle<Layer>) {
        self.source_layer = Some(layer);
    }

    pub(crate) fn set_clipping(&mut self, clipping_box: Option<ClippingBox>) {
        self.clipping_box = clipping_box;
    }

    pub(crate) fn set_has_color_render_items(&mut self, has_color: bool) {
        self.has_color_render_items = has_color;
    }

    /// Items built last time, in slot order.
    pub fn cached_items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn cached_item_count(&self) -> usize {
        self.items.len()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Item at draw position `index`.
    pub fn get(&self, index: usize) -> Option<&RenderItem> {
        self.order.get(index).and_then(|&slot| self.items.get(slot))
    }

    /// Items in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.order.iter().filter_map(|&slot| self.items.get(slot))
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn source_layer(&self) -> Option<Handle<Layer>> {
        self.source_layer
    }

    pub fn is_clipping(&self) -> bool {
        self.clipping_box.is_some()
    }

    pub fn clipping_box(&self) -> Option<ClippingBox> {
        self.clipping_box
    }

    pub fn has_color_render_items(&self) -> bool {
        self.has_color_render_items
    }

    /// Whether this frame kept last frame's items instead of rebuilding.
    pub fn is_reused(&self) -> bool {
        self.reused
    }
}

/// Everything the render phase needs to execute one render task.
#[derive(Debug)]
pub struct RenderInstruction {
    pub task: Handle<RenderTask>,
    pub camera: Handle<Camera>,
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub viewport: Option<Viewport>,
    pub clear_color: Option<Vec4>,
    pub render_target: Option<Handle<RenderTarget>>,
    pub camera_using_reflection: bool,
    lists: Vec<RenderList>,
    list_count: usize,
}

impl RenderInstruction {
    fn new(task: Handle<RenderTask>, camera: Handle<Camera>) -> Self {
        Self {
            task,
            camera,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            viewport: None,
            clear_color: None,
            render_target: None,
            camera_using_reflection: false,
            lists: Vec::new(),
            list_count: 0,
        }
    }

    /// Hands out the next pooled list. Its previous contents are kept for
    /// the reuse check.
    pub(crate) fn next_free_render_list(&mut self) -> &mut RenderList {
        if self.list_count == self.lists.len() {
            self.lists.push(RenderList::default());
        }
        self.list_count += 1;
        &mut self.lists[self.list_count - 1]
    }

    pub fn render_lists(&self) -> &[RenderList] {
        &self.lists[..self.list_count]
    }

    pub fn render_list_count(&self) -> usize {
        self.list_count
    }

    /// Items across all lists in draw order.
    pub fn items(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.render_lists().iter().flat_map(|list| list.iter())
    }

    pub fn item_count(&self) -> usize {
        self.render_lists().iter().map(RenderList::len).sum()
    }
}

/// Per-buffer list of the instructions for one frame. Each render task owns
/// one pooled instruction per buffer.
#[derive(Debug, Default)]
pub struct RenderInstructionContainer {
    pool: HashMap<Handle<RenderTask>, [RenderInstruction; BUFFER_COUNT]>,
    order: [Vec<Handle<RenderTask>>; BUFFER_COUNT],
}

impl RenderInstructionContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, buffer: BufferIndex) {
        self.order[buffer].clear();
    }

    /// The instruction of `task` for `buffer`, emptied of lists.
    pub(crate) fn prepare_instruction(
        &mut self,
        buffer: BufferIndex,
        task: Handle<RenderTask>,
        camera: Handle<Camera>,
    ) -> &mut RenderInstruction {
        let instructions = self
            .pool
            .entry(task)
            .or_insert_with(|| std::array::from_fn(|_| RenderInstruction::new(task, camera)));
        let instruction = &mut instructions[buffer];
        instruction.camera = camera;
        instruction.list_count = 0;
        instruction
    }

    pub(crate) fn push(&mut self, buffer: BufferIndex, task: Handle<RenderTask>) {
        self.order[buffer].push(task);
    }

    /// Drops the pooled instructions of a removed task.
    pub fn remove_task(&mut self, task: Handle<RenderTask>) {
        self.pool.remove(&task);
        for order in &mut self.order {
            order.retain(|t| *t != task);
        }
    }

    pub fn count(&self, buffer: BufferIndex) -> usize {
        self.order[buffer].len()
    }

    pub fn get(&self, buffer: BufferIndex, index: usize) -> Option<&RenderInstruction> {
        let task = self.order[buffer].get(index)?;
        self.pool.get(task).map(|instructions| &instructions[buffer])
    }

    /// Instructions for `buffer` in execution order.
    pub fn iter(&self, buffer: BufferIndex) -> impl Iterator<Item = &RenderInstruction> + '_ {
        self.order[buffer]
            .iter()
            .filter_map(move |task| self.pool.get(task).map(|instructions| &instructions[buffer]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_keeps_slots_and_drops_the_tail() {
        let mut list = RenderList::default();
        list.reset();
        for depth in 0..3 {
            list.next_free_item().depth_index = depth;
        }
        list.release_unused_items();
        assert_eq!(list.len(), 3);

        list.reset();
        // The slot still holds last frame's values until overwritten.
        assert_eq!(list.next_free_item().depth_index, 0);
        list.release_unused_items();
        assert_eq!(list.len(), 1);
        assert_eq!(list.cached_item_count(), 1);
    }

    #[test]
    fn reuse_keeps_the_sorted_order() {
        let mut list = RenderList::default();
        list.reset();
        list.next_free_item().depth_index = 1;
        list.next_free_item().depth_index = 0;
        list.release_unused_items();
        list.set_order([1, 0]);

        list.reset();
        list.reuse_cached_items();
        assert!(list.is_reused());
        let depths: Vec<i32> = list.iter().map(|item| item.depth_index).collect();
        assert_eq!(depths, vec![0, 1]);
    }

    #[test]
    fn instructions_are_listed_per_buffer() {
        let task_a: Handle<RenderTask> = Handle::new(0, 0);
        let task_b: Handle<RenderTask> = Handle::new(1, 0);
        let camera: Handle<Camera> = Handle::new(0, 0);
        let mut container = RenderInstructionContainer::new();

        container.reset(0);
        container.prepare_instruction(0, task_a, camera).clear_color = Some(Vec4::ONE);
        container.push(0, task_a);
        container.prepare_instruction(0, task_b, camera);
        container.push(0, task_b);

        assert_eq!(container.count(0), 2);
        assert_eq!(container.count(1), 0);
        assert_eq!(container.get(0, 0).map(|i| i.task), Some(task_a));
        assert_eq!(container.get(0, 0).and_then(|i| i.clear_color), Some(Vec4::ONE));

        container.remove_task(task_a);
        assert_eq!(container.count(0), 1);
    }
}
