// renderer/draw.rs
// Render phase: turns prepared instructions into draw commands, looking up
// one pipeline per renderer.

use std::collections::HashMap;
use std::rc::Rc;

use hecs::Entity;

use super::blending::BlendMode;
use super::controller::GraphicsController;
use super::pipeline_cache::{PipelineCache, PipelineCacheQuery, PipelineResult};
use super::renderer::RenderCallbackInput;
use super::uniforms::ItemUniforms;
use super::{Geometry, RenderTarget, Renderer, TextureSet};
use crate::error::Result;
use crate::prepare::{RenderInstruction, RenderInstructionContainer, RenderItem};
use crate::resource::{GraphicsResources, Handle, LifecycleEvent, LifecycleObserver, ResourceCache};
use crate::scene::RenderTask;
use crate::spatial::{ClippingBox, Viewport};
use crate::BufferIndex;

pub struct DrawCommand<P> {
    pub pipeline: Rc<P>,
    pub node: Entity,
    pub renderer: Handle<Renderer>,
    pub geometry: Handle<Geometry>,
    pub texture_set: Option<Handle<TextureSet>>,
    pub uniforms: ItemUniforms,
    /// Scissor of the layer the item was drawn from.
    pub scissor: Option<ClippingBox>,
}

/// Draws of one render instruction.
pub struct RenderPass<P> {
    pub task: Handle<RenderTask>,
    pub render_target: Option<Handle<RenderTarget>>,
    pub viewport: Option<Viewport>,
    pub clear_color: Option<glam::Vec4>,
    pub commands: Vec<DrawCommand<P>>,
    /// Items drawn by their render callback instead of a command.
    pub callbacks_invoked: usize,
}

/// Owns the pipeline cache and the pipeline each renderer currently holds.
pub struct FrameRenderer<P> {
    cache: PipelineCache<P>,
    held: HashMap<Handle<Renderer>, PipelineResult<P>>,
}

impl<P> FrameRenderer<P> {
    pub fn new(clean_interval: u32) -> Self {
        Self {
            cache: PipelineCache::new(clean_interval),
            held: HashMap::new(),
        }
    }

    pub fn pipeline_cache(&self) -> &PipelineCache<P> {
        &self.cache
    }

    /// The pipeline result `renderer` holds from its last draw.
    pub fn held_pipeline(&self, renderer: Handle<Renderer>) -> Option<&PipelineResult<P>> {
        self.held.get(&renderer)
    }

    /// Builds the draws of every instruction of `buffer`, in order.
    ///
    /// Ticks the pipeline cache once, so call it once per rendered frame.
    pub fn render<C>(
        &mut self,
        instructions: &RenderInstructionContainer,
        buffer: BufferIndex,
        renderers: &ResourceCache<Renderer>,
        resources: &GraphicsResources,
        controller: &mut C,
    ) -> Result<Vec<RenderPass<P>>>
    where
        C: GraphicsController<Pipeline = P>,
    {
        self.cache.pre_render();

        let mut passes = Vec::with_capacity(instructions.count(buffer));
        for instruction in instructions.iter(buffer) {
            passes.push(self.render_instruction(instruction, renderers, resources, controller)?);
        }

        log::debug!(
            "Rendered {} passes, {} draws",
            passes.len(),
            passes.iter().map(|pass| pass.commands.len()).sum::<usize>()
        );
        Ok(passes)
    }

    fn render_instruction<C>(
        &mut self,
        instruction: &RenderInstruction,
        renderers: &ResourceCache<Renderer>,
        resources: &GraphicsResources,
        controller: &mut C,
    ) -> Result<RenderPass<P>>
    where
        C: GraphicsController<Pipeline = P>,
    {
        let mut pass = RenderPass {
            task: instruction.task,
            render_target: instruction.render_target,
            viewport: instruction.viewport,
            clear_color: instruction.clear_color,
            commands: Vec::with_capacity(instruction.item_count()),
            callbacks_invoked: 0,
        };

        for list in instruction.render_lists() {
            for item in list.iter() {
                // Scissor-only items.
                let Some(handle) = item.renderer else {
                    continue;
                };
                let Some(renderer) = renderers.get(handle) else {
                    log::trace!("Skipping item of removed renderer {:?}", handle);
                    continue;
                };

                if let Some(callback) = &renderer.render_callback {
                    let input = RenderCallbackInput {
                        model_view: item.model_view,
                        projection: instruction.projection_matrix,
                        size: item.size,
                    };
                    if !callback(&input) {
                        log::trace!("Render callback of {:?} drew nothing", handle);
                    }
                    pass.callbacks_invoked += 1;
                    continue;
                }

                let Some(pipeline) =
                    self.pipeline_for(handle, renderer, item, instruction, resources, controller)?
                else {
                    continue;
                };
                pass.commands.push(DrawCommand {
                    pipeline,
                    node: item.node,
                    renderer: handle,
                    geometry: renderer.geometry,
                    texture_set: renderer.texture_set,
                    uniforms: ItemUniforms::from_item(
                        item.model_view,
                        instruction.projection_matrix,
                        item.color,
                        item.size,
                    ),
                    scissor: list.clipping_box(),
                });
            }
        }
        Ok(pass)
    }

    /// Looks the pipeline up and swaps it in as the one `handle` holds,
    /// releasing the previous one.
    fn pipeline_for<C>(
        &mut self,
        handle: Handle<Renderer>,
        renderer: &Renderer,
        item: &RenderItem,
        instruction: &RenderInstruction,
        resources: &GraphicsResources,
        controller: &mut C,
    ) -> Result<Option<Rc<P>>>
    where
        C: GraphicsController<Pipeline = P>,
    {
        let blending_enabled = match renderer.blend_mode {
            BlendMode::Off => false,
            BlendMode::On => true,
            BlendMode::Auto | BlendMode::UseActorOpacity => !item.is_opaque,
        };
        let Some(query) = PipelineCacheQuery::for_renderer(
            renderer,
            resources,
            instruction.render_target,
            blending_enabled,
            instruction.camera_using_reflection,
        ) else {
            log::warn!("Renderer {:?} has no geometry, skipping draw", handle);
            return Ok(None);
        };

        let result = self.cache.get_pipeline(&query, resources, controller, true)?;
        let pipeline = result.pipeline.clone();
        if let Some(previous) = self.held.insert(handle, result) {
            self.cache.reset_pipeline(&previous);
        }
        Ok(pipeline)
    }

    /// Gives back the pipeline of a renderer that is being removed.
    pub fn release_renderer(&mut self, renderer: Handle<Renderer>) {
        if let Some(result) = self.held.remove(&renderer) {
            self.cache.reset_pipeline(&result);
        }
    }
}

impl<P> Default for FrameRenderer<P> {
    fn default() -> Self {
        Self {
            cache: PipelineCache::default(),
            held: HashMap::new(),
        }
    }
}

/// Resource lifecycle changes go straight to the pipeline cache.
impl<P> LifecycleObserver for FrameRenderer<P> {
    fn on_lifecycle_event(&mut self, event: LifecycleEvent) {
        self.cache.on_lifecycle_event(event);
    }
}
