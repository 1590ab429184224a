// prepare/task_processor.rs
// Walks each render task's source subtree, fills the layers' renderable
// lists and hands the task to the instruction processor.

use std::collections::HashMap;

use hecs::World;

use super::processor::{FrameContext, RenderInstructionProcessor, TaskContext};
use super::render_item::RenderInstructionContainer;
use crate::resource::{Handle, ResourceCache};
use crate::scene::{
    check_exclusivity, find_layer, Children, ClippingInfo, ClippingMode, DrawMode, Layer, LayerRoot,
    NodeRenderers, Renderable, RenderTask, RenderTaskList, Visible,
};

/// Values a node hands down to its children during collection.
struct Visit {
    node: hecs::Entity,
    layer: Handle<Layer>,
    draw_mode: DrawMode,
    clipping_depth: u32,
    scissor_depth: u32,
}

/// Clipping state shared by all tasks of one on- or off-screen pass.
#[derive(Debug, Default)]
pub(crate) struct ClippingState {
    /// Last stencil clipping id handed out.
    pub clipping_id: u32,
    /// Whether any clipping node was met so far.
    pub has_clipping_nodes: bool,
}

/// Collects the renderables of `source` and its visible descendants into
/// their layers, assigning clipping information on the way.
pub(crate) fn add_renderables_for_task(
    world: &World,
    layers: &mut ResourceCache<Layer>,
    exclusives: &HashMap<hecs::Entity, Handle<RenderTask>>,
    task: Handle<RenderTask>,
    source: hecs::Entity,
    source_layer: Handle<Layer>,
    clipping: &mut ClippingState,
) {
    let mut stack = vec![Visit {
        node: source,
        layer: source_layer,
        draw_mode: world.get::<&DrawMode>(source).map(|m| *m).unwrap_or_default(),
        clipping_depth: 0,
        scissor_depth: 0,
    }];

    while let Some(visit) = stack.pop() {
        let node = visit.node;
        if !world.get::<&Visible>(node).map(|v| v.0).unwrap_or(true) {
            continue;
        }
        if exclusives.get(&node).is_some_and(|owner| *owner != task) {
            log::trace!("Node {:?} is exclusive to another task", node);
            continue;
        }

        let own_draw_mode = world.get::<&DrawMode>(node).map(|m| *m).unwrap_or_default();
        let (layer_handle, draw_mode) = match world.get::<&LayerRoot>(node) {
            // Layers do not inherit the draw mode of their parent.
            Ok(root) => (root.0, own_draw_mode),
            Err(_) => {
                let inherited = if visit.draw_mode == DrawMode::Overlay2D {
                    DrawMode::Overlay2D
                } else {
                    own_draw_mode
                };
                (visit.layer, inherited)
            }
        };

        let renderers = world
            .get::<&NodeRenderers>(node)
            .map(|r| r.0.clone())
            .unwrap_or_default();
        let clipping_mode = world
            .get::<&ClippingMode>(node)
            .map(|m| *m)
            .unwrap_or_default();

        let mut clipping_depth = visit.clipping_depth;
        let mut scissor_depth = visit.scissor_depth;
        let Some(layer) = layers.get_mut(layer_handle) else {
            log::warn!("Node {:?} refers to a removed layer", node);
            continue;
        };
        match clipping_mode {
            ClippingMode::Disabled => {}
            ClippingMode::ClipToBoundingBox => {
                scissor_depth += 1;
                // The scissor still needs an item when the node draws nothing.
                if renderers.is_empty() {
                    layer.color_renderables.push(Renderable::new(node, None));
                }
            }
            ClippingMode::ClipChildren => {
                clipping.clipping_id += 1;
                clipping_depth += 1;
            }
        }
        if clipping_mode != ClippingMode::Disabled {
            clipping.has_clipping_nodes = true;
        }

        let sort_modifier = if clipping_depth > 0 {
            (clipping.clipping_id << 1) | u32::from(clipping_mode == ClippingMode::Disabled)
        } else {
            0
        };
        if let Ok(mut info) = world.get::<&mut ClippingInfo>(node) {
            *info = ClippingInfo {
                sort_modifier,
                clipping_depth,
                scissor_depth,
            };
        }

        for renderer in renderers {
            let renderable = Renderable::new(node, Some(renderer));
            match draw_mode {
                DrawMode::Normal => layer.color_renderables.push(renderable),
                DrawMode::Overlay2D => layer.overlay_renderables.push(renderable),
            }
        }

        if let Ok(children) = world.get::<&Children>(node) {
            for &child in children.0.iter().rev() {
                stack.push(Visit {
                    node: child,
                    layer: layer_handle,
                    draw_mode,
                    clipping_depth,
                    scissor_depth,
                });
            }
        }
    }
}

/// Prepares every render task: off-screen tasks first, whose results the
/// on-screen ones may sample, then on-screen tasks.
pub(crate) fn process_render_tasks(
    frame: &FrameContext<'_>,
    layers: &mut ResourceCache<Layer>,
    tasks: &RenderTaskList,
    processor: &mut RenderInstructionProcessor,
    instructions: &mut RenderInstructionContainer,
) {
    if tasks.is_empty() {
        return;
    }
    let exclusives = tasks.exclusives();

    for offscreen in [true, false] {
        let mut clipping = ClippingState::default();

        for (handle, task) in tasks.iter() {
            if task.is_offscreen() != offscreen {
                continue;
            }
            if !check_exclusivity(frame.world, &exclusives, task.source, handle) {
                log::trace!("Source of task {:?} is exclusive to another task", handle);
                continue;
            }
            let Some(source_layer) = find_layer(frame.world, task.source) else {
                log::trace!("Source of task {:?} is not in a layer", handle);
                continue;
            };
            let Some(camera) = frame.cameras.get(task.camera) else {
                log::warn!("Render task {:?} has no camera, skipping", handle);
                continue;
            };

            for &layer in frame.sorted_layers {
                if let Some(layer) = layers.get_mut(layer) {
                    layer.clear_renderables();
                }
            }
            add_renderables_for_task(
                frame.world,
                layers,
                &exclusives,
                handle,
                task.source,
                source_layer,
                &mut clipping,
            );

            let task_context = TaskContext {
                handle,
                task,
                camera_handle: task.camera,
                camera,
            };
            processor.prepare(
                frame,
                layers,
                &task_context,
                clipping.has_clipping_nodes,
                instructions,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{Geometry, Program, Renderer, Topology};
    use crate::resource::GraphicsResources;
    use crate::scene::Scene;
    use glam::Vec2;

    fn scene_with_renderer() -> (Scene, Handle<Renderer>) {
        let mut resources = GraphicsResources::new();
        let geometry = resources.add_geometry(Geometry::new(Topology::Triangles));
        let program = resources.add_program(Program::new("flat"));
        let mut scene = Scene::new(Vec2::new(100.0, 100.0));
        let renderer = scene.add_renderer(Renderer::new(geometry, program));
        (scene, renderer)
    }

    fn collect(scene: &mut Scene, task: Handle<RenderTask>) -> ClippingState {
        let exclusives = scene.tasks.exclusives();
        let source = scene.tasks.get(task).map(|t| t.source).expect("task");
        let layer = scene.find_layer(source).expect("layer");
        let mut clipping = ClippingState::default();
        add_renderables_for_task(
            &scene.world,
            &mut scene.layers,
            &exclusives,
            task,
            source,
            layer,
            &mut clipping,
        );
        clipping
    }

    #[test]
    fn invisible_subtrees_are_skipped() {
        let (mut scene, renderer) = scene_with_renderer();
        let root = scene.root();
        let hidden = scene.actor(root).visible(false).with_renderer(renderer).spawn();
        let _under_hidden = scene.actor(hidden).with_renderer(renderer).spawn();
        let shown = scene.actor(root).with_renderer(renderer).spawn();

        let task = scene.default_task();
        collect(&mut scene, task);
        let layer = scene.layers.get(scene.root_layer()).expect("root layer");
        let nodes: Vec<hecs::Entity> = layer.color_renderables().iter().map(|r| r.node).collect();
        assert_eq!(nodes, vec![shown]);
    }

    #[test]
    fn overlay_mode_is_inherited_but_not_by_layers() {
        let (mut scene, renderer) = scene_with_renderer();
        let root = scene.root();
        let overlay = scene
            .actor(root)
            .with_draw_mode(DrawMode::Overlay2D)
            .with_renderer(renderer)
            .spawn();
        let child = scene.actor(overlay).with_renderer(renderer).spawn();
        let (nested, nested_actor) = scene.add_layer(Layer::new("nested"), overlay);
        let in_nested = scene.actor(nested_actor).with_renderer(renderer).spawn();

        let task = scene.default_task();
        collect(&mut scene, task);
        let root_layer = scene.layers.get(scene.root_layer()).expect("root layer");
        let overlays: Vec<hecs::Entity> =
            root_layer.overlay_renderables().iter().map(|r| r.node).collect();
        assert_eq!(overlays, vec![overlay, child]);
        assert!(root_layer.color_renderables().is_empty());

        let nested = scene.layers.get(nested).expect("nested layer");
        assert_eq!(
            nested.color_renderables().iter().map(|r| r.node).collect::<Vec<_>>(),
            vec![in_nested]
        );
    }

    #[test]
    fn clipping_information_follows_the_hierarchy() {
        let (mut scene, renderer) = scene_with_renderer();
        let root = scene.root();
        let clip = scene
            .actor(root)
            .with_clipping_mode(ClippingMode::ClipChildren)
            .with_renderer(renderer)
            .spawn();
        let inside = scene.actor(clip).with_renderer(renderer).spawn();
        let scissor = scene
            .actor(root)
            .with_clipping_mode(ClippingMode::ClipToBoundingBox)
            .spawn();
        let outside = scene.actor(root).with_renderer(renderer).spawn();

        let task = scene.default_task();
        let clipping = collect(&mut scene, task);
        assert!(clipping.has_clipping_nodes);
        assert_eq!(clipping.clipping_id, 1);

        let info = |node| *scene.world.get::<&ClippingInfo>(node).expect("clipping info");
        assert_eq!(info(clip).sort_modifier, 1 << 1);
        assert_eq!(info(clip).clipping_depth, 1);
        assert_eq!(info(inside).sort_modifier, (1 << 1) | 1);
        assert_eq!(info(scissor).scissor_depth, 1);
        assert_eq!(info(scissor).sort_modifier, 0);
        assert_eq!(info(outside), ClippingInfo::default());

        // The scissor clip draws nothing itself but still gets an entry.
        let layer = scene.layers.get(scene.root_layer()).expect("root layer");
        assert!(layer
            .color_renderables()
            .contains(&Renderable::new(scissor, None)));
    }

    #[test]
    fn exclusive_subtree_belongs_to_its_task_only() {
        let (mut scene, renderer) = scene_with_renderer();
        let root = scene.root();
        let exclusive = scene.actor(root).with_renderer(renderer).spawn();
        let camera = scene.default_camera();
        let owner = scene.add_task(RenderTask::new(exclusive, camera).with_exclusive(true));

        let default_task = scene.default_task();
        collect(&mut scene, default_task);
        let layer = scene.layers.get(scene.root_layer()).expect("root layer");
        assert!(layer.color_renderables().is_empty());

        let root_layer = scene.root_layer();
        scene
            .layers
            .get_mut(root_layer)
            .expect("root layer")
            .clear_renderables();
        collect(&mut scene, owner);
        let layer = scene.layers.get(scene.root_layer()).expect("root layer");
        assert_eq!(layer.color_renderables().len(), 1);
    }
}
