// prepare/builder.rs
// Turns a layer's renderables into render items, culling what the camera
// cannot see.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};
use hecs::World;

use super::render_item::RenderList;
use crate::renderer::{OpacityType, Renderer, ShaderHints};
use crate::resource::{GraphicsResources, ResourceCache};
use crate::scene::{
    BoundingSphere, Camera, ClippingInfo, ClippingMode, Culled, Renderable, Size, SortingDepth,
    UpdateSizeHint, WorldColor, WorldMatrix,
};
use crate::spatial::{clip_space_aabb, Viewport, BOUNDS_EPSILON};
use crate::BufferIndex;

/// What stays fixed while one render list is built.
pub(crate) struct BuildContext<'a> {
    pub world: &'a World,
    pub renderers: &'a ResourceCache<Renderer>,
    pub resources: &'a GraphicsResources,
    pub camera: &'a Camera,
    pub buffer: BufferIndex,
    pub is_layer_3d: bool,
    pub viewport: Option<Viewport>,
    pub culling_enabled: bool,
    pub partial_update_culling: bool,
    pub stopper: Option<hecs::Entity>,
}

/// Appends an item for every visible renderable to `list`.
///
/// Returns true once the stopper node has been added. Renderables after the
/// stopper's own are left out.
pub(crate) fn add_renderers_to_render_list(
    ctx: &BuildContext<'_>,
    renderables: &[Renderable],
    list: &mut RenderList,
) -> bool {
    let view = ctx.camera.view_matrix(ctx.buffer);
    let projection = ctx.camera.projection_matrix(ctx.buffer);
    let mut stopper_reached = false;

    for renderable in renderables {
        let is_stopper = ctx.stopper == Some(renderable.node);
        if stopper_reached && !is_stopper {
            log::trace!("Stopper reached, skipping the remaining renderables");
            break;
        }
        stopper_reached |= is_stopper;
        add_renderer_to_render_list(ctx, renderable, is_stopper, &view, &projection, list);
    }

    stopper_reached
}

fn add_renderer_to_render_list(
    ctx: &BuildContext<'_>,
    renderable: &Renderable,
    is_stopper: bool,
    view: &Mat4,
    projection: &Mat4,
    list: &mut RenderList,
) {
    let world = ctx.world;
    let node = renderable.node;
    let Ok(model) = world.get::<&WorldMatrix>(node).map(|m| m.get(ctx.buffer)) else {
        log::warn!("Renderable node {:?} has no world matrix, skipping", node);
        return;
    };
    let renderer = renderable.renderer.and_then(|h| ctx.renderers.get(h));
    let size = world.get::<&Size>(node).map(|s| s.0).unwrap_or_default();
    let clipping_mode = world
        .get::<&ClippingMode>(node)
        .map(|m| *m)
        .unwrap_or_default();

    let skip_frustum_test = is_stopper
        || !ctx.culling_enabled
        || clipping_mode != ClippingMode::Disabled
        || match renderer {
            None => true,
            Some(renderer) => {
                renderer.has_render_callback()
                    || renderer
                        .shader_hints(ctx.resources)
                        .contains(ShaderHints::MODIFIES_GEOMETRY)
            }
        };

    let mut inside = true;
    if !skip_frustum_test {
        let sphere = world
            .get::<&BoundingSphere>(node)
            .map(|s| *s)
            .unwrap_or_default();
        inside = sphere.radius() > BOUNDS_EPSILON
            && ctx
                .camera
                .check_sphere_in_frustum(ctx.buffer, sphere.center(), sphere.radius());
    }

    let update_size = match world.get::<&UpdateSizeHint>(node).map(|h| h.0) {
        Ok(hint) if hint != Vec3::ZERO => hint,
        _ if !ctx.is_layer_3d && model.z_axis.xyz() == Vec3::Z => size,
        _ => Vec3::ZERO,
    };

    if inside && !skip_frustum_test && !ctx.is_layer_3d && ctx.partial_update_culling {
        if let Some(viewport) = ctx.viewport.filter(|_| update_size != Vec3::ZERO) {
            let mvp = *projection * *view * model;
            let half = update_size * 0.5;
            if let Some(bounds) = clip_space_aabb(&mvp, -half, half, &viewport) {
                inside = bounds.intersects(&viewport);
            }
        }
    }

    if let Ok(mut culled) = world.get::<&mut Culled>(node) {
        culled.0[ctx.buffer] = !inside;
    }
    if !inside {
        log::trace!("Culled node {:?}", node);
        return;
    }

    let color = world.get::<&WorldColor>(node).map(|c| c.0).unwrap_or(Vec4::ONE);
    let opacity = match renderer {
        Some(renderer) if !renderer.has_render_callback() => {
            renderer.opacity_type(ctx.resources, color)
        }
        _ => OpacityType::Opaque,
    };
    if opacity == OpacityType::Transparent
        && clipping_mode == ClippingMode::Disabled
        && !is_stopper
    {
        log::trace!("Skipping transparent node {:?}", node);
        return;
    }
    let is_opaque = opacity == OpacityType::Opaque;

    let depth_index = if ctx.is_layer_3d {
        0
    } else {
        world.get::<&SortingDepth>(node).map(|d| d.0).unwrap_or(0)
            + renderer.map_or(0, |r| r.depth_index)
    };
    let clipping_sort_modifier = world
        .get::<&ClippingInfo>(node)
        .map(|c| c.sort_modifier)
        .unwrap_or(0);
    let texture_set = renderer.and_then(|r| r.texture_set);
    let model_view = *view * model;

    let item = list.next_free_item();
    let is_updated = ctx.is_layer_3d
        || item.node != node
        || item.is_opaque != is_opaque
        || item.color != color
        || item.depth_index != depth_index
        || item.renderer != renderable.renderer
        || item.texture_set != texture_set
        || item.model_view != model_view
        || item.size != size;

    item.node = node;
    item.renderer = renderable.renderer;
    item.program = renderer.map(|r| r.program);
    item.geometry = renderer.map(|r| r.geometry);
    item.texture_set = texture_set;
    item.model_matrix = model;
    item.model_view = model_view;
    item.size = size;
    item.update_size = update_size;
    item.color = color;
    item.depth_index = depth_index;
    item.clipping_sort_modifier = clipping_sort_modifier;
    item.is_opaque = is_opaque;
    item.is_updated = is_updated;
}
