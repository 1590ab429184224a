use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec4, Vec4Swizzles};
use hecs::World;

use crate::resource::Handle;
use crate::scene::components::{
    BoundingSphere, Children, Color, DepthIndex, LayerRoot, Parent, Size, SortingDepth,
    TransformComponent, WorldColor, WorldMatrix,
};
use crate::scene::layer::Layer;
use crate::BufferIndex;

/// Gap between the sorting depths of consecutive actors in a layer, leaving
/// room for author depth indices in between.
pub const SORTED_DEPTH_MULTIPLIER: i32 = 1000;

/// What the update traversal found out about the layers.
#[derive(Debug, Default)]
pub(crate) struct TransformPass {
    /// Layers in depth-first order, back to front.
    pub layer_order: Vec<Handle<Layer>>,
    /// Layers with at least one member whose world matrix or colour changed.
    pub dirty_layers: HashSet<Handle<Layer>>,
}

struct Inherited {
    matrix: Mat4,
    color: Vec4,
    layer: Option<Handle<Layer>>,
}

pub(crate) fn propagate_transforms(world: &mut World, buffer: BufferIndex) -> TransformPass {
    let roots: Vec<hecs::Entity> = world
        .query::<&TransformComponent>()
        .without::<&Parent>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();

    log::trace!("Propagating transforms from {} root entities", roots.len());

    let mut pass = TransformPass::default();
    let mut depth_counters: HashMap<Handle<Layer>, i32> = HashMap::new();
    let mut stack: Vec<(hecs::Entity, Inherited)> = Vec::new();

    for root in roots {
        stack.push((
            root,
            Inherited {
                matrix: Mat4::IDENTITY,
                color: Vec4::ONE,
                layer: None,
            },
        ));

        while let Some((entity, parent)) = stack.pop() {
            let local = match world.get::<&TransformComponent>(entity) {
                Ok(t) => t.0,
                Err(_) => {
                    log::trace!("Entity {:?} has no TransformComponent, skipping", entity);
                    continue;
                }
            };

            let matrix = local.world_matrix(&parent.matrix);
            let color = parent.color * world.get::<&Color>(entity).map(|c| c.0).unwrap_or(Vec4::ONE);
            let size = world.get::<&Size>(entity).map(|s| s.0).unwrap_or_default();

            let layer = match world.get::<&LayerRoot>(entity) {
                Ok(root) => {
                    pass.layer_order.push(root.0);
                    depth_counters.insert(root.0, 0);
                    Some(root.0)
                }
                Err(_) => parent.layer,
            };

            let mut changed = false;
            let mut has_world_matrix = false;
            if let Ok(mut wm) = world.get::<&mut WorldMatrix>(entity) {
                wm.set(buffer, matrix);
                changed |= wm.changed();
                has_world_matrix = true;
            }
            if !has_world_matrix {
                if let Err(e) = world.insert_one(entity, WorldMatrix::new(matrix)) {
                    log::error!("Failed to insert WorldMatrix for entity {:?}: {:?}", entity, e);
                    continue;
                }
                changed = true;
            }

            if let Ok(mut wc) = world.get::<&mut WorldColor>(entity) {
                changed |= wc.0 != color;
                wc.0 = color;
            }

            if let Ok(mut sphere) = world.get::<&mut BoundingSphere>(entity) {
                let scaled = size
                    * glam::Vec3::new(
                        matrix.x_axis.xyz().length(),
                        matrix.y_axis.xyz().length(),
                        matrix.z_axis.xyz().length(),
                    );
                sphere.0 = matrix.w_axis.xyz().extend(scaled.length() * 0.5);
            }

            if let Some(layer) = layer {
                let counter = depth_counters.entry(layer).or_insert(0);
                let author = world.get::<&DepthIndex>(entity).map(|d| d.0).unwrap_or(0);
                if let Ok(mut depth) = world.get::<&mut SortingDepth>(entity) {
                    depth.0 = *counter * SORTED_DEPTH_MULTIPLIER + author;
                }
                *counter += 1;
                if changed {
                    pass.dirty_layers.insert(layer);
                }
            }

            log::trace!(
                "Entity {:?}: world T:{:?}, changed: {}",
                entity,
                matrix.w_axis.xyz(),
                changed
            );

            if let Ok(children) = world.get::<&Children>(entity) {
                for &child in children.0.iter().rev() {
                    stack.push((
                        child,
                        Inherited {
                            matrix,
                            color,
                            layer,
                        },
                    ));
                }
            }
        }
    }

    pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::components::Name;
    use crate::scene::transform::{Inherit, Transform};
    use glam::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn spawn_pair(world: &mut World, parent_t: Transform, child_t: Transform) -> (hecs::Entity, hecs::Entity) {
        let parent = world.spawn((Name::new("Parent"), TransformComponent(parent_t)));
        let child = world.spawn((Name::new("Child"), TransformComponent(child_t), Parent(parent)));
        world.insert_one(parent, Children(vec![child])).ok();
        (parent, child)
    }

    #[test]
    fn child_world_matrix_composes_with_parent() {
        let mut world = World::new();
        let (parent, child) = spawn_pair(
            &mut world,
            Transform::from_trs(Vec3::new(5.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2), Vec3::ONE),
            Transform::from_translation(Vec3::new(2.0, 0.0, 0.0)),
        );

        propagate_transforms(&mut world, 0);

        let origin = |entity| world.get::<&WorldMatrix>(entity).map(|wm| wm.get(0).w_axis.xyz()).ok();
        assert_eq!(origin(parent), Some(Vec3::new(5.0, 0.0, 0.0)));
        let child_origin = origin(child).unwrap_or_default();
        assert!(child_origin.abs_diff_eq(Vec3::new(5.0, 0.0, -2.0), 1e-5));
    }

    #[test]
    fn uninherited_orientation_is_dropped() {
        let mut world = World::new();
        let (_, child) = spawn_pair(
            &mut world,
            Transform::from_trs(Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2), Vec3::ONE),
            Transform::from_translation(Vec3::new(2.0, 0.0, 0.0))
                .with_inherit(Inherit::POSITION | Inherit::SCALE),
        );

        propagate_transforms(&mut world, 0);

        let matrix = world.get::<&WorldMatrix>(child).map(|wm| wm.get(0)).unwrap_or(Mat4::ZERO);
        assert!(matrix.w_axis.xyz().abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), 1e-5));
        assert!(matrix.x_axis.xyz().abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn unchanged_layer_is_clean_on_second_pass() {
        let mut world = World::new();
        let layer: Handle<Layer> = Handle::new(0, 0);
        let (root, child) = spawn_pair(&mut world, Transform::IDENTITY, Transform::IDENTITY);
        world.insert_one(root, LayerRoot(layer)).ok();
        world.insert_one(child, SortingDepth::default()).ok();
        world.insert_one(child, WorldColor::default()).ok();

        let first = propagate_transforms(&mut world, 0);
        assert_eq!(first.layer_order, vec![layer]);
        assert!(first.dirty_layers.contains(&layer));

        let second = propagate_transforms(&mut world, 1);
        assert!(second.dirty_layers.is_empty());
        assert_eq!(world.get::<&SortingDepth>(child).map(|d| d.0).ok(), Some(SORTED_DEPTH_MULTIPLIER));

        world.insert_one(child, Color(Vec4::new(1.0, 1.0, 1.0, 0.5))).ok();
        let third = propagate_transforms(&mut world, 0);
        assert!(third.dirty_layers.contains(&layer));
    }

    #[test]
    fn bounding_sphere_follows_scale() {
        let mut world = World::new();
        let actor = world.spawn((
            TransformComponent(Transform::from_trs(Vec3::new(1.0, 2.0, 0.0), Quat::IDENTITY, Vec3::splat(2.0))),
            Size(Vec3::new(3.0, 4.0, 0.0)),
            BoundingSphere::default(),
        ));
        propagate_transforms(&mut world, 0);
        let sphere = *world.get::<&BoundingSphere>(actor).unwrap();
        assert!(sphere.center().abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
        assert!((sphere.radius() - 5.0).abs() < 1e-5);
    }
}
