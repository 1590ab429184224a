// prepare/sorter.rs
use std::cmp::Ordering;

use glam::Vec4Swizzles;

use super::render_item::{RenderItem, RenderList};
use crate::renderer::{Geometry, Program, TextureSet};
use crate::resource::Handle;
use crate::scene::Layer;

/// Per-item sort key, extracted once so the comparators never touch the
/// items themselves.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SortAttributes {
    pub program: Option<Handle<Program>>,
    pub texture_set: Option<Handle<TextureSet>>,
    pub geometry: Option<Handle<Geometry>>,
    pub depth_index: i32,
    pub z_value: f32,
    pub is_opaque: bool,
    pub clipping_sort_modifier: u32,
    /// Slot of the item in its render list.
    pub item: usize,
}

impl SortAttributes {
    fn new(item: &RenderItem, slot: usize, z_value: f32) -> Self {
        Self {
            program: item.program,
            texture_set: item.texture_set,
            geometry: item.geometry,
            depth_index: item.depth_index,
            z_value,
            is_opaque: item.is_opaque,
            clipping_sort_modifier: item.clipping_sort_modifier,
            item: slot,
        }
    }
}

type Comparator = fn(&SortAttributes, &SortAttributes) -> Ordering;

/// Indexed by [`comparator_index`].
pub(crate) const SORT_COMPARATORS: [Comparator; 3] =
    [compare_items, compare_items_3d, compare_items_3d_with_clipping];

pub(crate) fn comparator_index(is_layer_3d: bool, respect_clipping_order: bool) -> usize {
    match (is_layer_3d, respect_clipping_order) {
        (false, _) => 0,
        (true, false) => 1,
        (true, true) => 2,
    }
}

/// Groups items sharing GPU state so consecutive draws can skip rebinding.
fn partial_compare_items(lhs: &SortAttributes, rhs: &SortAttributes) -> Ordering {
    lhs.program
        .cmp(&rhs.program)
        .then(lhs.texture_set.cmp(&rhs.texture_set))
        .then(lhs.geometry.cmp(&rhs.geometry))
}

/// 2D order: depth index, then shared state.
fn compare_items(lhs: &SortAttributes, rhs: &SortAttributes) -> Ordering {
    lhs.depth_index
        .cmp(&rhs.depth_index)
        .then_with(|| partial_compare_items(lhs, rhs))
}

/// Low mantissa bits dropped before comparing z values.
const Z_TIE_BITS: u32 = 4;

/// Rounds `z` to a grid a few ULPs wide, keeping the order of distinct
/// values. Both zeros map to `0.0`.
fn snap_z(z: f32) -> f32 {
    if z == 0.0 {
        return 0.0;
    }
    let half = 1u32 << (Z_TIE_BITS - 1);
    let mask = !((1u32 << Z_TIE_BITS) - 1);
    f32::from_bits(z.to_bits().wrapping_add(half) & mask)
}

/// Near-equal z values tie so the state grouping decides.
///
/// Snapping to a grid keeps the comparison a total order, which a plain
/// epsilon test is not.
fn compare_z(lhs: f32, rhs: f32) -> Ordering {
    snap_z(lhs).total_cmp(&snap_z(rhs))
}

/// 3D order: opaque items first, near to far; then the rest far to near.
fn compare_items_3d(lhs: &SortAttributes, rhs: &SortAttributes) -> Ordering {
    if lhs.is_opaque != rhs.is_opaque {
        return if lhs.is_opaque {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    let by_distance = if lhs.is_opaque {
        compare_z(lhs.z_value, rhs.z_value)
    } else {
        compare_z(rhs.z_value, lhs.z_value)
    };
    by_distance.then_with(|| partial_compare_items(lhs, rhs))
}

/// 3D order inside each clipping region, regions in tree order.
fn compare_items_3d_with_clipping(lhs: &SortAttributes, rhs: &SortAttributes) -> Ordering {
    lhs.clipping_sort_modifier
        .cmp(&rhs.clipping_sort_modifier)
        .then_with(|| compare_items_3d(lhs, rhs))
}

/// Reorders render lists. Keeps its scratch buffer between calls.
#[derive(Debug, Default)]
pub struct RenderItemSorter {
    sorting_helper: Vec<SortAttributes>,
}

impl RenderItemSorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable-sorts `list` for `layer`. Only the list's order is rewritten.
    ///
    /// Returns false when the list was already in order and no sort ran.
    pub fn sort(
        &mut self,
        list: &mut RenderList,
        layer: &Layer,
        respect_clipping_order: bool,
        is_orthographic_camera: bool,
    ) -> bool {
        let items = list.cached_items();
        self.sorting_helper.clear();
        self.sorting_helper.reserve(list.len());

        let use_distance = layer.is_3d() && !is_orthographic_camera;
        for &slot in list.order() {
            let Some(item) = items.get(slot) else {
                continue;
            };
            let position = item.model_view.w_axis.xyz();
            let z_value = match layer.sort_function {
                Some(sort_function) => sort_function(position),
                None if use_distance => position.length_squared(),
                None => -position.z,
            };
            self.sorting_helper.push(SortAttributes::new(
                item,
                slot,
                z_value - item.depth_index as f32,
            ));
        }

        let comparator = SORT_COMPARATORS[comparator_index(layer.is_3d(), respect_clipping_order)];
        let needs_sort = self
            .sorting_helper
            .windows(2)
            .any(|pair| comparator(&pair[0], &pair[1]) == Ordering::Greater);
        if !needs_sort {
            log::trace!("Render list of {} items already sorted", self.sorting_helper.len());
            return false;
        }

        self.sorting_helper.sort_by(comparator);
        list.set_order(self.sorting_helper.iter().map(|attributes| attributes.item));
        log::trace!("Sorted render list of {} items", self.sorting_helper.len());
        true
    }
}
