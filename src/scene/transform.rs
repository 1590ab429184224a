use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};

bitflags! {
    /// Parts of the parent's world transform an actor picks up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Inherit: u8 {
        const POSITION = 1 << 0;
        const ORIENTATION = 1 << 1;
        const SCALE = 1 << 2;
    }
}

impl Default for Inherit {
    fn default() -> Self {
        Inherit::all()
    }
}

/// Local placement of an actor relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub inherit: Inherit,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
        inherit: Inherit::all(),
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            ..Self::IDENTITY
        }
    }

    pub fn with_inherit(mut self, inherit: Inherit) -> Self {
        self.inherit = inherit;
        self
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// World matrix under `parent`, dropping the parts not inherited.
    pub fn world_matrix(&self, parent: &Mat4) -> Mat4 {
        if self.inherit == Inherit::all() {
            return *parent * self.local_matrix();
        }

        let (parent_scale, parent_rotation, _) = parent.to_scale_rotation_translation();
        let scale = if self.inherit.contains(Inherit::SCALE) {
            parent_scale * self.scale
        } else {
            self.scale
        };
        let rotation = if self.inherit.contains(Inherit::ORIENTATION) {
            parent_rotation * self.rotation
        } else {
            self.rotation
        };
        let translation = if self.inherit.contains(Inherit::POSITION) {
            parent.transform_point3(self.translation)
        } else {
            self.translation
        };
        Mat4::from_scale_rotation_translation(scale, rotation, translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn parent() -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_z(FRAC_PI_2),
            Vec3::new(100.0, 0.0, 0.0),
        )
    }

    #[test]
    fn full_inheritance_multiplies_matrices() {
        let local = Transform::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let world = local.world_matrix(&parent());
        assert!(world.abs_diff_eq(parent() * local.local_matrix(), 1e-5));
        // Rotated a quarter turn, scaled by two, then moved.
        assert!(world.w_axis.truncate().abs_diff_eq(Vec3::new(100.0, 20.0, 0.0), 1e-4));
    }

    #[test]
    fn position_only_keeps_local_orientation_and_scale() {
        let local = Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)).with_inherit(Inherit::POSITION);
        let world = local.world_matrix(&parent());
        let (scale, rotation, translation) = world.to_scale_rotation_translation();
        assert!(scale.abs_diff_eq(Vec3::ONE, 1e-5));
        assert!(rotation.abs_diff_eq(Quat::IDENTITY, 1e-5));
        assert!(translation.abs_diff_eq(Vec3::new(100.0, 20.0, 0.0), 1e-4));
    }

    #[test]
    fn nothing_inherited_is_local() {
        let local = Transform::from_trs(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::splat(3.0))
            .with_inherit(Inherit::empty());
        assert!(local.world_matrix(&parent()).abs_diff_eq(local.local_matrix(), 1e-5));
    }
}
