// renderer/uniforms.rs
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Per-item uniform block, laid out for a WGSL `struct` of two `mat4x4<f32>`
/// and two `vec4<f32>`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, PartialEq, Debug)]
pub struct ItemUniforms {
    pub model_view: [[f32; 4]; 4],
    pub mvp: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// xyz is the node size, w is unused.
    pub size: [f32; 4],
}

impl ItemUniforms {
    pub fn new() -> Self {
        Self {
            model_view: Mat4::IDENTITY.to_cols_array_2d(),
            mvp: Mat4::IDENTITY.to_cols_array_2d(),
            color: Vec4::ONE.to_array(),
            size: [0.0; 4],
        }
    }

    pub fn from_item(model_view: Mat4, projection: Mat4, color: Vec4, size: Vec3) -> Self {
        Self {
            model_view: model_view.to_cols_array_2d(),
            mvp: (projection * model_view).to_cols_array_2d(),
            color: color.to_array(),
            size: size.extend(0.0).to_array(),
        }
    }
}

impl Default for ItemUniforms {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_uniforms_is_160_bytes() {
        // 2 * mat4x4<f32> = 128 bytes, 2 * vec4<f32> = 32 bytes
        assert_eq!(std::mem::size_of::<ItemUniforms>(), 160);
    }

    #[test]
    fn mvp_is_projection_times_model_view() {
        let model_view = Mat4::from_translation(Vec3::new(1.0, 2.0, -5.0));
        let projection = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        let uniforms = ItemUniforms::from_item(model_view, projection, Vec4::ONE, Vec3::splat(2.0));
        let mvp = Mat4::from_cols_array_2d(&uniforms.mvp);
        assert!(mvp.abs_diff_eq(projection * model_view, 1e-6));
        assert_eq!(uniforms.size, [2.0, 2.0, 2.0, 0.0]);
    }
}
