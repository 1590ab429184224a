use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::spatial::{unproject, FrustumPlanes, Ray, Viewport};
use crate::{BufferIndex, BUFFER_COUNT};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective { fov_y_radians: f32, aspect: f32 },
    Orthographic { left: f32, right: f32, bottom: f32, top: f32 },
}

/// Look-at camera with per-buffer derived matrices.
///
/// The authored fields are read by [`update`](Camera::update), which writes
/// the matrices and frustum for one buffer index. Readers must only look at
/// the buffer that was last updated.
#[derive(Clone, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    /// Plane `(n, d)` with `n·p + d = 0` to mirror the view about.
    pub reflection_plane: Option<Vec4>,

    view: [Mat4; BUFFER_COUNT],
    projection_matrix: [Mat4; BUFFER_COUNT],
    view_projection: [Mat4; BUFFER_COUNT],
    inverse_view_projection: [Mat4; BUFFER_COUNT],
    frustum: [FrustumPlanes; BUFFER_COUNT],
    last_view: Option<Mat4>,
    /// Frames left until an unchanged view counts as settled in every buffer.
    view_updated: u32,
}

impl Camera {
    pub fn new(eye: Vec3, target: Vec3, up: Vec3, projection: Projection, near: f32, far: f32) -> Self {
        Self {
            eye,
            target,
            up,
            projection,
            near,
            far,
            reflection_plane: None,
            view: [Mat4::IDENTITY; BUFFER_COUNT],
            projection_matrix: [Mat4::IDENTITY; BUFFER_COUNT],
            view_projection: [Mat4::IDENTITY; BUFFER_COUNT],
            inverse_view_projection: [Mat4::IDENTITY; BUFFER_COUNT],
            frustum: [FrustumPlanes::default(); BUFFER_COUNT],
            last_view: None,
            view_updated: BUFFER_COUNT as u32,
        }
    }

    /// Perspective camera looking down -Z at the origin from the distance at
    /// which one world unit on the z = 0 plane covers one pixel.
    pub fn for_scene_2d(size: Vec2) -> Self {
        let fov_y_radians = 45f32.to_radians();
        let distance = (size.y * 0.5) / (fov_y_radians * 0.5).tan();
        let aspect = if size.y > 0.0 { size.x / size.y } else { 1.0 };
        Self::new(
            Vec3::new(0.0, 0.0, distance),
            Vec3::ZERO,
            Vec3::Y,
            Projection::Perspective {
                fov_y_radians,
                aspect,
            },
            1.0,
            distance * 2.0,
        )
    }

    /// Orthographic camera mapping the z = 0 plane onto `size` pixels.
    pub fn orthographic_2d(size: Vec2) -> Self {
        let depth = size.x.max(size.y).max(1.0);
        Self::new(
            Vec3::new(0.0, 0.0, depth),
            Vec3::ZERO,
            Vec3::Y,
            Projection::Orthographic {
                left: -size.x * 0.5,
                right: size.x * 0.5,
                bottom: -size.y * 0.5,
                top: size.y * 0.5,
            },
            1.0,
            depth * 2.0,
        )
    }

    pub fn with_reflection_plane(mut self, plane: Vec4) -> Self {
        self.reflection_plane = Some(plane);
        self
    }

    pub fn is_perspective(&self) -> bool {
        matches!(self.projection, Projection::Perspective { .. })
    }

    pub fn is_orthographic(&self) -> bool {
        !self.is_perspective()
    }

    pub fn is_using_reflection(&self) -> bool {
        self.reflection_plane.is_some()
    }

    fn compute_view(&self) -> Mat4 {
        let look_at = Mat4::look_at_rh(self.eye, self.target, self.up);
        match self.reflection_plane {
            Some(plane) => look_at * reflection_matrix(plane),
            None => look_at,
        }
    }

    fn compute_projection(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                fov_y_radians,
                aspect,
            } => Mat4::perspective_rh(fov_y_radians, aspect, self.near, self.far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
            } => Mat4::orthographic_rh(left, right, bottom, top, self.near, self.far),
        }
    }

    /// Recomputes the derived matrices for `buffer`.
    pub fn update(&mut self, buffer: BufferIndex) {
        let view = self.compute_view();
        let projection = self.compute_projection();
        let view_projection = projection * view;

        if self.last_view != Some(view) {
            self.view_updated = BUFFER_COUNT as u32;
            self.last_view = Some(view);
        } else {
            self.view_updated = self.view_updated.saturating_sub(1);
        }

        self.view[buffer] = view;
        self.projection_matrix[buffer] = projection;
        self.view_projection[buffer] = view_projection;
        self.inverse_view_projection[buffer] = view_projection.inverse();
        self.frustum[buffer] = FrustumPlanes::from_view_projection(view_projection);
    }

    /// True until the view has held still for every buffer.
    pub fn view_matrix_updated(&self) -> bool {
        self.view_updated > 0
    }

    pub fn view_matrix(&self, buffer: BufferIndex) -> Mat4 {
        self.view[buffer]
    }

    pub fn projection_matrix(&self, buffer: BufferIndex) -> Mat4 {
        self.projection_matrix[buffer]
    }

    pub fn view_projection(&self, buffer: BufferIndex) -> Mat4 {
        self.view_projection[buffer]
    }

    pub fn inverse_view_projection(&self, buffer: BufferIndex) -> Mat4 {
        self.inverse_view_projection[buffer]
    }

    pub fn frustum(&self, buffer: BufferIndex) -> &FrustumPlanes {
        &self.frustum[buffer]
    }

    pub fn check_sphere_in_frustum(&self, buffer: BufferIndex, center: Vec3, radius: f32) -> bool {
        self.frustum[buffer].sphere_in_frustum(center, radius)
    }

    pub fn check_aabb_in_frustum(&self, buffer: BufferIndex, center: Vec3, half_extents: Vec3) -> bool {
        self.frustum[buffer].aabb_in_frustum(center, half_extents)
    }

    /// Eye position in world space, following any reflection.
    pub fn world_position(&self, buffer: BufferIndex) -> Vec3 {
        self.view[buffer].inverse().w_axis.xyz()
    }

    /// Unit viewing direction in world space.
    pub fn forward(&self, buffer: BufferIndex) -> Vec3 {
        self.view[buffer]
            .inverse()
            .transform_vector3(Vec3::NEG_Z)
            .normalize_or_zero()
    }

    /// Ray through a screen point given in pixels, y down, relative to the
    /// window; `viewport` is the area the camera renders into.
    pub fn picking_ray(&self, buffer: BufferIndex, screen: Vec2, viewport: &Viewport) -> Option<Ray> {
        let width = viewport.width as f32;
        let height = viewport.height as f32;
        let window = Vec2::new(
            screen.x - viewport.x as f32,
            height - (screen.y - viewport.y as f32),
        );
        let inverse = &self.inverse_view_projection[buffer];
        let near_point = unproject(window.extend(0.0), inverse, width, height)?;

        if self.is_perspective() {
            let origin = self.world_position(buffer);
            Some(Ray::new(origin, near_point - origin))
        } else {
            Some(Ray::new(near_point, self.forward(buffer)))
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::ZERO,
            Vec3::Y,
            Projection::Perspective {
                fov_y_radians: 60f32.to_radians(),
                aspect: 1.0,
            },
            0.1,
            100.0,
        )
    }
}

/// Mirror about `n·p + d = 0`: p' = p - 2(n·p + d)n.
fn reflection_matrix(plane: Vec4) -> Mat4 {
    let length = plane.xyz().length();
    if length <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    let n = plane.xyz() / length;
    let d = plane.w / length;
    Mat4::from_cols(
        Vec4::new(1.0 - 2.0 * n.x * n.x, -2.0 * n.x * n.y, -2.0 * n.x * n.z, 0.0),
        Vec4::new(-2.0 * n.x * n.y, 1.0 - 2.0 * n.y * n.y, -2.0 * n.y * n.z, 0.0),
        Vec4::new(-2.0 * n.x * n.z, -2.0 * n.y * n.z, 1.0 - 2.0 * n.z * n.z, 0.0),
        Vec4::new(-2.0 * d * n.x, -2.0 * d * n.y, -2.0 * d * n.z, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::ClippingBox;

    #[test]
    fn view_proj_is_reasonable() {
        let mut cam = Camera::default();
        cam.update(0);
        let vp = cam.view_projection(0);
        let id = vp * cam.inverse_view_projection(0);
        assert!(id.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn view_updated_settles_after_every_buffer() {
        let mut cam = Camera::default();
        cam.update(0);
        assert!(cam.view_matrix_updated());
        cam.update(1);
        assert!(cam.view_matrix_updated());
        cam.update(0);
        assert!(!cam.view_matrix_updated());

        cam.eye.x += 1.0;
        cam.update(1);
        assert!(cam.view_matrix_updated());
    }

    #[test]
    fn scene_2d_camera_maps_plane_to_pixels() {
        let size = Vec2::new(800.0, 600.0);
        let mut cam = Camera::for_scene_2d(size);
        cam.update(0);
        let clip = cam.view_projection(0) * Vec4::new(400.0, 300.0, 0.0, 1.0);
        let ndc = clip.xyz() / clip.w;
        assert!((ndc.x - 1.0).abs() < 1e-3);
        assert!((ndc.y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn picking_ray_through_centre_hits_origin() {
        let size = Vec2::new(200.0, 100.0);
        let viewport = ClippingBox::new(0, 0, 200, 100);
        for mut cam in [Camera::for_scene_2d(size), Camera::orthographic_2d(size)] {
            cam.update(0);
            let ray = cam
                .picking_ray(0, Vec2::new(100.0, 50.0), &viewport)
                .expect("ray");
            assert!(ray.direction.abs_diff_eq(Vec3::NEG_Z, 1e-4));
            let t = -ray.origin.z / ray.direction.z;
            assert!(ray.at(t).abs_diff_eq(Vec3::ZERO, 1e-2));
        }
    }

    #[test]
    fn picking_ray_flips_screen_y() {
        let size = Vec2::new(200.0, 100.0);
        let viewport = ClippingBox::new(0, 0, 200, 100);
        let mut cam = Camera::orthographic_2d(size);
        cam.update(0);
        // Top-left pixel of the screen is the top-left of the plane.
        let ray = cam.picking_ray(0, Vec2::ZERO, &viewport).expect("ray");
        assert!((ray.origin.x + 100.0).abs() < 1e-2);
        assert!((ray.origin.y - 50.0).abs() < 1e-2);
    }

    #[test]
    fn reflection_mirrors_the_view() {
        let mut cam = Camera::default().with_reflection_plane(Vec4::new(0.0, 1.0, 0.0, 0.0));
        cam.update(0);
        assert!(cam.is_using_reflection());
        let view = cam.view_matrix(0);
        let plain = Mat4::look_at_rh(cam.eye, cam.target, cam.up);
        let p = Vec3::new(0.0, 2.0, 0.0);
        let mirrored = Vec3::new(0.0, -2.0, 0.0);
        assert!(view
            .transform_point3(p)
            .abs_diff_eq(plain.transform_point3(mirrored), 1e-5));
    }
}
