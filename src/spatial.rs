// Spatial test primitives shared by culling and hit testing.
//
// Conventions: right-handed world, wgpu clip space (depth in [0, 1]), window
// coordinates with the origin at the bottom-left of the viewport.

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

/// Bounding radii at or below this count as "no bounds".
pub const BOUNDS_EPSILON: f32 = f32::EPSILON * 1000.0;
/// Ray/plane products at or below this are treated as parallel.
pub const PARALLEL_EPSILON: f32 = f32::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    fn from_row(row: Vec4) -> Self {
        let length = row.xyz().length();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::ZERO,
                distance: row.w,
            };
        }
        Self {
            normal: row.xyz() / length,
            distance: row.w / length,
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// The six planes of a view frustum, normals pointing inwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumPlanes {
    planes: [Plane; 6],
    clip_matrix: Mat4,
}

impl Default for FrustumPlanes {
    fn default() -> Self {
        Self::from_view_projection(Mat4::IDENTITY)
    }
}

impl FrustumPlanes {
    /// Extracts the planes from the rows of a view-projection matrix.
    pub fn from_view_projection(clip_matrix: Mat4) -> Self {
        let r0 = clip_matrix.row(0);
        let r1 = clip_matrix.row(1);
        let r2 = clip_matrix.row(2);
        let r3 = clip_matrix.row(3);
        Self {
            planes: [
                Plane::from_row(r3 + r0), // left
                Plane::from_row(r3 - r0), // right
                Plane::from_row(r3 + r1), // bottom
                Plane::from_row(r3 - r1), // top
                Plane::from_row(r2),      // near, depth 0
                Plane::from_row(r3 - r2), // far
            ],
            clip_matrix,
        }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// True if the sphere touches the frustum.
    pub fn sphere_in_frustum(&self, center: Vec3, radius: f32) -> bool {
        // Centre inside the clip volume is enough.
        let clip = self.clip_matrix * center.extend(1.0);
        if clip.w > 0.0
            && clip.x.abs() <= clip.w
            && clip.y.abs() <= clip.w
            && clip.z >= 0.0
            && clip.z <= clip.w
        {
            return true;
        }
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) >= -radius)
    }

    /// True if the axis-aligned box touches the frustum.
    pub fn aabb_in_frustum(&self, center: Vec3, half_extents: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let reach = half_extents.dot(plane.normal.abs());
            plane.signed_distance(center) >= -reach
        })
    }
}

/// Integer rectangle in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClippingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ClippingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn intersects(&self, other: &ClippingBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.top()
            && other.y < self.top()
    }

    pub fn intersection(&self, other: &ClippingBox) -> ClippingBox {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.top().min(other.top());
        ClippingBox::new(
            x0,
            y0,
            x1.saturating_sub(x0).max(0),
            y1.saturating_sub(y0).max(0),
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x as f32
            && point.x <= self.right() as f32
            && point.y >= self.y as f32
            && point.y <= self.top() as f32
    }

    fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    fn top(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

/// Render task viewport. Same layout as a clipping box.
pub type Viewport = ClippingBox;

/// Window-space bounding rectangle of a local box under `mvp`.
///
/// Returns `None` when any corner lies on or behind the eye plane, in which
/// case the box cannot be bounded on screen.
pub fn clip_space_aabb(
    mvp: &Mat4,
    local_min: Vec3,
    local_max: Vec3,
    viewport: &Viewport,
) -> Option<ClippingBox> {
    let mut min = Vec2::splat(f32::MAX);
    let mut max = Vec2::splat(f32::MIN);
    for i in 0..8 {
        let corner = Vec3::new(
            if i & 1 == 0 { local_min.x } else { local_max.x },
            if i & 2 == 0 { local_min.y } else { local_max.y },
            if i & 4 == 0 { local_min.z } else { local_max.z },
        );
        let clip = *mvp * corner.extend(1.0);
        if clip.w <= PARALLEL_EPSILON {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        let window = Vec2::new(
            viewport.x as f32 + (ndc.x * 0.5 + 0.5) * viewport.width as f32,
            viewport.y as f32 + (ndc.y * 0.5 + 0.5) * viewport.height as f32,
        );
        min = min.min(window);
        max = max.max(window);
    }
    // Corners near the eye plane project arbitrarily far; one viewport of
    // slack on each side keeps the intersection result unchanged.
    let slack = viewport.width.max(viewport.height).max(1) as f32;
    let lower = Vec2::new(viewport.x as f32, viewport.y as f32) - slack;
    let upper = Vec2::new(
        viewport.x as f32 + viewport.width as f32,
        viewport.y as f32 + viewport.height as f32,
    ) + slack;
    let min = min.clamp(lower, upper).floor();
    let max = max.clamp(lower, upper).ceil();
    Some(ClippingBox::new(
        min.x as i32,
        min.y as i32,
        (max.x - min.x) as i32,
        (max.y - min.y) as i32,
    ))
}

/// Window position (x, y in pixels, z in depth [0, 1]) back to world space.
pub fn unproject(window: Vec3, inverse_view_projection: &Mat4, width: f32, height: f32) -> Option<Vec3> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let ndc = Vec4::new(
        window.x / width * 2.0 - 1.0,
        window.y / height * 2.0 - 1.0,
        window.z,
        1.0,
    );
    let world = *inverse_view_projection * ndc;
    if world.w.abs() <= PARALLEL_EPSILON {
        return None;
    }
    Some(world.xyz() / world.w)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Coarse test against the sphere bounding a node: centre at the world
/// translation, radius² = ½((w·sx)² + (h·sy)²).
pub fn ray_sphere_test(ray: &Ray, world_matrix: &Mat4, size: Vec3) -> bool {
    let (scale, _, translation) = world_matrix.to_scale_rotation_translation();
    let radius_sq = 0.5
        * (size.x * size.x * scale.x * scale.x + size.y * size.y * scale.y * scale.y);
    let local_origin = ray.origin - translation;
    let a = ray.direction.dot(ray.direction);
    let half_b = ray.direction.dot(local_origin);
    let c = local_origin.dot(local_origin) - radius_sq;
    half_b * half_b - a * c >= 0.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorHit {
    /// Hit point in the node's local plane, measured from its bottom-left
    /// corner, so within `[0, size]`.
    pub local: Vec2,
    /// Distance along the ray; never negative.
    pub distance: f32,
}

/// Intersects the ray with the node's local XY plane and checks the hit
/// lies within the node's size.
pub fn ray_actor_test(ray: &Ray, world_matrix: &Mat4, size: Vec3) -> Option<ActorHit> {
    let inverse = world_matrix.inverse();
    let origin = inverse.transform_point3(ray.origin);
    let direction = inverse.transform_vector3(ray.direction);

    if direction.z.abs() <= PARALLEL_EPSILON {
        return None;
    }
    // Affine transforms keep the ray parameter, so this is a world distance.
    let distance = -origin.z / direction.z;
    if !distance.is_finite() || distance < 0.0 {
        return None;
    }

    let hit = origin + direction * distance;
    let local = Vec2::new(hit.x + size.x * 0.5, hit.y + size.y * 0.5);
    let inside = local.x >= 0.0 && local.x <= size.x && local.y >= 0.0 && local.y <= size.y;
    inside.then_some(ActorHit { local, distance })
}
