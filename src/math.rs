use serde::{Deserialize, Serialize};

pub type Vec3 = [f32; 3];
pub type Vec2 = [f32; 2];

/// Geometric epsilon used for containment and plane-side tests
pub const EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for AABB {
    fn default() -> Self {
        Self::new()
    }
}

impl AABB {
    pub fn new() -> Self {
        Self {
            min: [f32::MAX, f32::MAX, f32::MAX],
            max: [f32::MIN, f32::MIN, f32::MIN],
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut aabb = Self::new();
        for p in points {
            aabb.extend(*p);
        }
        aabb
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min[0] = self.min[0].min(p[0]);
        self.min[1] = self.min[1].min(p[1]);
        self.min[2] = self.min[2].min(p[2]);

        self.max[0] = self.max[0].max(p[0]);
        self.max[1] = self.max[1].max(p[1]);
        self.max[2] = self.max[2].max(p[2]);
    }

    pub fn contains_point(&self, p: Vec3, eps: f32) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] - eps && p[i] <= self.max[i] + eps)
    }

    pub fn longest_axis(&self) -> usize {
        let ext = sub(self.max, self.min);
        if ext[0] >= ext[1] && ext[0] >= ext[2] {
            0
        } else if ext[1] >= ext[2] {
            1
        } else {
            2
        }
    }
}

/// Plane in `N*P + d = 0` form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
}

impl Plane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self { normal, dist }
    }

    /// Plane through `point` with the given (unit) normal
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Self { normal, dist: -dot(normal, point) }
    }

    /// Signed distance, positive on the side the normal points to
    pub fn distance(&self, p: Vec3) -> f32 {
        dot(self.normal, p) + self.dist
    }
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn mul(a: Vec3, s: f32) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn mul_elem(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2]]
}

pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(a: Vec3) -> f32 {
    dot(a, a).sqrt()
}

pub fn normalize(a: Vec3) -> Vec3 {
    let len = (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt();
    if len == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        [a[0] / len, a[1] / len, a[2] / len]
    }
}

pub fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    add(a, mul(sub(b, a), t))
}

pub fn max_component(a: Vec3) -> f32 {
    a[0].max(a[1]).max(a[2])
}

pub fn sq_dist_point_aabb(point: Vec3, aabb: &AABB) -> f32 {
    let mut sq_dist = 0.0;

    for i in 0..3 {
        let v = point[i];
        if v < aabb.min[i] {
            sq_dist += (aabb.min[i] - v) * (aabb.min[i] - v);
        }
        if v > aabb.max[i] {
            sq_dist += (v - aabb.max[i]) * (v - aabb.max[i]);
        }
    }

    sq_dist
}

/// True if the sphere reaches the box. Infinite radii always overlap
pub fn sphere_overlaps_aabb(center: Vec3, radius_sq: f32, aabb: &AABB) -> bool {
    radius_sq >= f32::MAX || sq_dist_point_aabb(center, aabb) <= radius_sq
}

pub fn polygon_center(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return [0.0; 3];
    }
    let sum = points.iter().fold([0.0; 3], |acc, p| add(acc, *p));
    mul(sum, 1.0 / points.len() as f32)
}

/// Sutherland-Hodgman clip, keeping the part on the front side of `plane`
pub fn clip_polygon(points: &[Vec3], plane: &Plane) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(points.len() + 1);
    if points.is_empty() {
        return out;
    }

    for (i, &a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        let da = plane.distance(a);
        let db = plane.distance(b);

        if da >= -EPSILON {
            out.push(a);
        }
        if (da > EPSILON && db < -EPSILON) || (da < -EPSILON && db > EPSILON) {
            let t = da / (da - db);
            out.push(lerp(a, b, t));
        }
    }

    out
}

/// Projection of a planar polygon to 2-D by dropping the dominant normal axis
#[derive(Debug, Clone, Copy)]
pub struct Projection2D {
    axes: (usize, usize),
}

impl Projection2D {
    pub fn for_normal(normal: Vec3) -> Self {
        let ax = normal[0].abs();
        let ay = normal[1].abs();
        let az = normal[2].abs();
        let axes = if ax >= ay && ax >= az {
            (1, 2)
        } else if ay >= az {
            (0, 2)
        } else {
            (0, 1)
        };
        Self { axes }
    }

    pub fn project(&self, p: Vec3) -> Vec2 {
        [p[self.axes.0], p[self.axes.1]]
    }
}

/// Point-in-convex-polygon test in 2-D, winding agnostic, edges inclusive
pub fn point_in_convex_polygon(poly: &[Vec2], p: Vec2) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for (i, a) in poly.iter().enumerate() {
        let b = poly[(i + 1) % poly.len()];
        let c = (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
        if c.abs() <= EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

/// Rotates `p` around `axis` through `pivot` by `angle` radians (Rodrigues)
pub fn rotate_about_axis(p: Vec3, pivot: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let k = normalize(axis);
    let v = sub(p, pivot);
    let (s, c) = angle.sin_cos();
    let rotated = add(
        add(mul(v, c), mul(cross(k, v), s)),
        mul(k, dot(k, v) * (1.0 - c)),
    );
    add(rotated, pivot)
}

/// Scale, then rotate about X, Y and Z in that order, then translate
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub scale: Vec3,
    rows: [Vec3; 3],
    pub translation: Vec3,
}

impl Transform {
    /// `angles` are (x, y, z) rotations in degrees
    pub fn new(translation: Vec3, angles: Vec3, scale: Vec3) -> Self {
        let (sx, cx) = angles[0].to_radians().sin_cos();
        let (sy, cy) = angles[1].to_radians().sin_cos();
        let (sz, cz) = angles[2].to_radians().sin_cos();

        // Rz * Ry * Rx
        let rows = [
            [cz * cy, cz * sy * sx - sz * cx, cz * sy * cx + sz * sx],
            [sz * cy, sz * sy * sx + cz * cx, sz * sy * cx - cz * sx],
            [-sy, cy * sx, cy * cx],
        ];

        Self { scale, rows, translation }
    }

    pub fn rotate(&self, v: Vec3) -> Vec3 {
        [dot(self.rows[0], v), dot(self.rows[1], v), dot(self.rows[2], v)]
    }

    pub fn apply(&self, p: Vec3) -> Vec3 {
        add(self.rotate(mul_elem(p, self.scale)), self.translation)
    }
}
