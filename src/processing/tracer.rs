use crate::math::{add, cross, dot, mul, sub, Vec3, AABB};
use log::debug;

const EPSILON: f32 = 0.001;
const LEAF_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceClass {
    Solid,
    Sky,
    Object,
}

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v: [Vec3; 3],
    pub class: SurfaceClass,
}

#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub pos: Vec3,
    pub prim_id: usize,
    pub dist: f32,
}

/// Read-only ray queries over a committed triangle set
pub trait RayScene: Sync {
    /// Closest hit along the ray
    fn trace(&self, origin: Vec3, dir: Vec3) -> Option<RayHit>;

    /// True if anything lies between `origin` and `origin + dir * max_dist`
    fn is_occluded(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> bool;

    fn class_of(&self, prim_id: usize) -> SurfaceClass;
}

#[derive(Debug, Clone)]
struct Node {
    bounds: AABB,
    // Leaf: range into `order`. Inner: children at `first` and `first + 1`
    first: usize,
    count: usize,
}

/// Median-split bounding volume hierarchy. Built once by `commit`, immutable after
#[derive(Debug, Clone)]
pub struct BvhScene {
    triangles: Vec<Triangle>,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl BvhScene {
    pub fn commit(triangles: Vec<Triangle>) -> Self {
        let mut scene = Self {
            order: (0..triangles.len()).collect(),
            triangles,
            nodes: Vec::new(),
        };

        if !scene.triangles.is_empty() {
            let centroids: Vec<Vec3> = scene.triangles.iter()
                .map(|t| mul(add(add(t.v[0], t.v[1]), t.v[2]), 1.0 / 3.0))
                .collect();
            scene.nodes.push(Node { bounds: AABB::new(), first: 0, count: scene.triangles.len() });
            scene.build(0, &centroids);
        }

        debug!("Committed ray scene: {} triangles, {} nodes", scene.triangles.len(), scene.nodes.len());
        scene
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn build(&mut self, node_idx: usize, centroids: &[Vec3]) {
        let (first, count) = (self.nodes[node_idx].first, self.nodes[node_idx].count);

        let mut bounds = AABB::new();
        let mut centroid_bounds = AABB::new();
        for &t in &self.order[first..first + count] {
            for v in self.triangles[t].v {
                bounds.extend(v);
            }
            centroid_bounds.extend(centroids[t]);
        }
        self.nodes[node_idx].bounds = bounds;

        if count <= LEAF_SIZE {
            return;
        }

        let axis = centroid_bounds.longest_axis();
        let slice = &mut self.order[first..first + count];
        slice.sort_by(|&a, &b| centroids[a][axis].total_cmp(&centroids[b][axis]));
        let half = count / 2;

        let left = self.nodes.len();
        self.nodes.push(Node { bounds: AABB::new(), first, count: half });
        self.nodes.push(Node { bounds: AABB::new(), first: first + half, count: count - half });
        self.nodes[node_idx].first = left;
        self.nodes[node_idx].count = 0;

        self.build(left, centroids);
        self.build(left + 1, centroids);
    }

    /// Walks the tree; `visit` returns the new max distance, or None to stop early
    fn walk(&self, origin: Vec3, dir: Vec3, max_dist: f32, mut visit: impl FnMut(usize, f32) -> Option<f32>) {
        if self.nodes.is_empty() {
            return;
        }
        let mut limit = max_dist;
        let mut stack = vec![0usize];

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !ray_aabb_intersect(origin, dir, limit, &node.bounds) {
                continue;
            }
            if node.count == 0 {
                stack.push(node.first);
                stack.push(node.first + 1);
                continue;
            }
            for &t in &self.order[node.first..node.first + node.count] {
                if let Some(dist) = intersect_triangle(origin, dir, &self.triangles[t].v) {
                    if dist < limit {
                        match visit(t, dist) {
                            Some(new_limit) => limit = new_limit,
                            None => return,
                        }
                    }
                }
            }
        }
    }
}

impl RayScene for BvhScene {
    fn trace(&self, origin: Vec3, dir: Vec3) -> Option<RayHit> {
        let mut best: Option<(usize, f32)> = None;
        self.walk(origin, dir, f32::MAX, |t, dist| {
            best = Some((t, dist));
            Some(dist)
        });

        best.map(|(prim_id, dist)| RayHit {
            pos: add(origin, mul(dir, dist)),
            prim_id,
            dist,
        })
    }

    fn is_occluded(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> bool {
        if max_dist < EPSILON {
            return false;
        }
        let mut hit = false;
        self.walk(origin, dir, max_dist, |_, _| {
            hit = true;
            None
        });
        hit
    }

    fn class_of(&self, prim_id: usize) -> SurfaceClass {
        self.triangles[prim_id].class
    }
}

fn ray_aabb_intersect(origin: Vec3, dir: Vec3, max_dist: f32, aabb: &AABB) -> bool {
    let mut tmin = 0.0_f32;
    let mut tmax = max_dist;
    for i in 0..3 {
        if dir[i].abs() < 1e-6 {
            if origin[i] < aabb.min[i] - EPSILON || origin[i] > aabb.max[i] + EPSILON { return false; }
        } else {
            let ood = 1.0 / dir[i];
            let mut t1 = (aabb.min[i] - EPSILON - origin[i]) * ood;
            let mut t2 = (aabb.max[i] + EPSILON - origin[i]) * ood;
            if t1 > t2 { std::mem::swap(&mut t1, &mut t2); }
            tmin = tmin.max(t1);
            tmax = tmax.min(t2);
            if tmin > tmax { return false; }
        }
    }
    true
}

/// Möller-Trumbore, double sided. Hits closer than EPSILON are ignored
fn intersect_triangle(origin: Vec3, dir: Vec3, v: &[Vec3; 3]) -> Option<f32> {
    let e1 = sub(v[1], v[0]);
    let e2 = sub(v[2], v[0]);
    let p = cross(dir, e2);
    let det = dot(e1, p);
    if det.abs() < 1e-9 {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = sub(origin, v[0]);
    let u = dot(s, p) * inv_det;
    if !(-1e-6..=1.0 + 1e-6).contains(&u) {
        return None;
    }
    let q = cross(s, e1);
    let w = dot(dir, q) * inv_det;
    if w < -1e-6 || u + w > 1.0 + 1e-6 {
        return None;
    }

    let t = dot(e2, q) * inv_det;
    (t > EPSILON).then_some(t)
}
