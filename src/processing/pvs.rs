use log::{debug, warn};
use rayon::prelude::*;
use std::sync::OnceLock;
use crate::math::{
    clip_polygon, cross, dot, length, mul, polygon_center, sphere_overlaps_aabb, sub, Plane, Vec3, AABB, EPSILON,
};
use crate::mission::worldrep::Cell;

// Portal planes closer than this to facing each other are never chained
const ANTIPARALLEL_DOT: f32 = -0.99;

// Windows expanded by one light before the exact flood gives up on it
const EXACT_FLOOD_BUDGET: usize = 1 << 16;

/// Directed portal from `src` into `dst`
#[derive(Debug)]
pub struct Edge {
    pub src: usize,
    pub dst: usize,
    /// Portal plane, normal pointing into `src`
    pub plane: Plane,
    pub points: Vec<Vec3>,
    might_see: OnceLock<Vec<usize>>,
}

#[derive(Debug, Default)]
pub struct Node {
    pub edges: Vec<usize>,
}

#[derive(Debug)]
pub struct PortalGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl PortalGraph {
    pub fn build(cells: &[Cell]) -> Self {
        let mut nodes: Vec<Node> = (0..cells.len()).map(|_| Node::default()).collect();
        let mut edges = Vec::new();

        for (src, cell) in cells.iter().enumerate() {
            for p in cell.portal_range() {
                let Some(dst) = cell.polygons[p].destination else { continue };
                nodes[src].edges.push(edges.len());
                edges.push(Edge {
                    src,
                    dst: dst as usize,
                    plane: cell.plane_of(p),
                    points: cell.polygon_points(p),
                    might_see: OnceLock::new(),
                });
            }
        }

        debug!("Portal graph: {} nodes, {} edges", nodes.len(), edges.len());
        Self { nodes, edges }
    }

    /// Fills the might-see cache of every edge leaving the given cells
    pub fn precompute(&self, cells: &[usize]) {
        let edges: Vec<usize> = cells.iter()
            .flat_map(|&c| self.nodes[c].edges.iter().copied())
            .collect();
        edges.par_iter().for_each(|&e| {
            self.might_see(e);
        });
    }

    /// Cells possibly visible through edge `e`, its destination included
    pub fn might_see(&self, e: usize) -> &[usize] {
        self.edges[e].might_see.get_or_init(|| self.flood(e))
    }

    fn flood(&self, root: usize) -> Vec<usize> {
        let mut accepted = vec![false; self.edges.len()];
        let mut cells = vec![self.edges[root].dst];
        let mut work = vec![root];

        while let Some(via) = work.pop() {
            let via_edge = &self.edges[via];
            for &g in &self.nodes[via_edge.dst].edges {
                if accepted[g] {
                    continue;
                }
                let far = &self.edges[g];
                if !can_see_through(via_edge, far) {
                    continue;
                }
                if via != root && !can_see_through(&self.edges[root], far) {
                    continue;
                }
                accepted[g] = true;
                cells.push(far.dst);
                work.push(g);
            }
        }

        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Conservative set of cells visible from anywhere in `cell`
    pub fn visible_cells(&self, cell: usize) -> Vec<usize> {
        let mut out = vec![cell];
        for &e in &self.nodes[cell].edges {
            out.push(self.edges[e].dst);
            out.extend_from_slice(self.might_see(e));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Cells a light at `pos` can reach through the portals, cut to its radius
    pub fn light_visible_cells(&self, pos: Vec3, radius_sq: f32, home: usize) -> Vec<usize> {
        struct Window {
            cell: usize,
            points: Vec<Vec3>,
            path: Vec<usize>,
        }

        let mut visible = vec![false; self.nodes.len()];
        visible[home] = true;

        let mut stack: Vec<Window> = self.nodes[home].edges.iter()
            .map(|&e| &self.edges[e])
            .filter(|e| sphere_overlaps_aabb(pos, radius_sq, &AABB::from_points(&e.points)))
            .map(|e| Window { cell: e.dst, points: e.points.clone(), path: vec![home, e.dst] })
            .collect();

        let mut expanded = 0;
        while let Some(window) = stack.pop() {
            visible[window.cell] = true;

            expanded += 1;
            if expanded > EXACT_FLOOD_BUDGET {
                warn!("Light at {:?}: exact visibility gave up after {} portals, using the fast set", pos, EXACT_FLOOD_BUDGET);
                for c in self.visible_cells(home) {
                    visible[c] = true;
                }
                break;
            }

            let frustum = window_frustum(pos, &window.points);
            for &g in &self.nodes[window.cell].edges {
                let edge = &self.edges[g];
                if window.path.contains(&edge.dst) || edge.plane.distance(pos) <= EPSILON {
                    continue;
                }

                let mut clipped = edge.points.clone();
                for plane in &frustum {
                    clipped = clip_polygon(&clipped, plane);
                    if clipped.len() < 3 {
                        break;
                    }
                }
                if clipped.len() < 3 || !sphere_overlaps_aabb(pos, radius_sq, &AABB::from_points(&clipped)) {
                    continue;
                }

                let mut path = window.path.clone();
                path.push(edge.dst);
                stack.push(Window { cell: edge.dst, points: clipped, path });
            }
        }

        visible.iter()
            .enumerate()
            .filter_map(|(i, &v)| v.then_some(i))
            .collect()
    }
}

/// Fast chaining test between a nearer and a farther portal
fn can_see_through(near: &Edge, far: &Edge) -> bool {
    if dot(near.plane.normal, far.plane.normal) <= ANTIPARALLEL_DOT {
        return false;
    }
    let far_behind_near = far.points.iter().any(|&p| near.plane.distance(p) < -EPSILON);
    let near_in_front_of_far = near.points.iter().any(|&p| far.plane.distance(p) > EPSILON);
    far_behind_near && near_in_front_of_far
}

/// Side planes of the pyramid from `eye` through `window`, facing inward
fn window_frustum(eye: Vec3, window: &[Vec3]) -> Vec<Plane> {
    let center = polygon_center(window);
    let mut planes = Vec::with_capacity(window.len());

    for (i, &a) in window.iter().enumerate() {
        let b = window[(i + 1) % window.len()];
        let n = cross(sub(a, eye), sub(b, eye));
        let len = length(n);
        if len < 1e-6 {
            continue;
        }
        let mut n = mul(n, 1.0 / len);
        let side = dot(n, sub(center, eye));
        if side.abs() < 1e-6 {
            // Eye in the window plane, this side gives no cut
            continue;
        }
        if side < 0.0 {
            n = mul(n, -1.0);
        }
        planes.push(Plane::from_point_normal(eye, n));
    }

    planes
}
