use log::{debug, warn};
use crate::math::{
    add, cross, dot, length, lerp, mul, normalize, point_in_convex_polygon, polygon_center, sphere_overlaps_aabb, sub,
    Plane, Projection2D, Vec2, Vec3, AABB, EPSILON,
};
use crate::mission::worldrep::{Cell, MAX_ANIM_LIGHTS_PER_CELL};
use crate::processing::falloff::strength_at_point;
use crate::processing::mesh::Scenes;
use crate::processing::tracer::{RayScene, SurfaceClass};
use crate::types::{Light, Settings, SoftnessMode};

// Samples are lifted this far off their polygon before tracing
const SURFACE_OFFSET: f32 = 0.01;
// Distance kept from an edge when pushing a sample back inside
const EDGE_INSET: f32 = 0.01;
const MAX_CENTER_STEPS: usize = 8;

/// Unlit water is written at full brightness
const FULL_BRIGHT: f32 = 255.0;

/// Sub-sample offset in texels and its share of the texel value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSample {
    pub du: f32,
    pub dv: f32,
    pub weight: f32,
}

pub fn sub_samples(mode: SoftnessMode, center_weight: f32) -> Vec<SubSample> {
    let at = |du, dv, weight| SubSample { du, dv, weight };
    let quarter = [(-0.25, -0.25), (0.25, -0.25), (-0.25, 0.25), (0.25, 0.25)];

    match mode {
        SoftnessMode::Standard => vec![at(0.0, 0.0, 1.0)],
        SoftnessMode::FourPoint => quarter.iter().map(|&(u, v)| at(u, v, 0.25)).collect(),
        SoftnessMode::FivePoint => {
            let side = (1.0 - center_weight) / 4.0;
            std::iter::once(at(0.0, 0.0, center_weight))
                .chain(quarter.iter().map(|&(u, v)| at(u, v, side)))
                .collect()
        }
        SoftnessMode::NinePoint => {
            let third = 1.0 / 3.0;
            let side = (1.0 - center_weight) / 8.0;
            let mut out = vec![at(0.0, 0.0, center_weight)];
            for v in [-third, 0.0, third] {
                for u in [-third, 0.0, third] {
                    if u != 0.0 || v != 0.0 {
                        out.push(at(u, v, side));
                    }
                }
            }
            out
        }
    }
}

/// Lighting of one render polygon before encoding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyLayers {
    pub base: Vec<Vec3>,
    /// Animated layers as (palette slot, texels), ascending by slot
    pub anim: Vec<(usize, Vec<Vec3>)>,
    /// Written as-is, without the HDR scale
    pub full_bright: bool,
}

impl PolyLayers {
    fn anim_layer(&mut self, slot: usize, texels: usize) -> &mut Vec<Vec3> {
        let pos = match self.anim.binary_search_by_key(&slot, |(s, _)| *s) {
            Ok(pos) => pos,
            Err(pos) => {
                self.anim.insert(pos, (slot, vec![[0.0; 3]; texels]));
                pos
            }
        };
        &mut self.anim[pos].1
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellLighting {
    pub polys: Vec<PolyLayers>,
    /// Palette slot -> light table index
    pub palette: Vec<u16>,
}

/// Sampling frame of one render polygon
pub struct PolyFrame {
    pub normal: Vec3,
    plane: Plane,
    center: Vec3,
    edges: Vec<Plane>,
    projection: Projection2D,
    outline: Vec<Vec2>,
    origin: Vec3,
    tex_u: Vec3,
    tex_v: Vec3,
    pub width: usize,
    pub height: usize,
    /// Covers the polygon and the whole texel grid
    pub bounds: AABB,
}

impl PolyFrame {
    pub fn new(cell: &Cell, render_idx: usize) -> Self {
        let points = cell.polygon_points(render_idx);
        let plane = cell.plane_of(render_idx);
        let normal = plane.normal;
        let center = polygon_center(&points);

        let edges = points.iter().enumerate().map(|(i, &a)| {
            let b = points[(i + 1) % points.len()];
            let mut n = normalize(cross(normal, sub(b, a)));
            if dot(n, sub(center, a)) < 0.0 {
                n = mul(n, -1.0);
            }
            Plane::from_point_normal(a, n)
        }).collect();

        let projection = Projection2D::for_normal(normal);
        let outline = points.iter().map(|&p| projection.project(p)).collect();

        let rp = &cell.render_polys[render_idx];
        let lm = &cell.lightmaps[render_idx];
        let anchor = points[rp.anchor as usize];
        let origin = add(anchor, add(mul(rp.tex_u, lm.u_base), mul(rp.tex_v, lm.v_base)));

        let mut bounds = AABB::from_points(&points);
        for (u, v) in [(-0.5, -0.5), (lm.width as f32 - 0.5, -0.5), (-0.5, lm.height as f32 - 0.5), (lm.width as f32 - 0.5, lm.height as f32 - 0.5)] {
            bounds.extend(add(origin, add(mul(rp.tex_u, u), mul(rp.tex_v, v))));
        }

        Self {
            normal,
            plane,
            center,
            edges,
            projection,
            outline,
            origin,
            tex_u: rp.tex_u,
            tex_v: rp.tex_v,
            width: lm.width,
            height: lm.height,
            bounds,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width * self.height
    }

    /// World position at texel coordinates, (0, 0) being the first texel's center
    pub fn texel_point(&self, u: f32, v: f32) -> Vec3 {
        add(self.origin, add(mul(self.tex_u, u), mul(self.tex_v, v)))
    }

    pub fn contains(&self, p: Vec3) -> bool {
        point_in_convex_polygon(&self.outline, self.projection.project(p))
    }

    /// Moves a point lying off the polygon back onto it
    pub fn clip_inside(&self, p: Vec3) -> Vec3 {
        let mut p = p;
        for _ in 0..2 {
            for edge in &self.edges {
                let d = edge.distance(p);
                if d < 0.0 {
                    p = add(p, mul(edge.normal, EDGE_INSET - d));
                }
            }
        }
        if self.contains(p) {
            return p;
        }

        let mut q = p;
        for _ in 0..MAX_CENTER_STEPS {
            q = lerp(q, self.center, 0.5);
            if self.contains(q) {
                return q;
            }
        }
        self.center
    }

    /// Pulls the point back toward the center if world geometry cuts in between
    pub fn snap(&self, p: Vec3, world: &dyn RayScene) -> Vec3 {
        let delta = sub(p, self.center);
        let dist = length(delta);
        if dist < EPSILON {
            return p;
        }
        let dir = mul(delta, 1.0 / dist);
        let origin = add(self.center, mul(self.normal, SURFACE_OFFSET));

        match world.trace(origin, dir) {
            Some(hit) if hit.dist < dist => add(self.center, mul(dir, (hit.dist - SURFACE_OFFSET).max(0.0))),
            _ => p,
        }
    }

    /// Validated sample points, texel-major
    pub fn sample_points(&self, samples: &[SubSample], world: &dyn RayScene) -> Vec<Vec3> {
        let mut out = Vec::with_capacity(self.texel_count() * samples.len());
        for y in 0..self.height {
            for x in 0..self.width {
                for s in samples {
                    let p = self.texel_point(x as f32 + s.du, y as f32 + s.dv);
                    out.push(self.snap(self.clip_inside(p), world));
                }
            }
        }
        out
    }
}

struct SampleSet {
    samples: Vec<SubSample>,
    points: Vec<Vec3>,
}

impl SampleSet {
    fn new(frame: &PolyFrame, samples: Vec<SubSample>, world: &dyn RayScene) -> Self {
        let points = frame.sample_points(&samples, world);
        Self { samples, points }
    }

    fn texel(&self, t: usize) -> impl Iterator<Item = (&SubSample, Vec3)> {
        let n = self.samples.len();
        self.samples.iter().zip(self.points[t * n..(t + 1) * n].iter().copied())
    }
}

/// Lazily built per-polygon sample sets: the softness set, and the
/// four-point set quad-lit lights fall back on
struct PolySamples<'a> {
    frame: &'a PolyFrame,
    world: &'a dyn RayScene,
    settings: &'a Settings,
    base: Option<SampleSet>,
    quad: Option<SampleSet>,
}

impl<'a> PolySamples<'a> {
    fn get(&mut self, quad_lit: bool) -> &SampleSet {
        let (frame, world, settings) = (self.frame, self.world, self.settings);
        if quad_lit && settings.softness.sample_count() < 4 {
            self.quad.get_or_insert_with(|| {
                SampleSet::new(frame, sub_samples(SoftnessMode::FourPoint, settings.center_weight), world)
            })
        } else {
            self.base.get_or_insert_with(|| {
                SampleSet::new(frame, sub_samples(settings.softness, settings.center_weight), world)
            })
        }
    }
}

fn add_sunlight(layers: &mut PolyLayers, frame: &PolyFrame, samples: &mut PolySamples, scenes: &Scenes, settings: &Settings) {
    let sun = &settings.sunlight;
    let to_sun = mul(sun.direction, -1.0);
    let cos = dot(frame.normal, to_sun);
    if cos <= 0.0 {
        return;
    }

    let set = samples.get(sun.quad_lit);
    for (t, texel) in layers.base.iter_mut().enumerate() {
        for (sample, p) in set.texel(t) {
            let lifted = add(p, mul(frame.normal, SURFACE_OFFSET));
            let Some(hit) = scenes.full.trace(lifted, to_sun) else { continue };
            if scenes.full.class_of(hit.prim_id) != SurfaceClass::Sky {
                continue;
            }
            if scenes.full.is_occluded(hit.pos, sun.direction, hit.dist - EPSILON) {
                continue;
            }
            *texel = add(*texel, mul(sun.color, sample.weight * cos));
        }
    }
}

/// Unweighted contribution of one light, or None when nothing reached the polygon
fn trace_light(light: &Light, frame: &PolyFrame, samples: &mut PolySamples, scenes: &Scenes, settings: &Settings) -> Option<Vec<Vec3>> {
    let set = samples.get(light.quad_lit);
    let mut texels = vec![[0.0; 3]; frame.texel_count()];
    let mut reached = false;

    for (t, texel) in texels.iter_mut().enumerate() {
        for (sample, p) in set.texel(t) {
            let strength = strength_at_point(light, p, frame.normal, settings);
            if strength <= 0.0 {
                continue;
            }

            let lifted = add(p, mul(frame.normal, SURFACE_OFFSET));
            let to_light = sub(light.position, lifted);
            let dist = length(to_light);
            if dist > EPSILON && scenes.full.is_occluded(lifted, mul(to_light, 1.0 / dist), dist - EPSILON) {
                continue;
            }

            *texel = add(*texel, mul(light.color, sample.weight * strength));
            reached = true;
        }
    }

    reached.then_some(texels)
}

/// Quick rejection of lights that cannot reach the polygon
fn reaches(light: &Light, frame: &PolyFrame) -> bool {
    let d = frame.plane.distance(light.position);
    d > 0.0 && d <= light.radius && sphere_overlaps_aabb(light.position, light.radius_sq, &frame.bounds)
}

/// Computes every render polygon of one cell. Reads only the cell and the
/// shared immutable bake state
pub fn light_cell(cell_idx: usize, cell: &Cell, lights: &[Light], scenes: &Scenes, settings: &Settings) -> CellLighting {
    let ambient = settings.ambient_for_zone(cell.zone);
    let light_ids: Vec<usize> = cell.light_indices.iter()
        .skip(1)
        .take(cell.light_count())
        .filter(|&&i| i > 0 && (i as usize) <= lights.len())
        .map(|&i| i as usize - 1)
        .collect();
    let traced = !light_ids.is_empty() || settings.sunlight.enabled;

    let mut out = CellLighting::default();
    let mut overflowed: Vec<usize> = Vec::new();

    for r in 0..cell.render_polys.len() {
        let texels = cell.lightmaps[r].texel_count();

        if cell.is_water(r) && !settings.lightmapped_water {
            out.polys.push(PolyLayers {
                base: vec![[FULL_BRIGHT; 3]; texels],
                anim: Vec::new(),
                full_bright: true,
            });
            continue;
        }

        let mut layers = PolyLayers { base: vec![ambient; texels], ..Default::default() };
        if !traced || texels == 0 {
            out.polys.push(layers);
            continue;
        }

        let frame = PolyFrame::new(cell, r);
        let mut samples = PolySamples { frame: &frame, world: &scenes.world, settings, base: None, quad: None };

        if settings.sunlight.enabled {
            add_sunlight(&mut layers, &frame, &mut samples, scenes, settings);
        }

        for &id in &light_ids {
            let light = &lights[id];
            if light.dynamic || !reaches(light, &frame) {
                continue;
            }
            let Some(contribution) = trace_light(light, &frame, &mut samples, scenes, settings) else {
                continue;
            };

            let target = if light.is_animated() {
                let slot = match out.palette.iter().position(|&t| t as usize == light.table_index) {
                    Some(slot) => slot,
                    None if out.palette.len() < MAX_ANIM_LIGHTS_PER_CELL => {
                        out.palette.push(light.table_index as u16);
                        out.palette.len() - 1
                    }
                    None => {
                        if !overflowed.contains(&id) {
                            warn!(
                                "Cell {}: more than {} animated lights, dropping light {} ({})",
                                cell_idx, MAX_ANIM_LIGHTS_PER_CELL, light.table_index, light.source
                            );
                            overflowed.push(id);
                        }
                        continue;
                    }
                };
                layers.anim_layer(slot, texels)
            } else {
                &mut layers.base
            };

            for (dst, src) in target.iter_mut().zip(&contribution) {
                *dst = add(*dst, *src);
            }
        }

        out.polys.push(layers);
    }

    if traced {
        debug!(
            "Cell {}: {} lights, {} render polys, {} animated slots",
            cell_idx, light_ids.len(), cell.render_polys.len(), out.palette.len()
        );
    }
    out
}
