use log::{debug, info};
use rayon::prelude::*;
use crate::math::{cross, dot, sub, Vec3};
use crate::mission::model::ModelSource;
use crate::mission::props::{Hierarchy, PropertyStore};
use crate::mission::worldrep::{WorldRep, SKY_TEXTURE};
use crate::mission::{Brush, BrushKind};
use crate::processing::geometry::object_transform;
use crate::processing::tracer::{BvhScene, SurfaceClass, Triangle};

/// The two scenes of a bake: `world` answers "is this a legal interior point",
/// `full` adds placed objects and answers "does anything cast a shadow here"
pub struct Scenes {
    pub world: BvhScene,
    pub full: BvhScene,
}

pub fn commit_scenes(
    world: &WorldRep,
    brushes: &[Brush],
    props: &PropertyStore,
    hierarchy: &Hierarchy,
    models: &dyn ModelSource,
) -> Scenes {
    let world_tris = build_world_mesh(world);
    let object_tris = build_object_mesh(brushes, props, hierarchy, models);
    info!("Scene mesh: {} world triangles, {} object triangles", world_tris.len(), object_tris.len());

    let mut full_tris = Vec::with_capacity(world_tris.len() + object_tris.len());
    full_tris.extend_from_slice(&world_tris);
    full_tris.extend(object_tris);

    Scenes {
        world: BvhScene::commit(world_tris),
        full: BvhScene::commit(full_tris),
    }
}

/// Every non-portal polygon of every cell, fan triangulated
pub fn build_world_mesh(world: &WorldRep) -> Vec<Triangle> {
    world.cells
        .par_iter()
        .flat_map_iter(|cell| {
            cell.solid_range().flat_map(move |p| {
                let poly = &cell.polygons[p];
                let class = if poly.texture == SKY_TEXTURE { SurfaceClass::Sky } else { SurfaceClass::Solid };
                let points = cell.polygon_points(p);
                fan(&points, class)
            })
        })
        .collect()
}

/// Model triangles of placed objects, posed and moved into the world
pub fn build_object_mesh(
    brushes: &[Brush],
    props: &PropertyStore,
    hierarchy: &Hierarchy,
    models: &dyn ModelSource,
) -> Vec<Triangle> {
    let mut tris = Vec::new();

    for brush in brushes.iter().filter(|b| b.kind == BrushKind::Object) {
        let Some(obj) = brush.object else { continue };

        if hierarchy.lookup(&props.static_shadow, obj) == Some(&false) {
            debug!("Object {} opts out of shadows", obj);
            continue;
        }
        let Some(name) = hierarchy.lookup(&props.model_name, obj) else {
            continue;
        };
        let joints = hierarchy.lookup(&props.joint_pos, obj).copied().unwrap_or_default();
        let Some(model) = models.posed(name, &joints) else {
            debug!("Object {}: model '{}' not found, casts no shadow", obj, name);
            continue;
        };

        let transform = object_transform(brush, props, hierarchy);
        let before = tris.len();
        tris.extend(
            model.triangles()
                .map(|t| t.map(|v| transform.apply(v)))
                .filter(|t| !is_degenerate(t))
                .map(|v| Triangle { v, class: SurfaceClass::Object }),
        );
        debug!("Object {} ('{}'): {} triangles", obj, name, tris.len() - before);
    }

    tris
}

fn fan(points: &[Vec3], class: SurfaceClass) -> Vec<Triangle> {
    (1..points.len().saturating_sub(1))
        .map(|i| [points[0], points[i], points[i + 1]])
        .filter(|t| !is_degenerate(t))
        .map(|v| Triangle { v, class })
        .collect()
}

fn is_degenerate(t: &[Vec3; 3]) -> bool {
    let n = cross(sub(t[1], t[0]), sub(t[2], t[0]));
    dot(n, n) < 1e-12
}
