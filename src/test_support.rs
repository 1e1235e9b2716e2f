//! Small hand-built worlds shared by the unit tests

use crate::math::{Plane, Vec3};
use crate::mission::model::{Model, Vhot, VHOT_LIGHT_DIRECTION, VHOT_LIGHT_POSITION};
use crate::mission::worldrep::{Cell, Lightmap, LightmapFormat, Polygon, RenderPoly, WorldRep};
use crate::mission::{Brush, BrushKind, LightmapParams, Mission, RenderParams};

pub const FACE_FLOOR: usize = 0;
pub const FACE_CEILING: usize = 1;
pub const FACE_X_MIN: usize = 2;
pub const FACE_X_MAX: usize = 3;
pub const FACE_Y_MIN: usize = 4;
pub const FACE_Y_MAX: usize = 5;

struct Face {
    corners: [usize; 4],
    normal: Vec3,
    u: Vec3,
    v: Vec3,
}

fn faces() -> [Face; 6] {
    let x = [1.0, 0.0, 0.0];
    let y = [0.0, 1.0, 0.0];
    let z = [0.0, 0.0, 1.0];
    [
        Face { corners: [0, 1, 3, 2], normal: [0.0, 0.0, 1.0], u: x, v: y },
        Face { corners: [4, 6, 7, 5], normal: [0.0, 0.0, -1.0], u: x, v: y },
        Face { corners: [0, 2, 6, 4], normal: [1.0, 0.0, 0.0], u: y, v: z },
        Face { corners: [1, 5, 7, 3], normal: [-1.0, 0.0, 0.0], u: y, v: z },
        Face { corners: [0, 4, 5, 1], normal: [0.0, 1.0, 0.0], u: x, v: z },
        Face { corners: [2, 3, 7, 6], normal: [0.0, -1.0, 0.0], u: x, v: z },
    ]
}

/// Closed box, every face a render polygon with 1-unit texels
pub fn box_cell(min: Vec3, max: Vec3) -> Cell {
    box_cell_with(min, max, 1.0, &[])
}

/// Box whose listed faces are portals to the given cells; the rest render
/// with texels `step` units wide
pub fn box_cell_with(min: Vec3, max: Vec3, step: f32, portals: &[(usize, u32)]) -> Cell {
    let vertices: Vec<Vec3> = (0..8)
        .map(|i| [
            if i & 1 != 0 { max[0] } else { min[0] },
            if i & 2 != 0 { max[1] } else { min[1] },
            if i & 4 != 0 { max[2] } else { min[2] },
        ])
        .collect();

    let faces = faces();
    let planes: Vec<Plane> = faces.iter()
        .map(|f| Plane::from_point_normal(vertices[f.corners[0]], f.normal))
        .collect();

    let portal_dst = |face: usize| portals.iter().find(|(f, _)| *f == face).map(|(_, d)| *d);
    let order: Vec<usize> = (0..6).filter(|&f| portal_dst(f).is_none())
        .chain((0..6).filter(|&f| portal_dst(f).is_some()))
        .collect();

    let mut polygons = Vec::new();
    let mut render_polys = Vec::new();
    let mut lightmaps = Vec::new();

    for &f in &order {
        let face = &faces[f];
        polygons.push(Polygon {
            vertices: face.corners.iter().map(|&c| c as u32).collect(),
            plane: f as u32,
            texture: 1,
            destination: portal_dst(f),
        });

        if portal_dst(f).is_none() {
            let extent = |axis: Vec3| {
                let span: f32 = (0..3).map(|i| (max[i] - min[i]) * axis[i]).sum();
                ((span / step).ceil() as usize).max(1)
            };
            render_polys.push(RenderPoly {
                tex_u: crate::math::mul(face.u, step),
                tex_v: crate::math::mul(face.v, step),
                anchor: 0,
            });
            lightmaps.push(Lightmap {
                width: extent(face.u),
                height: extent(face.v),
                u_base: 0.5,
                v_base: 0.5,
                anim_flags: 0,
                data: Vec::new(),
            });
        }
    }

    Cell {
        vertices,
        planes,
        polygons,
        num_portals: portals.len(),
        render_polys,
        lightmaps,
        zone: 0,
        light_indices: Vec::new(),
        anim_palette: Vec::new(),
    }
}

/// Boxes on a grid of `size` squares, joined by portals where grid cells touch
pub fn grid_world(coords: &[[i32; 2]], size: f32, height: f32, step: f32) -> WorldRep {
    let cells = coords.iter().map(|&[ix, iy]| {
        let min = [ix as f32 * size, iy as f32 * size, 0.0];
        let max = [min[0] + size, min[1] + size, height];

        let mut portals = Vec::new();
        for (face, dx, dy) in [(FACE_X_MIN, -1, 0), (FACE_X_MAX, 1, 0), (FACE_Y_MIN, 0, -1), (FACE_Y_MAX, 0, 1)] {
            if let Some(n) = coords.iter().position(|&c| c == [ix + dx, iy + dy]) {
                portals.push((face, n as u32));
            }
        }
        box_cell_with(min, max, step, &portals)
    }).collect();

    WorldRep { lightmap_format: LightmapFormat::Rgba8888, cells, anim_light_cells: Vec::new() }
}

pub fn cube_model(half: f32) -> Model {
    let cell = box_cell([-half; 3], [half; 3]);
    Model {
        vertices: cell.vertices.clone(),
        polygons: cell.polygons.iter().map(|p| p.vertices.clone()).collect(),
        vhots: vec![
            Vhot { id: VHOT_LIGHT_POSITION, position: [0.0, 0.0, half], joint: None },
            Vhot { id: VHOT_LIGHT_DIRECTION, position: [0.0, 0.0, -half], joint: None },
        ],
        joints: Vec::new(),
    }
}

/// Mission with zero ambient, default params and 32-bit lightmaps
pub fn mission_with_world(world: WorldRep) -> Mission {
    Mission {
        render_params: Some(RenderParams::default()),
        lightmap_params: Some(LightmapParams::default()),
        world: Some(world),
        ..Default::default()
    }
}

/// Light brush with packed (brightness, hue, saturation)
pub fn light_brush(id: i32, position: Vec3, brightness: f32) -> Brush {
    Brush {
        id,
        kind: BrushKind::Light,
        position,
        size: [brightness, 0.0, 0.0],
        facing: [0.0; 3],
        object: None,
    }
}

pub fn object_brush(id: i32, obj: i32, position: Vec3) -> Brush {
    Brush {
        id,
        kind: BrushKind::Object,
        position,
        size: [0.0; 3],
        facing: [0.0; 3],
        object: Some(obj),
    }
}
