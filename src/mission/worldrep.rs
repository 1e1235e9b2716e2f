use serde::{Deserialize, Serialize};
use std::ops::Range;
use crate::error::BakeError;
use crate::math::{Plane, Vec3};

/// Texture slot the engine renders as sky
pub const SKY_TEXTURE: u16 = 249;

/// Animated lights one cell can carry (bits in a lightmap's `anim_flags`)
pub const MAX_ANIM_LIGHTS_PER_CELL: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightmapFormat {
    /// 8-bit grey
    Mono8,
    /// 16-bit, 5 bits per channel
    #[default]
    Rgb555,
    /// 32-bit r, g, b, a
    Rgba8888,
}

impl LightmapFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            LightmapFormat::Mono8 => 1,
            LightmapFormat::Rgb555 => 2,
            LightmapFormat::Rgba8888 => 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldRep {
    #[serde(default)]
    pub lightmap_format: LightmapFormat,
    pub cells: Vec<Cell>,
    /// Animated light -> (cell, palette slot) table, filled by the bake
    #[serde(default)]
    pub anim_light_cells: Vec<AnimCellRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimCellRef {
    pub cell: u32,
    pub slot: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    /// Indices into the owning cell's vertex list
    pub vertices: Vec<u32>,
    pub plane: u32,
    #[serde(default)]
    pub texture: u16,
    /// Neighbour cell, set on portal polygons
    #[serde(default)]
    pub destination: Option<u32>,
}

/// Texture mapping of a render polygon. `tex_u`/`tex_v` are the world-space
/// extents of one lightmap texel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPoly {
    pub tex_u: Vec3,
    pub tex_v: Vec3,
    /// Position within the polygon's vertex list used as texture origin
    #[serde(default)]
    pub anchor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lightmap {
    pub width: usize,
    pub height: usize,
    /// Texel offset of texel (0, 0) from the anchor, in texels
    pub u_base: f32,
    pub v_base: f32,
    /// Bit `i` set: palette slot `i` has a layer in `data`
    #[serde(default)]
    pub anim_flags: u32,
    /// Encoded layers: base layer, then animated layers by ascending bit
    #[serde(default)]
    pub data: Vec<u8>,
}

impl Lightmap {
    pub fn texel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn layer_count(&self) -> usize {
        1 + self.anim_flags.count_ones() as usize
    }

    /// Encoded bytes of one layer
    pub fn layer(&self, layer: usize, format: LightmapFormat) -> Option<&[u8]> {
        let size = self.texel_count() * format.bytes_per_texel();
        self.data.get(layer * size..(layer + 1) * size)
    }
}

/// Convex region of the world. Render polygons come first in `polygons`,
/// portals last; the two ranges overlap on water surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub vertices: Vec<Vec3>,
    pub planes: Vec<Plane>,
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub num_portals: usize,
    #[serde(default)]
    pub render_polys: Vec<RenderPoly>,
    #[serde(default)]
    pub lightmaps: Vec<Lightmap>,
    #[serde(default)]
    pub zone: u8,
    /// `[count, light table index + 1, ...]`
    #[serde(default)]
    pub light_indices: Vec<u16>,
    /// Palette slot -> light table index of an animated light
    #[serde(default)]
    pub anim_palette: Vec<u16>,
}

impl Cell {
    pub fn portal_range(&self) -> Range<usize> {
        self.polygons.len().saturating_sub(self.num_portals)..self.polygons.len()
    }

    /// Polygons that are walls, floors and sky, not portals
    pub fn solid_range(&self) -> Range<usize> {
        0..self.portal_range().start
    }

    pub fn is_portal(&self, poly_idx: usize) -> bool {
        self.portal_range().contains(&poly_idx)
    }

    /// A render polygon that is also a portal is a water surface
    pub fn is_water(&self, render_idx: usize) -> bool {
        render_idx < self.render_polys.len() && self.is_portal(render_idx)
    }

    pub fn plane_of(&self, poly_idx: usize) -> Plane {
        self.planes[self.polygons[poly_idx].plane as usize]
    }

    pub fn polygon_points(&self, poly_idx: usize) -> Vec<Vec3> {
        self.polygons[poly_idx]
            .vertices
            .iter()
            .map(|&v| self.vertices[v as usize])
            .collect()
    }

    /// Number of lights in the light-index list
    pub fn light_count(&self) -> usize {
        self.light_indices.first().copied().unwrap_or(0) as usize
    }

    /// Checks every index the bake will follow
    pub fn validate(&self, cell_idx: usize, cell_count: usize) -> Result<(), BakeError> {
        let fail = |reason: String| Err(BakeError::InvalidCell { cell: cell_idx, reason });

        if self.num_portals > self.polygons.len() {
            return fail(format!("{} portals but only {} polygons", self.num_portals, self.polygons.len()));
        }
        if self.render_polys.len() > self.polygons.len() {
            return fail(format!("{} render polys but only {} polygons", self.render_polys.len(), self.polygons.len()));
        }
        if self.lightmaps.len() != self.render_polys.len() {
            return fail(format!("{} lightmaps for {} render polys", self.lightmaps.len(), self.render_polys.len()));
        }

        for (i, poly) in self.polygons.iter().enumerate() {
            if poly.vertices.len() < 3 {
                return fail(format!("polygon {} has {} vertices", i, poly.vertices.len()));
            }
            if let Some(v) = poly.vertices.iter().find(|&&v| v as usize >= self.vertices.len()) {
                return fail(format!("polygon {} references vertex {}", i, v));
            }
            if poly.plane as usize >= self.planes.len() {
                return fail(format!("polygon {} references plane {}", i, poly.plane));
            }
            if self.is_portal(i) {
                match poly.destination {
                    Some(dst) if (dst as usize) < cell_count => {}
                    other => return fail(format!("portal {} has destination {:?}", i, other)),
                }
            }
        }

        for (i, rp) in self.render_polys.iter().enumerate() {
            if rp.anchor as usize >= self.polygons[i].vertices.len() {
                return fail(format!("render poly {} anchor {} out of range", i, rp.anchor));
            }
        }

        Ok(())
    }
}
