use serde::{Deserialize, Serialize};
use crate::math::{max_component, Vec3};
use crate::mission::props::ObjId;

/// Radius and squared radius of lights with no range limit
pub const INFINITE_RADIUS: f32 = f32::MAX;

/// Engine constant folded into light colors; the light table stores colors without it
pub const LIGHT_INTENSITY_SCALE: f32 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightSource {
    Brush(i32),
    Object(ObjId),
}

impl std::fmt::Display for LightSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LightSource::Brush(id) => write!(f, "brush {}", id),
            LightSource::Object(obj) => write!(f, "object {}", obj),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spotlight {
    /// Unit axis the cone points along
    pub axis: Vec3,
    pub cos_inner: f32,
    pub cos_outer: f32,
}

/// Resolved world-space light for one bake
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub source: LightSource,
    pub position: Vec3,
    /// Linear RGB, brightness folded in
    pub color: Vec3,
    pub radius: f32,
    pub radius_sq: f32,
    /// 0 disables the linear falloff band
    pub inner_radius: f32,
    pub quad_lit: bool,
    pub spot: Option<Spotlight>,
    /// Owning object of an animated light
    pub animated: Option<ObjId>,
    /// Listed in the light table but never baked
    pub dynamic: bool,
    /// Position in the light table, set when the table is built
    pub table_index: usize,
}

impl Light {
    pub fn point(source: LightSource, position: Vec3, color: Vec3, radius: f32) -> Self {
        let mut light = Self {
            source,
            position,
            color,
            radius,
            radius_sq: 0.0,
            inner_radius: 0.0,
            quad_lit: false,
            spot: None,
            animated: None,
            dynamic: false,
            table_index: 0,
        };
        light.fix_radius();
        light
    }

    /// Zero radius means unbounded
    pub fn fix_radius(&mut self) {
        if self.radius == 0.0 || self.radius >= INFINITE_RADIUS {
            self.radius = INFINITE_RADIUS;
            self.radius_sq = INFINITE_RADIUS;
        } else {
            self.radius_sq = self.radius * self.radius;
        }
    }

    pub fn brightness(&self) -> f32 {
        max_component(self.color)
    }

    pub fn is_unbounded(&self) -> bool {
        self.radius >= INFINITE_RADIUS
    }

    pub fn is_animated(&self) -> bool {
        self.animated.is_some()
    }
}

/// Sub-samples taken per lightmap texel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum SoftnessMode {
    #[default]
    Standard,
    FourPoint,
    FivePoint,
    NinePoint,
}

impl SoftnessMode {
    pub fn sample_count(self) -> usize {
        match self {
            SoftnessMode::Standard => 1,
            SoftnessMode::FourPoint => 4,
            SoftnessMode::FivePoint => 5,
            SoftnessMode::NinePoint => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sunlight {
    pub enabled: bool,
    pub quad_lit: bool,
    /// Direction the sunlight travels
    pub direction: Vec3,
    pub color: Vec3,
}

/// Everything that steers one bake. Built once and never mutated
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Ambient used by cells without a zone
    pub ambient: Vec3,
    /// Ambient of zones 1..=N
    pub zone_ambients: Vec<Vec3>,
    pub hdr: bool,
    pub attenuation: f32,
    pub saturation: f32,
    pub softness: SoftnessMode,
    pub center_weight: f32,
    pub lightmapped_water: bool,
    pub sunlight: Sunlight,
    pub anim_light_cutoff: f32,
    pub fast_pvs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ambient: [0.0; 3],
            zone_ambients: Vec::new(),
            hdr: false,
            attenuation: 1.0,
            saturation: 1.0,
            softness: SoftnessMode::Standard,
            center_weight: 0.5,
            lightmapped_water: false,
            sunlight: Sunlight { enabled: false, quad_lit: false, direction: [0.0, 0.0, -1.0], color: [0.0; 3] },
            anim_light_cutoff: 0.0,
            fast_pvs: true,
        }
    }
}

impl Settings {
    pub fn ambient_for_zone(&self, zone: u8) -> Vec3 {
        match zone {
            0 => self.ambient,
            z => self.zone_ambients.get(z as usize - 1).copied().unwrap_or(self.ambient),
        }
    }
}
