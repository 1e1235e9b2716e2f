use anyhow::Context;
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use crate::error::BakeError;
use crate::math::{normalize, Vec3};
use crate::processing::utils::hsb_to_rgb;
use crate::types::{Settings, SoftnessMode, Sunlight};
use props::{ObjId, PropertyStore};
use worldrep::WorldRep;

pub mod model;
pub mod props;
pub mod worldrep;

fn one() -> f32 {
    1.0
}

fn half() -> f32 {
    0.5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SunlightParams {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub quad_lit: bool,
    #[serde(default)]
    pub direction: Vec3,
    #[serde(default)]
    pub hue: f32,
    #[serde(default)]
    pub saturation: f32,
    #[serde(default)]
    pub brightness: f32,
}

impl SunlightParams {
    /// Sun color with the bake's saturation multiplier applied
    pub fn color(&self, saturation: f32) -> Vec3 {
        hsb_to_rgb(self.hue, (self.saturation * saturation).clamp(0.0, 1.0), self.brightness)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderParams {
    #[serde(default)]
    pub ambient_light: Vec3,
    #[serde(default)]
    pub zone_ambients: Vec<Vec3>,
    #[serde(default)]
    pub sunlight: SunlightParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightmapParams {
    #[serde(default = "one")]
    pub attenuation: f32,
    #[serde(default = "one")]
    pub saturation: f32,
    #[serde(default)]
    pub hdr: bool,
    #[serde(default)]
    pub softness: SoftnessMode,
    #[serde(default = "half")]
    pub center_weight: f32,
    #[serde(default)]
    pub lightmapped_water: bool,
    #[serde(default)]
    pub anim_light_cutoff: f32,
    /// Set once a bake has let objects cast shadows
    #[serde(default)]
    pub object_shadows: bool,
}

impl Default for LightmapParams {
    fn default() -> Self {
        Self {
            attenuation: 1.0,
            saturation: 1.0,
            hdr: false,
            softness: SoftnessMode::Standard,
            center_weight: 0.5,
            lightmapped_water: false,
            anim_light_cutoff: 0.0,
            object_shadows: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushKind {
    Terrain,
    Light,
    Area,
    Object,
    Flow,
    Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brush {
    pub id: i32,
    pub kind: BrushKind,
    pub position: Vec3,
    /// Light brushes pack (brightness, hue, saturation) here
    #[serde(default)]
    pub size: Vec3,
    /// Rotation about x, y, z in degrees
    #[serde(default)]
    pub facing: Vec3,
    /// Placed object, for object brushes
    #[serde(default)]
    pub object: Option<ObjId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightTableEntry {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    /// Cosines of the spot cone; 0 for point lights
    pub inner: f32,
    pub outer: f32,
    pub radius: f32,
    #[serde(default)]
    pub dynamic: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct LightTable(pub Vec<LightTableEntry>);

/// A mission as the baker sees it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mission {
    #[serde(default)]
    pub render_params: Option<RenderParams>,
    #[serde(default)]
    pub lightmap_params: Option<LightmapParams>,
    #[serde(default)]
    pub world: Option<WorldRep>,
    #[serde(default)]
    pub brushes: Vec<Brush>,
    #[serde(default)]
    pub properties: PropertyStore,
    #[serde(default)]
    pub light_table: LightTable,
}

impl Mission {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open mission {:?}", path))?;
        let mission = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse mission {:?}", path))?;
        Ok(mission)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write mission {:?}", path))?;
        Ok(())
    }

    /// Bake settings from the stored params
    pub fn settings(&self) -> Result<Settings, BakeError> {
        self.settings_with_saturation(None)
    }

    /// Bake settings with an optional saturation multiplier replacing the
    /// stored one. Brush, object and sun colors all follow it
    pub fn settings_with_saturation(&self, saturation: Option<f32>) -> Result<Settings, BakeError> {
        let render = self.render_params.as_ref().ok_or(BakeError::MissingRenderParams)?;
        let lm = self.lightmap_params.as_ref().ok_or(BakeError::MissingLightmapParams)?;
        let saturation = saturation.unwrap_or(lm.saturation);

        let sun = &render.sunlight;
        let sunlight = Sunlight {
            enabled: sun.enabled,
            quad_lit: sun.quad_lit,
            direction: normalize(sun.direction),
            color: sun.color(saturation),
        };

        Ok(Settings {
            ambient: render.ambient_light,
            zone_ambients: render.zone_ambients.clone(),
            hdr: lm.hdr,
            attenuation: lm.attenuation.max(0.0),
            saturation,
            softness: lm.softness,
            center_weight: lm.center_weight.clamp(0.0, 1.0),
            lightmapped_water: lm.lightmapped_water,
            sunlight,
            anim_light_cutoff: lm.anim_light_cutoff,
            fast_pvs: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_require_params() {
        let mut mission = Mission::default();
        assert!(matches!(mission.settings(), Err(BakeError::MissingRenderParams)));

        mission.render_params = Some(RenderParams::default());
        assert!(matches!(mission.settings(), Err(BakeError::MissingLightmapParams)));

        mission.lightmap_params = Some(LightmapParams::default());
        let settings = mission.settings().expect("params present");
        assert_eq!(settings.attenuation, 1.0);
        assert!(!settings.sunlight.enabled);
    }

    #[test]
    fn test_saturation_override_recolors_sun() {
        let sun = SunlightParams {
            enabled: true,
            direction: [0.0, 0.0, -2.0],
            hue: 0.0,
            saturation: 1.0,
            brightness: 100.0,
            ..Default::default()
        };
        let mission = Mission {
            render_params: Some(RenderParams { sunlight: sun, ..Default::default() }),
            lightmap_params: Some(LightmapParams::default()),
            ..Default::default()
        };

        let stored = mission.settings().expect("params present");
        assert_eq!(stored.sunlight.color, [100.0, 0.0, 0.0]);
        assert_eq!(stored.sunlight.direction, [0.0, 0.0, -1.0]);

        let grey = mission.settings_with_saturation(Some(0.0)).expect("params present");
        assert_eq!(grey.saturation, 0.0);
        assert_eq!(grey.sunlight.color, [100.0, 100.0, 100.0]);
    }

    #[test]
    fn test_lightmap_params_defaults_from_json() {
        let params: LightmapParams = serde_json::from_str("{}").expect("valid json");
        assert_eq!(params.attenuation, 1.0);
        assert_eq!(params.center_weight, 0.5);
        assert_eq!(params.softness, SoftnessMode::Standard);
    }

    #[test]
    fn test_mission_json_roundtrip_keeps_light_table() {
        let mut mission = Mission::default();
        mission.light_table.push(LightTableEntry {
            position: [1.0, 2.0, 3.0],
            direction: [0.0, 0.0, -1.0],
            color: [1.0, 1.0, 1.0],
            inner: 0.0,
            outer: 0.0,
            radius: 10.0,
            dynamic: false,
        });

        let text = serde_json::to_string(&mission).expect("serializes");
        let back: Mission = serde_json::from_str(&text).expect("deserializes");
        assert_eq!(back.light_table.len(), 1);
        assert_eq!(back.light_table[0], mission.light_table[0]);
    }
}
