use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use crate::math::Vec3;

pub type ObjId = i32;

/// Archetype / metaproperty link. Only priority 0 takes part in inheritance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPropLink {
    pub source: ObjId,
    pub dest: ObjId,
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightProp {
    pub brightness: f32,
    /// World-space offset from the light anchor
    #[serde(default)]
    pub offset: Vec3,
    /// 0 means unbounded
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub inner_radius: f32,
    #[serde(default)]
    pub quad_lit: bool,
    #[serde(default)]
    pub dynamic: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimLightProp {
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub min_brightness: f32,
    pub max_brightness: f32,
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub inner_radius: f32,
    #[serde(default)]
    pub quad_lit: bool,

    // Written back by the bake
    #[serde(default)]
    pub light_table_index: u32,
    #[serde(default)]
    pub map_offset: u32,
    #[serde(default)]
    pub cells_reached: u32,
}

/// Cone angles in degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpotlightProp {
    pub inner: f32,
    pub outer: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpotAmbProp {
    pub inner: f32,
    pub outer: f32,
    pub spot_brightness: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LightColorProp {
    pub hue: f32,
    pub saturation: f32,
}

/// Typed per-object properties, keyed by object id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyStore {
    #[serde(default)]
    pub links: Vec<MetaPropLink>,
    #[serde(default)]
    pub light: BTreeMap<ObjId, LightProp>,
    #[serde(default)]
    pub anim_light: BTreeMap<ObjId, AnimLightProp>,
    #[serde(default)]
    pub spotlight: BTreeMap<ObjId, SpotlightProp>,
    #[serde(default)]
    pub spot_amb: BTreeMap<ObjId, SpotAmbProp>,
    #[serde(default)]
    pub light_color: BTreeMap<ObjId, LightColorProp>,
    #[serde(default)]
    pub scale: BTreeMap<ObjId, Vec3>,
    #[serde(default)]
    pub model_name: BTreeMap<ObjId, String>,
    #[serde(default)]
    pub joint_pos: BTreeMap<ObjId, [f32; 6]>,
    #[serde(default)]
    pub static_shadow: BTreeMap<ObjId, bool>,
}

impl PropertyStore {
    pub fn hierarchy(&self) -> Hierarchy {
        let mut parents = HashMap::new();
        for link in self.links.iter().filter(|l| l.priority == 0) {
            parents.entry(link.source).or_insert(link.dest);
        }
        Hierarchy { parents }
    }

    /// Edits the object's own AnimLight, copying the inherited one down first
    pub fn update_anim_light(
        &mut self,
        hierarchy: &Hierarchy,
        obj: ObjId,
        update: impl FnOnce(&mut AnimLightProp),
    ) {
        if !self.anim_light.contains_key(&obj) {
            let inherited = hierarchy.lookup(&self.anim_light, obj).cloned().unwrap_or_default();
            self.anim_light.insert(obj, inherited);
        }
        if let Some(prop) = self.anim_light.get_mut(&obj) {
            update(prop);
        }
    }
}

/// Parent chain built from priority-0 metaproperty links
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    parents: HashMap<ObjId, ObjId>,
}

impl Hierarchy {
    pub fn parent(&self, obj: ObjId) -> Option<ObjId> {
        self.parents.get(&obj).copied()
    }

    /// Nearest value along obj -> parent -> ... -> root
    pub fn lookup<'a, T>(&self, map: &'a BTreeMap<ObjId, T>, obj: ObjId) -> Option<&'a T> {
        let mut visited = HashSet::new();
        let mut current = Some(obj);

        while let Some(id) = current {
            if !visited.insert(id) {
                warn!("Metaproperty cycle through object {} (starting at {})", id, obj);
                return None;
            }
            if let Some(value) = map.get(&id) {
                return Some(value);
            }
            current = self.parent(id);
        }
        None
    }
}
