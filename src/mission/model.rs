use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use crate::math::{rotate_about_axis, Vec3};

/// Vhot carrying the light source position
pub const VHOT_LIGHT_POSITION: u32 = 1;
/// Vhot carrying the point a light shines toward
pub const VHOT_LIGHT_DIRECTION: u32 = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vhot {
    pub id: u32,
    pub position: Vec3,
    /// Joint the vhot moves with
    #[serde(default)]
    pub joint: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Joint {
    pub axis: Vec3,
    pub pivot: Vec3,
    /// Vertices driven by this joint
    pub vertices: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub vertices: Vec<Vec3>,
    /// Convex polygons as vertex index fans
    pub polygons: Vec<Vec<u32>>,
    #[serde(default)]
    pub vhots: Vec<Vhot>,
    #[serde(default)]
    pub joints: Vec<Joint>,
}

impl Model {
    pub fn vhot(&self, id: u32) -> Option<Vec3> {
        self.vhots.iter().find(|v| v.id == id).map(|v| v.position)
    }

    /// Copy of the model with each joint rotated by `angles[joint]` degrees
    pub fn posed(&self, angles: &[f32]) -> Model {
        let mut out = self.clone();

        for (j, joint) in self.joints.iter().enumerate() {
            let angle = angles.get(j).copied().unwrap_or(0.0);
            if angle == 0.0 {
                continue;
            }
            let radians = angle.to_radians();

            for &v in &joint.vertices {
                if let Some(p) = out.vertices.get_mut(v as usize) {
                    *p = rotate_about_axis(*p, joint.pivot, joint.axis, radians);
                }
            }
            for vhot in out.vhots.iter_mut().filter(|v| v.joint == Some(j)) {
                vhot.position = rotate_about_axis(vhot.position, joint.pivot, joint.axis, radians);
            }
        }

        out
    }

    /// Fan triangulation of every polygon, skipping bad indices
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.polygons.iter().flat_map(move |poly| {
            (1..poly.len().saturating_sub(1)).filter_map(move |i| {
                let a = self.vertices.get(poly[0] as usize)?;
                let b = self.vertices.get(poly[i] as usize)?;
                let c = self.vertices.get(poly[i + 1] as usize)?;
                Some([*a, *b, *c])
            })
        })
    }
}

/// Supplies object models with joints already posed
pub trait ModelSource: Sync {
    fn posed(&self, name: &str, joints: &[f32; 6]) -> Option<Model>;
}

#[derive(Debug, Default)]
pub struct ModelLibrary {
    models: HashMap<String, Model>,
}

impl ModelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, model: Model) {
        self.models.insert(name.to_lowercase(), model);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Loads every `<name>.json` in `dir`
    pub fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut library = Self::new();

        for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read model directory {:?}", dir))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let file = std::fs::File::open(&path).with_context(|| format!("Failed to open model {:?}", path))?;
            let model: Model = serde_json::from_reader(std::io::BufReader::new(file))
                .with_context(|| format!("Failed to parse model {:?}", path))?;
            debug!("Loaded model '{}' ({} vertices, {} polygons)", name, model.vertices.len(), model.polygons.len());
            library.insert(name, model);
        }

        info!("Loaded {} models from {:?}", library.len(), dir);
        Ok(library)
    }
}

impl ModelSource for ModelLibrary {
    fn posed(&self, name: &str, joints: &[f32; 6]) -> Option<Model> {
        self.models.get(&name.to_lowercase()).map(|m| m.posed(joints))
    }
}
