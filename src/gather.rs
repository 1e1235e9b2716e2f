use log::{debug, warn};
use crate::math::{add, length, mul, normalize, sub, Vec3};
use crate::mission::model::{ModelSource, VHOT_LIGHT_DIRECTION, VHOT_LIGHT_POSITION};
use crate::mission::props::{Hierarchy, ObjId, PropertyStore};
use crate::mission::{Brush, BrushKind};
use crate::processing::geometry::object_transform;
use crate::processing::utils::hsb_to_rgb;
use crate::types::{Light, LightSource, Settings, SoftnessMode, Spotlight};

// Inner-to-outer gap, as a share of the radius, above which the falloff band looks wrong
const RADIUS_GAP_WARN_RATIO: f32 = 0.75;

/// Resolves every light brush and every object carrying light properties
/// into world-space lights, in brush order
pub fn extract_lights(
    brushes: &[Brush],
    props: &PropertyStore,
    hierarchy: &Hierarchy,
    models: &dyn ModelSource,
    settings: &Settings,
) -> Vec<Light> {
    let mut lights = Vec::new();

    for brush in brushes {
        match brush.kind {
            BrushKind::Light => lights.push(brush_light(brush, settings)),
            BrushKind::Object => {
                if let Some(obj) = brush.object {
                    lights.extend(object_lights(brush, obj, props, hierarchy, models, settings));
                }
            }
            _ => {}
        }
    }

    debug!("Gathered {} lights from {} brushes", lights.len(), brushes.len());
    lights
}

/// Size packs (brightness, hue, saturation). Brush lights have no range limit
fn brush_light(brush: &Brush, settings: &Settings) -> Light {
    let [brightness, hue, saturation] = brush.size;
    let color = hsb_to_rgb(hue, (saturation * settings.saturation).clamp(0.0, 1.0), brightness);
    Light::point(LightSource::Brush(brush.id), brush.position, color, 0.0)
}

/// World-space light anchor and the unit direction it faces
fn object_anchors(
    brush: &Brush,
    obj: ObjId,
    props: &PropertyStore,
    hierarchy: &Hierarchy,
    models: &dyn ModelSource,
) -> (Vec3, Vec3) {
    let model = hierarchy.lookup(&props.model_name, obj).and_then(|name| {
        let joints = hierarchy.lookup(&props.joint_pos, obj).copied().unwrap_or_default();
        models.posed(name, &joints)
    });

    let local_pos = model.as_ref()
        .and_then(|m| m.vhot(VHOT_LIGHT_POSITION))
        .unwrap_or([0.0; 3]);
    let local_dir = model.as_ref()
        .and_then(|m| m.vhot(VHOT_LIGHT_DIRECTION))
        .unwrap_or(add(local_pos, [0.0, 0.0, -1.0]));

    let transform = object_transform(brush, props, hierarchy);
    let pos = transform.apply(local_pos);
    let toward = sub(transform.apply(local_dir), pos);
    let axis = if length(toward) > 1e-6 { normalize(toward) } else { [0.0, 0.0, -1.0] };

    (pos, axis)
}

fn spot_from_angles(axis: Vec3, inner_deg: f32, outer_deg: f32) -> Spotlight {
    Spotlight {
        axis,
        cos_inner: inner_deg.to_radians().cos(),
        cos_outer: outer_deg.to_radians().cos(),
    }
}

fn object_lights(
    brush: &Brush,
    obj: ObjId,
    props: &PropertyStore,
    hierarchy: &Hierarchy,
    models: &dyn ModelSource,
    settings: &Settings,
) -> Vec<Light> {
    let static_prop = hierarchy.lookup(&props.light, obj);
    let anim_prop = hierarchy.lookup(&props.anim_light, obj);
    if static_prop.is_none() && anim_prop.is_none() {
        return Vec::new();
    }

    let tint = hierarchy.lookup(&props.light_color, obj)
        .map(|c| hsb_to_rgb(c.hue, (c.saturation * settings.saturation).clamp(0.0, 1.0), 1.0))
        .unwrap_or([1.0, 1.0, 1.0]);
    let (anchor, axis) = object_anchors(brush, obj, props, hierarchy, models);

    let spot_amb = hierarchy.lookup(&props.spot_amb, obj);
    // With SpotAmb the object's own lights stay omni and a companion carries the cone
    let spot = match spot_amb {
        Some(_) => None,
        None => hierarchy.lookup(&props.spotlight, obj).map(|s| spot_from_angles(axis, s.inner, s.outer)),
    };

    let mut lights = Vec::with_capacity(3);

    if let Some(p) = static_prop {
        let mut light = Light::point(LightSource::Object(obj), add(anchor, p.offset), mul(tint, p.brightness), p.radius);
        light.inner_radius = p.inner_radius;
        light.quad_lit = p.quad_lit;
        light.dynamic = p.dynamic;
        light.spot = spot;
        lights.push(light);
    }

    if let Some(p) = anim_prop {
        let mut light = Light::point(LightSource::Object(obj), add(anchor, p.offset), mul(tint, p.max_brightness), p.radius);
        light.inner_radius = p.inner_radius;
        light.quad_lit = p.quad_lit;
        light.spot = spot;
        light.animated = Some(obj);
        lights.push(light);
    }

    if let Some(amb) = spot_amb {
        let mut companion = lights[0].clone();
        companion.color = mul(tint, amb.spot_brightness);
        companion.spot = Some(spot_from_angles(axis, amb.inner, amb.outer));
        companion.animated = None;
        companion.dynamic = false;
        lights.push(companion);
    }

    for light in &lights {
        debug!(
            "Object light ({}): pos {:?}, color {:?}, radius {}, spot {}, animated {}",
            light.source, light.position, light.color, light.radius, light.spot.is_some(), light.is_animated()
        );
    }
    lights
}

/// Reports suspicious lights and drops the ones that contribute nothing
pub fn validate_lights(lights: Vec<Light>, settings: &Settings) -> Vec<Light> {
    let before = lights.len();

    let lights: Vec<Light> = lights.into_iter().filter_map(|mut light| {
        if light.brightness() <= 0.0 {
            debug!("Dropping {}: zero brightness", light.source);
            return None;
        }

        if light.is_unbounded() {
            warn!("Light ({}) has no radius; it reaches every visible cell", light.source);
        } else if light.inner_radius >= light.radius {
            warn!(
                "Light ({}) inner radius {} is not below its radius {}; inner radius ignored",
                light.source, light.inner_radius, light.radius
            );
            light.inner_radius = 0.0;
        } else if light.inner_radius > 0.0 && light.radius - light.inner_radius > light.radius * RADIUS_GAP_WARN_RATIO {
            warn!(
                "Light ({}) falloff band {}..{} spans most of its radius",
                light.source, light.inner_radius, light.radius
            );
        }

        if light.quad_lit && settings.softness != SoftnessMode::Standard {
            warn!("Light ({}) is quad lit, but softness mode {:?} samples it anyway", light.source, settings.softness);
        }

        Some(light)
    }).collect();

    if lights.len() != before {
        debug!("Validation dropped {} of {} lights", before - lights.len(), before);
    }
    lights
}
