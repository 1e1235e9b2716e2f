use crate::math::{dot, length, mul, sub, Vec3};
use crate::types::{Light, Settings};

// Keeps 4 / d^k finite for samples sitting on the light
const MIN_DISTANCE: f32 = 0.01;

/// Photometric strength of `light` at `point` on a surface with `normal`.
/// The caller multiplies by the light color and the sample weight
pub fn strength_at_point(light: &Light, point: Vec3, normal: Vec3, settings: &Settings) -> f32 {
    let att = settings.attenuation;
    let delta = sub(point, light.position);
    let distance = length(delta).max(MIN_DISTANCE);
    let dir = mul(delta, 1.0 / distance);

    let mut strength = 4.0 / distance.powf(att);

    let cos_theta = dot(dir, normal).abs();
    strength *= 1.0 + cos_theta.powf(att);

    if light.inner_radius > 0.0 && distance > light.inner_radius {
        let band = ((light.radius - distance) / (light.radius - light.inner_radius)).max(0.0);
        strength *= band.powf(att);
    }

    // Culled before the cone term on purpose; the run-time lighting does the same
    if light.is_animated() && strength * light.brightness() < settings.anim_light_cutoff {
        return 0.0;
    }

    if let Some(spot) = &light.spot {
        let cos_axis = dot(dir, spot.axis);
        let factor = if cos_axis >= spot.cos_inner {
            1.0
        } else if cos_axis <= spot.cos_outer {
            0.0
        } else {
            (cos_axis - spot.cos_outer) / (spot.cos_inner - spot.cos_outer)
        };
        strength *= factor;
    }

    strength
}
