use crate::math::Vec3;

/// The editor's HSB -> RGB. Not a physical color model: the hue picks a fully
/// saturated color with max channel 1, saturation blends it in from white and
/// brightness scales the result
pub fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> Vec3 {
    let h = hue.rem_euclid(1.0) * 6.0;
    // rem_euclid can round up to exactly 1.0 for tiny negative hues
    let h = if h >= 6.0 { 0.0 } else { h };
    let sector = h.floor() as u32;
    let f = h - h.floor();

    let pure = match sector {
        0 => [1.0, f, 0.0],
        1 => [1.0 - f, 1.0, 0.0],
        2 => [0.0, 1.0, f],
        3 => [0.0, 1.0 - f, 1.0],
        4 => [f, 0.0, 1.0],
        _ => [1.0, 0.0, 1.0 - f],
    };

    let s = saturation.clamp(0.0, 1.0);
    [
        brightness * (1.0 + s * (pure[0] - 1.0)),
        brightness * (1.0 + s * (pure[1] - 1.0)),
        brightness * (1.0 + s * (pure[2] - 1.0)),
    ]
}
