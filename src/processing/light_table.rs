use log::{debug, info};
use crate::math::{mul, Vec3};
use crate::mission::props::{Hierarchy, PropertyStore};
use crate::mission::{LightTable, LightTableEntry};
use crate::types::{Light, LIGHT_INTENSITY_SCALE};

fn entry(light: &Light) -> LightTableEntry {
    let (direction, inner, outer): (Vec3, f32, f32) = match &light.spot {
        Some(spot) => (spot.axis, spot.cos_inner, spot.cos_outer),
        None => ([0.0; 3], 0.0, 0.0),
    };

    LightTableEntry {
        position: light.position,
        direction,
        color: mul(light.color, 1.0 / LIGHT_INTENSITY_SCALE),
        inner,
        outer,
        // The table keeps 0 for "no range limit"
        radius: if light.is_unbounded() { 0.0 } else { light.radius },
        dynamic: light.dynamic,
    }
}

/// Rebuilds the table from scratch in light order and stamps each light
/// with its index. Animated lights also record it on their object
pub fn build(table: &mut LightTable, lights: &mut [Light], props: &mut PropertyStore, hierarchy: &Hierarchy) {
    table.clear();

    for light in lights.iter_mut() {
        light.table_index = table.len();
        table.push(entry(light));

        if let Some(obj) = light.animated {
            let index = light.table_index as u32;
            props.update_anim_light(hierarchy, obj, |p| p.light_table_index = index);
            debug!("Animated light of object {} -> table slot {}", obj, index);
        }
    }

    info!(
        "Light table: {} entries ({} animated, {} dynamic)",
        table.len(),
        lights.iter().filter(|l| l.is_animated()).count(),
        lights.iter().filter(|l| l.dynamic).count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::props::{AnimLightProp, MetaPropLink};
    use crate::types::{LightSource, Spotlight};

    #[test]
    fn test_table_is_rebuilt_in_order() {
        let mut table = LightTable::default();
        table.push(entry(&Light::point(LightSource::Brush(99), [9.0; 3], [1.0; 3], 1.0)));

        let mut lights = vec![
            Light::point(LightSource::Brush(1), [1.0, 0.0, 0.0], [64.0, 32.0, 0.0], 0.0),
            Light::point(LightSource::Brush(2), [2.0, 0.0, 0.0], [32.0; 3], 50.0),
        ];
        lights[1].spot = Some(Spotlight { axis: [0.0, 0.0, -1.0], cos_inner: 0.9, cos_outer: 0.5 });
        lights[1].dynamic = true;

        let mut props = PropertyStore::default();
        let hierarchy = props.hierarchy();
        build(&mut table, &mut lights, &mut props, &hierarchy);

        assert_eq!(table.len(), 2);
        assert_eq!(lights[1].table_index, 1);
        assert_eq!(table[0].color, [2.0, 1.0, 0.0]);
        assert_eq!(table[0].radius, 0.0);
        assert_eq!(table[0].inner, 0.0);
        assert_eq!(table[1].radius, 50.0);
        assert_eq!(table[1].direction, [0.0, 0.0, -1.0]);
        assert_eq!((table[1].inner, table[1].outer), (0.9, 0.5));
        assert!(table[1].dynamic);
    }

    #[test]
    fn test_animated_index_written_to_concrete_object() {
        let mut props = PropertyStore::default();
        props.links.push(MetaPropLink { source: 4, dest: -20, priority: 0 });
        props.anim_light.insert(-20, AnimLightProp { max_brightness: 40.0, ..Default::default() });
        let hierarchy = props.hierarchy();

        let mut lights = vec![
            Light::point(LightSource::Brush(1), [0.0; 3], [1.0; 3], 0.0),
            Light::point(LightSource::Object(4), [0.0; 3], [40.0; 3], 0.0),
        ];
        lights[1].animated = Some(4);

        let mut table = LightTable::default();
        build(&mut table, &mut lights, &mut props, &hierarchy);

        assert_eq!(props.anim_light[&4].light_table_index, 1);
        assert_eq!(props.anim_light[&4].max_brightness, 40.0);
        assert!(props.anim_light.contains_key(&-20));
    }
}
