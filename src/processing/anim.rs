use log::{debug, info};
use crate::mission::props::{Hierarchy, PropertyStore};
use crate::mission::worldrep::{AnimCellRef, WorldRep};
use crate::types::Light;

/// Rebuilds the animated light -> (cell, slot) table from the cell palettes
/// and records each light's span of it on its object. Returns the table size
pub fn finalize(world: &mut WorldRep, lights: &[Light], props: &mut PropertyStore, hierarchy: &Hierarchy) -> usize {
    world.anim_light_cells.clear();

    for light in lights {
        let Some(obj) = light.animated else { continue };
        let offset = world.anim_light_cells.len();

        for (c, cell) in world.cells.iter().enumerate() {
            if let Some(slot) = cell.anim_palette.iter().position(|&t| t as usize == light.table_index) {
                world.anim_light_cells.push(AnimCellRef { cell: c as u32, slot: slot as u8 });
            }
        }

        let reached = world.anim_light_cells.len() - offset;
        props.update_anim_light(hierarchy, obj, |p| {
            p.light_table_index = light.table_index as u32;
            p.map_offset = offset as u32;
            p.cells_reached = reached as u32;
        });
        debug!("Animated light {} (object {}): {} cells from offset {}", light.table_index, obj, reached, offset);
    }

    info!("Animated light map: {} cell entries", world.anim_light_cells.len());
    world.anim_light_cells.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::props::AnimLightProp;
    use crate::test_support::box_cell;
    use crate::types::LightSource;

    #[test]
    fn test_cell_map_in_table_order() {
        let mut world = WorldRep {
            cells: (0..3).map(|i| box_cell([i as f32 * 10.0, 0.0, 0.0], [i as f32 * 10.0 + 10.0, 10.0, 10.0])).collect(),
            ..Default::default()
        };
        world.cells[0].anim_palette = vec![2, 1];
        world.cells[2].anim_palette = vec![1];
        world.anim_light_cells.push(AnimCellRef { cell: 9, slot: 9 });

        let mut lights = vec![
            Light::point(LightSource::Brush(1), [0.0; 3], [1.0; 3], 0.0),
            Light::point(LightSource::Object(10), [0.0; 3], [1.0; 3], 0.0),
            Light::point(LightSource::Object(11), [0.0; 3], [1.0; 3], 0.0),
        ];
        for (i, light) in lights.iter_mut().enumerate() {
            light.table_index = i;
        }
        lights[1].animated = Some(10);
        lights[2].animated = Some(11);

        let mut props = PropertyStore::default();
        props.anim_light.insert(10, AnimLightProp { max_brightness: 5.0, ..Default::default() });
        let hierarchy = props.hierarchy();

        let total = finalize(&mut world, &lights, &mut props, &hierarchy);
        assert_eq!(total, 3);
        assert_eq!(world.anim_light_cells, vec![
            AnimCellRef { cell: 0, slot: 1 },
            AnimCellRef { cell: 2, slot: 0 },
            AnimCellRef { cell: 0, slot: 0 },
        ]);

        let first = &props.anim_light[&10];
        assert_eq!((first.light_table_index, first.map_offset, first.cells_reached), (1, 0, 2));
        let second = &props.anim_light[&11];
        assert_eq!((second.light_table_index, second.map_offset, second.cells_reached), (2, 2, 1));
    }
}
