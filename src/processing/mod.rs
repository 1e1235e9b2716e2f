use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeSet;
use crate::error::BakeError;
use crate::gather;
use crate::lightmap_writer;
use crate::math::{sphere_overlaps_aabb, AABB};
use crate::mission::model::ModelSource;
use crate::mission::worldrep::Cell;
use crate::mission::Mission;
use crate::types::{Light, Settings};
use pvs::PortalGraph;

pub mod anim;
pub mod falloff;
pub mod geometry;
pub mod light_table;
pub mod mesh;
pub mod pvs;
pub mod sampler;
pub mod tracer;
pub mod utils;

// Lights a cell can list before the run-time starts dropping them
const MAX_LIGHTS_PER_CELL: usize = 96;

#[derive(Debug, Default)]
pub struct BakeReport {
    /// Lights in light-table order
    pub lights: Vec<Light>,
    pub unassigned_lights: usize,
    pub lit_cells: usize,
    pub overlit_cells: usize,
    pub anim_cell_refs: usize,
}

/// Bakes every lightmap of the mission in place and rewrites the light
/// table, the per-cell light lists and the animated-light bookkeeping.
/// Fails before touching the mission if its world data is unusable
pub fn bake_mission(mission: &mut Mission, models: &dyn ModelSource, settings: &Settings) -> anyhow::Result<BakeReport> {
    mission.render_params.as_ref().ok_or(BakeError::MissingRenderParams)?;
    mission.lightmap_params.as_ref().ok_or(BakeError::MissingLightmapParams)?;
    let world = mission.world.as_ref().ok_or(BakeError::MissingWorld)?;
    for (i, cell) in world.cells.iter().enumerate() {
        cell.validate(i, world.cells.len())?;
    }

    let hierarchy = mission.properties.hierarchy();

    // == Lights
    let lights = gather::extract_lights(&mission.brushes, &mission.properties, &hierarchy, models, settings);
    let mut lights = gather::validate_lights(lights, settings);
    light_table::build(&mut mission.light_table, &mut lights, &mut mission.properties, &hierarchy);

    let world = mission.world.as_mut().ok_or(BakeError::MissingWorld)?;

    // == Scene
    let scenes = mesh::commit_scenes(world, &mission.brushes, &mission.properties, &hierarchy, models);

    // == Visibility
    let bounds = geometry::all_cell_bounds(&world.cells);
    let homes: Vec<Option<usize>> = lights.par_iter()
        .map(|light| geometry::find_cell(&world.cells, &bounds, light.position))
        .collect();

    let mut unassigned_lights = 0;
    for (light, home) in lights.iter().zip(&homes) {
        match home {
            Some(cell) => debug!("Light {} ({}) in cell {}", light.table_index, light.source, cell),
            None => {
                warn!("Light {} ({}) at {:?} is outside every cell; lighting it everywhere", light.table_index, light.source, light.position);
                unassigned_lights += 1;
            }
        }
    }

    let graph = PortalGraph::build(&world.cells);
    info!("Resolving visibility ({} mode)...", if settings.fast_pvs { "fast" } else { "exact" });
    let reach = light_reach(&graph, &lights, &homes, settings.fast_pvs);
    let overlit_cells = assign_cell_lights(&mut world.cells, &bounds, &lights, &reach);
    let lit_cells = world.cells.iter().filter(|c| c.light_count() > 0).count();
    info!("{} of {} cells see at least one light", lit_cells, world.cells.len());

    // == Trace
    info!("Tracing {} cells...", world.cells.len());
    let format = world.lightmap_format;
    world.cells.par_iter_mut().enumerate().try_for_each(|(i, cell)| {
        let lighting = sampler::light_cell(i, cell, &lights, &scenes, settings);
        lightmap_writer::write_cell(i, cell, &lighting, format, settings.hdr)
    })?;

    // == Animated lights
    let anim_cell_refs = anim::finalize(world, &lights, &mut mission.properties, &hierarchy);

    if let Some(params) = mission.lightmap_params.as_mut() {
        params.object_shadows = true;
    }

    Ok(BakeReport { lights, unassigned_lights, lit_cells, overlit_cells, anim_cell_refs })
}

/// Cells each light may reach, sorted. None for lights outside the world,
/// which count as visible everywhere
fn light_reach(graph: &PortalGraph, lights: &[Light], homes: &[Option<usize>], fast: bool) -> Vec<Option<Vec<usize>>> {
    if fast {
        let lit: BTreeSet<usize> = homes.iter().flatten().copied().collect();
        graph.precompute(&lit.into_iter().collect::<Vec<_>>());
    }

    lights.par_iter()
        .zip(homes.par_iter())
        .map(|(light, home)| {
            let home = (*home)?;
            if light.dynamic {
                return Some(Vec::new());
            }
            Some(if fast {
                graph.visible_cells(home)
            } else {
                graph.light_visible_cells(light.position, light.radius_sq, home)
            })
        })
        .collect()
}

/// Writes every cell's light-index list. Returns the number of overlit cells
fn assign_cell_lights(cells: &mut [Cell], bounds: &[AABB], lights: &[Light], reach: &[Option<Vec<usize>>]) -> usize {
    cells.par_iter_mut()
        .enumerate()
        .map(|(c, cell)| {
            let mut list = vec![0u16];
            for (light, visible) in lights.iter().zip(reach) {
                if light.dynamic {
                    continue;
                }
                let sees = visible.as_ref().is_none_or(|cells| cells.binary_search(&c).is_ok());
                if !sees || !sphere_overlaps_aabb(light.position, light.radius_sq, &bounds[c]) {
                    continue;
                }
                match u16::try_from(light.table_index + 1) {
                    Ok(entry) => list.push(entry),
                    Err(_) => warn!("Cell {}: light {} ({}) is past the last listable index", c, light.table_index, light.source),
                }
            }
            list[0] = (list.len() - 1) as u16;

            let overlit = list.len() > MAX_LIGHTS_PER_CELL + 1;
            if overlit {
                warn!("Cell {} is overlit: {} lights (max {})", c, list.len() - 1, MAX_LIGHTS_PER_CELL);
            }
            cell.light_indices = list;
            overlit as usize
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::model::ModelLibrary;
    use crate::mission::props::{AnimLightProp, LightProp};
    use crate::mission::worldrep::WorldRep;
    use crate::test_support::{grid_world, light_brush, mission_with_world, object_brush};
    use crate::types::LightSource;

    fn corridor_mission(cells: i32) -> Mission {
        let coords: Vec<[i32; 2]> = (0..cells).map(|i| [i, 0]).collect();
        mission_with_world(grid_world(&coords, 10.0, 10.0, 2.5))
    }

    fn bake(mission: &mut Mission) -> BakeReport {
        let settings = mission.settings().expect("params present");
        bake_mission(mission, &ModelLibrary::new(), &settings).expect("bake succeeds")
    }

    fn world(mission: &Mission) -> &WorldRep {
        mission.world.as_ref().expect("world present")
    }

    #[test]
    fn test_unlistable_light_index_is_skipped() {
        let world = grid_world(&[[0, 0]], 10.0, 10.0, 2.5);
        let mut cells = world.cells;
        let bounds = geometry::all_cell_bounds(&cells);

        let mut lights: Vec<Light> = [3, u16::MAX as usize, 70_000].into_iter().map(|index| {
            let mut light = Light::point(LightSource::Brush(1), [5.0, 5.0, 5.0], [10.0; 3], 0.0);
            light.table_index = index;
            light
        }).collect();
        lights.push(lights[0].clone());
        lights[3].table_index = u16::MAX as usize - 1;

        assign_cell_lights(&mut cells, &bounds, &lights, &[None, None, None, None]);
        assert_eq!(cells[0].light_indices, vec![2, 4, u16::MAX]);
    }

    #[test]
    fn test_light_list_counts() {
        for n in 0..5 {
            let mut mission = corridor_mission(4);
            for i in 0..n {
                mission.brushes.push(light_brush(i, [5.0 + i as f32 * 10.0 * 0.7, 5.0, 5.0], 40.0));
            }
            bake(&mut mission);

            for cell in &world(&mission).cells {
                assert_eq!(cell.light_indices[0] as usize, cell.light_indices.len() - 1);
                assert!(cell.light_indices[1..].iter().all(|&i| i >= 1 && i as usize <= n as usize));
            }
        }
    }

    #[test]
    fn test_bake_writes_back_everything() {
        let mut mission = corridor_mission(3);
        mission.brushes.push(light_brush(1, [5.0, 5.0, 5.0], 64.0));
        mission.light_table.push(crate::mission::LightTableEntry {
            position: [0.0; 3],
            direction: [0.0; 3],
            color: [0.0; 3],
            inner: 0.0,
            outer: 0.0,
            radius: 0.0,
            dynamic: false,
        });

        let report = bake(&mut mission);
        assert_eq!(report.lights.len(), 1);
        assert_eq!(mission.light_table.len(), 1, "old table replaced");
        assert_eq!(mission.light_table[0].color, [2.0, 2.0, 2.0]);
        assert!(mission.lightmap_params.as_ref().is_some_and(|p| p.object_shadows));

        let world = world(&mission);
        assert_eq!(world.cells[0].light_indices, vec![1, 1]);
        for cell in &world.cells {
            for lm in &cell.lightmaps {
                assert_eq!(lm.data.len(), lm.texel_count() * 4);
                assert_eq!(lm.anim_flags, 0);
            }
        }
        // The lit room is brighter than ambient somewhere
        assert!(world.cells[0].lightmaps[0].data.iter().any(|&b| b != 0 && b != 255));
    }

    #[test]
    fn test_dynamic_lights_listed_but_not_baked() {
        let mut mission = corridor_mission(2);
        mission.brushes.push(object_brush(1, 5, [5.0, 5.0, 5.0]));
        mission.properties.light.insert(5, LightProp { brightness: 90.0, dynamic: true, ..Default::default() });

        let report = bake(&mut mission);
        assert_eq!(report.lights.len(), 1);
        assert!(mission.light_table[0].dynamic);
        let world = world(&mission);
        assert!(world.cells.iter().all(|c| c.light_count() == 0));
        assert!(world.cells[0].lightmaps[0].data.chunks(4).all(|t| t == [0, 0, 0, 255]));
    }

    #[test]
    fn test_animated_light_end_to_end() {
        let mut mission = corridor_mission(3);
        mission.brushes.push(object_brush(1, 8, [15.0, 5.0, 5.0]));
        mission.properties.anim_light.insert(8, AnimLightProp { max_brightness: 60.0, radius: 12.0, ..Default::default() });

        let report = bake(&mut mission);
        let prop = &mission.properties.anim_light[&8];
        assert_eq!(prop.light_table_index, 0);
        assert_eq!(prop.map_offset, 0);
        assert_eq!(prop.cells_reached as usize, report.anim_cell_refs);

        let world = world(&mission);
        assert!(report.anim_cell_refs >= 1);
        let home = &world.cells[1];
        assert_eq!(home.anim_palette, vec![0]);
        assert!(home.lightmaps.iter().any(|lm| lm.anim_flags == 1 && lm.layer_count() == 2));
        assert!(world.anim_light_cells.windows(2).all(|w| w[0].cell < w[1].cell));
    }

    #[test]
    fn test_overlit_cell_reported() {
        let mut mission = corridor_mission(1);
        for i in 0..(MAX_LIGHTS_PER_CELL as i32 + 2) {
            mission.brushes.push(light_brush(i, [5.0, 5.0, 5.0], 1.0));
        }
        let report = bake(&mut mission);
        assert_eq!(report.overlit_cells, 1);
        assert_eq!(world(&mission).cells[0].light_count(), MAX_LIGHTS_PER_CELL + 2);
    }

    #[test]
    fn test_light_outside_world_lights_everything() {
        let mut mission = corridor_mission(2);
        mission.brushes.push(light_brush(1, [500.0, 500.0, 500.0], 10.0));
        let report = bake(&mut mission);

        assert_eq!(report.unassigned_lights, 1);
        assert!(world(&mission).cells.iter().all(|c| c.light_indices == vec![1, 1]));
    }

    #[test]
    fn test_exact_lists_within_fast_lists() {
        let coords = [[0, 0], [1, 0], [2, 0], [2, 1], [2, 2]];
        let make = || {
            let mut mission = mission_with_world(grid_world(&coords, 10.0, 10.0, 5.0));
            mission.brushes.push(light_brush(1, [0.5, 0.5, 5.0], 30.0));
            mission
        };

        let mut fast = make();
        bake(&mut fast);

        let mut exact = make();
        let settings = Settings { fast_pvs: false, ..exact.settings().expect("params present") };
        bake_mission(&mut exact, &ModelLibrary::new(), &settings).expect("bake succeeds");

        let fast_cells = &world(&fast).cells;
        let exact_cells = &world(&exact).cells;
        for (f, e) in fast_cells.iter().zip(exact_cells) {
            assert!(e.light_count() <= f.light_count());
        }
        assert_eq!(fast_cells[4].light_count(), 1);
        assert_eq!(exact_cells[4].light_count(), 0);
    }

    #[test]
    fn test_same_bytes_for_any_thread_count() {
        let make = || {
            let mut mission = corridor_mission(4);
            mission.brushes.push(light_brush(1, [5.0, 5.0, 5.0], 80.0));
            mission.brushes.push(light_brush(2, [33.0, 4.0, 7.0], 50.0));
            mission.brushes.push(object_brush(3, 9, [18.0, 6.0, 3.0]));
            mission.properties.anim_light.insert(9, AnimLightProp { max_brightness: 70.0, ..Default::default() });
            if let Some(params) = mission.lightmap_params.as_mut() {
                params.softness = crate::types::SoftnessMode::NinePoint;
            }
            mission
        };

        let run = |threads: usize| {
            let mut mission = make();
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().expect("thread pool");
            pool.install(|| bake(&mut mission));
            world(&mission).cells.iter()
                .map(|c| (c.light_indices.clone(), c.anim_palette.clone(), c.lightmaps.iter().map(|lm| lm.data.clone()).collect::<Vec<_>>()))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(1), run(4));
    }

    #[test]
    fn test_missing_data_is_fatal() {
        let mut mission = Mission::default();
        let settings = Settings::default();
        let err = bake_mission(&mut mission, &ModelLibrary::new(), &settings).expect_err("no params");
        assert!(matches!(err.downcast_ref::<BakeError>(), Some(BakeError::MissingRenderParams)));

        let mut mission = corridor_mission(1);
        mission.world = None;
        let err = bake_mission(&mut mission, &ModelLibrary::new(), &settings).expect_err("no world");
        assert!(matches!(err.downcast_ref::<BakeError>(), Some(BakeError::MissingWorld)));
    }

    #[test]
    fn test_invalid_cell_aborts_before_writing() {
        let mut mission = corridor_mission(2);
        mission.brushes.push(light_brush(1, [5.0, 5.0, 5.0], 10.0));
        if let Some(world) = mission.world.as_mut() {
            world.cells[1].polygons[0].vertices[0] = 99;
        }

        let err = bake_mission(&mut mission, &ModelLibrary::new(), &Settings::default()).expect_err("bad vertex index");
        assert!(matches!(err.downcast_ref::<BakeError>(), Some(BakeError::InvalidCell { cell: 1, .. })));
        assert!(mission.light_table.is_empty());
    }
}
