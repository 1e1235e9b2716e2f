use log::debug;
use rayon::prelude::*;
use crate::math::{Transform, Vec3, AABB, EPSILON};
use crate::mission::props::{Hierarchy, PropertyStore};
use crate::mission::worldrep::Cell;
use crate::mission::Brush;

/// Placement of an object brush: scale, then rotation, then translation
pub fn object_transform(brush: &Brush, props: &PropertyStore, hierarchy: &Hierarchy) -> Transform {
    let scale = brush.object
        .and_then(|obj| hierarchy.lookup(&props.scale, obj).copied())
        .unwrap_or([1.0, 1.0, 1.0]);
    Transform::new(brush.position, brush.facing, scale)
}

pub fn cell_bounds(cell: &Cell) -> AABB {
    AABB::from_points(&cell.vertices)
}

pub fn all_cell_bounds(cells: &[Cell]) -> Vec<AABB> {
    cells.par_iter().map(cell_bounds).collect()
}

/// Inside or on every bounding plane, within epsilon
pub fn cell_contains(cell: &Cell, bounds: &AABB, point: Vec3) -> bool {
    bounds.contains_point(point, EPSILON)
        && cell.planes.iter().all(|plane| plane.distance(point) >= -EPSILON)
}

/// First cell containing `point`
pub fn find_cell(cells: &[Cell], bounds: &[AABB], point: Vec3) -> Option<usize> {
    let found = cells.iter()
        .zip(bounds)
        .position(|(cell, b)| cell_contains(cell, b, point));
    if found.is_none() {
        debug!("No cell contains {:?}", point);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::BrushKind;
    use crate::test_support::box_cell;

    #[test]
    fn test_point_on_every_plane_is_contained() {
        // A box corner sits exactly on three of the bounding planes
        let cell = box_cell([0.0; 3], [4.0, 4.0, 4.0]);
        let bounds = cell_bounds(&cell);

        let corner = [0.0, 0.0, 0.0];
        assert!(cell.planes.iter().any(|p| p.distance(corner).abs() < 1e-6));
        assert!(cell_contains(&cell, &bounds, corner));

        let just_outside = [0.0, 0.0, -EPSILON * 0.5];
        assert!(cell_contains(&cell, &bounds, just_outside), "epsilon inclusive");
        assert!(!cell_contains(&cell, &bounds, [0.0, 0.0, -0.1]));
    }

    #[test]
    fn test_point_on_all_planes_of_thin_cell() {
        // Zero-thickness slab: both z planes pass through z = 2
        let cell = box_cell([0.0, 0.0, 2.0], [4.0, 4.0, 2.0]);
        let bounds = cell_bounds(&cell);
        assert!(cell_contains(&cell, &bounds, [0.0, 0.0, 2.0]));
    }

    #[test]
    fn test_find_cell_prefers_first() {
        let cells = vec![box_cell([0.0; 3], [10.0; 3]), box_cell([10.0, 0.0, 0.0], [20.0, 10.0, 10.0])];
        let bounds = all_cell_bounds(&cells);

        assert_eq!(find_cell(&cells, &bounds, [5.0, 5.0, 5.0]), Some(0));
        assert_eq!(find_cell(&cells, &bounds, [15.0, 5.0, 5.0]), Some(1));
        assert_eq!(find_cell(&cells, &bounds, [10.0, 5.0, 5.0]), Some(0));
        assert_eq!(find_cell(&cells, &bounds, [50.0, 5.0, 5.0]), None);
    }

    #[test]
    fn test_object_transform_uses_inherited_scale() {
        let mut props = PropertyStore::default();
        props.links.push(crate::mission::props::MetaPropLink { source: 3, dest: -1, priority: 0 });
        props.scale.insert(-1, [2.0, 2.0, 2.0]);
        let brush = Brush {
            id: 9,
            kind: BrushKind::Object,
            position: [1.0, 0.0, 0.0],
            size: [0.0; 3],
            facing: [0.0; 3],
            object: Some(3),
        };

        let t = object_transform(&brush, &props, &props.hierarchy());
        assert_eq!(t.apply([1.0, 1.0, 1.0]), [3.0, 2.0, 2.0]);
    }
}
