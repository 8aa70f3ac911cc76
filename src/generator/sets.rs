//! Named topology sets of a structured grid of patches.
use crate::topology::{LocalEntity, Side, TopItem, TopologySet};
use fenris_spline::geometry::lattice;

fn entity_prefix(dim: usize) -> &'static str {
    match dim {
        0 => "Vertex",
        1 => "Edge",
        _ => "Face",
    }
}

/// Name of the set collecting all entities of dimension `dim` of a grid with `param_dim`
/// directions.
fn aggregate_name(param_dim: usize, dim: usize) -> &'static str {
    if dim + 1 == param_dim {
        "Boundary"
    } else if dim == 0 {
        "Corners"
    } else {
        "Frame"
    }
}

/// Builds the topology sets of a `counts` grid of patches with `param_dim` directions.
///
/// For every local entity of the grid seen as one big patch (its ends, edges, faces and
/// corners), a set named after the entity, e.g. `Edge3` or `Vertex1`, collects the entities of
/// the patches that make it up. Aggregate sets collect the boundaries (`Boundary`), the corners
/// (`Corners`) and, for volumes, the edges (`Frame`).
///
/// Patch indices are translated by `resolve`, and patches it maps to `None` are left out.
pub fn grid_topology_sets(
    param_dim: usize,
    counts: [usize; 3],
    resolve: impl Fn(usize) -> Option<usize>,
) -> TopologySet {
    let mut sets = TopologySet::new();
    let mut grid = [1; 3];
    grid[..param_dim].copy_from_slice(&counts[..param_dim]);

    for dim in (0..param_dim).rev() {
        let aggregate = aggregate_name(param_dim, dim);
        for item in 1..=LocalEntity::count(param_dim, dim) {
            let Some(entity) = LocalEntity::new(param_dim, item, dim) else {
                continue;
            };
            let name = format!("{}{item}", entity_prefix(dim));
            sets.entry(&name);
            sets.entry(aggregate);

            let on_entity = |cell: &[usize; 3]| {
                entity.fixed().iter().all(|&(d, side)| match side {
                    Side::Min => cell[d] == 0,
                    Side::Max => cell[d] + 1 == grid[d],
                })
            };
            for cell in lattice(grid).filter(on_entity) {
                let patch = 1 + cell[0] + grid[0] * (cell[1] + grid[1] * cell[2]);
                if let Some(local) = resolve(patch) {
                    let top = TopItem::new(local, item, dim);
                    sets.insert(&name, top);
                    sets.insert(aggregate, top);
                }
            }
        }
    }
    sets
}
