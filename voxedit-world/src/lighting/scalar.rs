use crate::dimension::Dimension;
use crate::error::Result;
use crate::geometry::Vector;
use crate::section::LightKind;

use super::{LightEngine, LightGrid};

/// Relights cells one at a time: emit, draw, then spread or fade.
#[derive(Copy, Clone, Debug, Default)]
pub struct ScalarEngine;

impl LightEngine for ScalarEngine {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn relight(&self, dim: &mut Dimension, kind: LightKind, coords: &[Vector<i32>]) -> Result<usize> {
        let mut grid = LightGrid::new(dim, kind);
        for &p in coords {
            relight_cell(&mut grid, p)?;
        }
        Ok(grid.changes())
    }
}

fn relight_cell(grid: &mut LightGrid<'_>, p: Vector<i32>) -> Result<()> {
    let Some(cell) = grid.cell(p)? else {
        return Ok(());
    };
    let previous = grid.light_of(&cell);
    grid.reset(p)?;
    let light = grid.draw(p)?;

    if light > previous {
        spread(grid, vec![p])
    } else if light < previous {
        fade(grid, p, previous)
    } else {
        Ok(())
    }
}

/// Push light outward until no neighbour would get a higher value.
fn spread(grid: &mut LightGrid<'_>, mut stack: Vec<Vector<i32>>) -> Result<()> {
    while let Some(p) = stack.pop() {
        for (n, value) in grid.spread_targets(p)? {
            // an earlier target in this batch may already have raised it
            if grid.light(n)?.is_some_and(|current| current < value) {
                grid.set(n, value)?;
                stack.push(n);
            }
        }
    }
    Ok(())
}

/// Remove light that `origin` used to hand out at `previous`, then let the
/// surroundings flow back in.
fn fade(grid: &mut LightGrid<'_>, origin: Vector<i32>, previous: u8) -> Result<()> {
    let found = grid.discover_dependents(&[(origin, previous)])?;
    grid.reset(origin)?;
    for &p in &found {
        grid.reset(p)?;
    }
    grid.draw(origin)?;
    for &p in &found {
        grid.draw(p)?;
    }
    let mut seeds = found;
    seeds.push(origin);
    spread(grid, seeds)
}
