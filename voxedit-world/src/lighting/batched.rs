use std::collections::HashMap;

use crate::dimension::Dimension;
use crate::error::Result;
use crate::geometry::Vector;
use crate::section::LightKind;

use super::{LightEngine, LightGrid};

/// Relights a whole coordinate list per phase: every emission is written
/// before any draw, fades start from all darkened cells at once, and spread
/// advances one ring of neighbours per sweep until nothing gets brighter.
#[derive(Copy, Clone, Debug, Default)]
pub struct BatchedEngine;

impl LightEngine for BatchedEngine {
    fn name(&self) -> &'static str {
        "batched"
    }

    fn relight(&self, dim: &mut Dimension, kind: LightKind, coords: &[Vector<i32>]) -> Result<usize> {
        let mut grid = LightGrid::new(dim, kind);

        let mut targets = Vec::with_capacity(coords.len());
        for &p in coords {
            if let Some(cell) = grid.cell(p)? {
                targets.push((p, grid.light_of(&cell)));
                grid.reset(p)?;
            }
        }

        let mut brighter = Vec::new();
        let mut darker = Vec::new();
        for &(p, previous) in &targets {
            let light = grid.draw(p)?;
            if light > previous {
                brighter.push(p);
            } else if light < previous {
                darker.push((p, previous));
            }
        }

        let mut frontier = brighter;
        if !darker.is_empty() {
            let found = grid.discover_dependents(&darker)?;
            let faded: Vec<Vector<i32>> = darker.iter().map(|&(p, _)| p).chain(found).collect();
            for &p in &faded {
                grid.reset(p)?;
            }
            for &p in &faded {
                grid.draw(p)?;
            }
            frontier.extend(faded);
        }

        let mut sweeps = 0;
        while !frontier.is_empty() {
            let mut raised: HashMap<Vector<i32>, u8> = HashMap::new();
            for &p in &frontier {
                for (n, value) in grid.spread_targets(p)? {
                    let best = raised.entry(n).or_insert(0);
                    *best = (*best).max(value);
                }
            }
            frontier = Vec::with_capacity(raised.len());
            for (n, value) in raised {
                grid.set(n, value)?;
                frontier.push(n);
            }
            sweeps += 1;
        }
        log::trace!("{:?} light settled after {} sweeps", kind, sweeps);

        Ok(grid.changes())
    }
}
