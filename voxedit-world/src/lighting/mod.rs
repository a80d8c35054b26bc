//! Block light and sky light recomputation after block changes.
//!
//! Light entering a cell drops by the cell's light opacity (never below 1).
//! A cell's light is the larger of its own emission and the best value it can
//! draw from a face neighbour. Block emission is the block's brightness; sky
//! emission is 15 at or above the column's height map and 0 below it.
//!
//! Two engines implement the same rules: [`ScalarEngine`] relights one cell at
//! a time, [`BatchedEngine`] handles the whole coordinate list in sweeps.

mod batched;
mod scalar;

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use batched::BatchedEngine;
pub use scalar::ScalarEngine;

use crate::blocktypes::BlockTypeSet;
use crate::dimension::{CellState, Dimension};
use crate::error::Result;
use crate::geometry::Vector;
use crate::progress::Progress;
use crate::section::{LightKind, MAX_LIGHT};
use crate::selection::Selection;

pub(crate) const FACES: [Vector<i32>; 6] = [
    Vector::new(1, 0, 0),
    Vector::new(-1, 0, 0),
    Vector::new(0, 1, 0),
    Vector::new(0, -1, 0),
    Vector::new(0, 0, 1),
    Vector::new(0, 0, -1),
];

pub trait LightEngine {
    fn name(&self) -> &'static str;

    /// Recompute one light channel at `coords` and propagate the result.
    /// Returns how many stored light values changed.
    fn relight(&self, dim: &mut Dimension, kind: LightKind, coords: &[Vector<i32>]) -> Result<usize>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelightReport {
    pub requested: usize,
    pub columns_changed: usize,
    pub block_light_changes: usize,
    pub sky_light_changes: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RelightReport {
    pub(crate) fn absorb(&mut self, other: RelightReport) {
        self.requested += other.requested;
        self.columns_changed += other.columns_changed;
        self.block_light_changes += other.block_light_changes;
        self.sky_light_changes += other.sky_light_changes;
        self.elapsed += other.elapsed;
    }
}

/// Relight cells whose block changed, with the default engine.
pub fn update_lights_by_coord(dim: &mut Dimension, coords: &[Vector<i32>]) -> Result<RelightReport> {
    update_lights_with(dim, coords, &BatchedEngine)
}

pub fn update_lights_with(dim: &mut Dimension, coords: &[Vector<i32>], engine: &dyn LightEngine) -> Result<RelightReport> {
    let start = Instant::now();
    let mut cells: Vec<Vector<i32>> = coords.iter().copied().filter(|p| dim.in_bounds(p.x, p.y, p.z)).collect();
    sort_cells(&mut cells);
    if cells.is_empty() {
        return Ok(RelightReport::default());
    }

    // Height map pass: cells between the old and new height of a column
    // change sky emission even though their block did not change. The height
    // map may already be current when blocks were written without light, so
    // the span also covers every height the changed cells could have set.
    let mut columns: BTreeMap<(i32, i32), (i32, i32)> = BTreeMap::new();
    for p in &cells {
        let span = columns.entry((p.x, p.z)).or_insert((p.y, p.y));
        span.0 = span.0.min(p.y);
        span.1 = span.1.max(p.y);
    }
    let bounds = dim.bounds();
    let mut sky_cells = cells.clone();
    let mut columns_changed = 0;
    for ((x, z), (low, high)) in columns {
        let Some((old, new)) = dim.update_height(x, z)? else {
            continue;
        };
        if old != new {
            columns_changed += 1;
        } else if new > high + 1 {
            // an unchanged block above every changed cell sets the height
            continue;
        }
        let floor = dim.height_below(x, low, z)?.unwrap_or(old);
        let lo = old.min(new).min(floor).max(bounds.miny());
        let hi = old.max(new).max(high + 1).min(bounds.maxy());
        sky_cells.extend((lo..hi).map(|y| Vector::new(x, y, z)));
    }
    sort_cells(&mut sky_cells);

    let block_light_changes = engine.relight(dim, LightKind::Block, &cells)?;
    let sky_light_changes = engine.relight(dim, LightKind::Sky, &sky_cells)?;

    let elapsed = start.elapsed();
    dim.metrics().record_relight(elapsed, cells.len());
    log::debug!(
        "{} relit {} cells ({} block, {} sky changes, {} columns) in {:?}",
        engine.name(),
        cells.len(),
        block_light_changes,
        sky_light_changes,
        columns_changed,
        elapsed
    );
    Ok(RelightReport {
        requested: cells.len(),
        columns_changed,
        block_light_changes,
        sky_light_changes,
        elapsed,
        cancelled: false,
    })
}

/// Rebuild height maps and relight every selected cell, chunk by chunk.
pub fn relight_selection(dim: &mut Dimension, selection: &dyn Selection, progress: &mut dyn Progress) -> Result<RelightReport> {
    let blocktypes = dim.blocktypes_arc();
    let positions = selection.chunk_positions();
    let total = positions.len();
    let bounds = dim.bounds();
    let mut report = RelightReport::default();

    for (i, (cx, cz)) in positions.into_iter().enumerate() {
        if progress.is_cancelled() {
            log::info!("Relight cancelled after {} of {} chunks", i, total);
            report.cancelled = true;
            break;
        }
        progress.update(i, total, "Relighting");

        let Some(chunk) = dim.try_chunk(cx, cz)? else {
            continue;
        };
        chunk.recompute_height_map(&blocktypes);

        let mut cells = Vec::new();
        for cy in selection.section_positions(cx, cz) {
            let Some(mask) = selection.section_mask(cx, cy, cz) else {
                continue;
            };
            let origin = Vector::new(cx << 4, cy << 4, cz << 4);
            cells.extend(
                mask.positions()
                    .map(|p| p + origin)
                    .filter(|p| p.y >= bounds.miny() && p.y < bounds.maxy()),
            );
        }
        report.absorb(update_lights_by_coord(dim, &cells)?);
    }
    progress.update(total, total, "Relighting");
    Ok(report)
}

fn sort_cells(cells: &mut Vec<Vector<i32>>) {
    cells.sort_unstable_by_key(|p| (p.y, p.z, p.x));
    cells.dedup();
}

/// One light channel of a dimension, as seen by the engines.
pub(crate) struct LightGrid<'a> {
    dim: &'a mut Dimension,
    blocktypes: Arc<BlockTypeSet>,
    kind: LightKind,
    changes: usize,
}

impl<'a> LightGrid<'a> {
    pub(crate) fn new(dim: &'a mut Dimension, kind: LightKind) -> Self {
        let blocktypes = dim.blocktypes_arc();
        Self { dim, blocktypes, kind, changes: 0 }
    }

    pub(crate) fn changes(&self) -> usize {
        self.changes
    }

    /// `None` for cells outside the dimension or in absent chunks.
    pub(crate) fn cell(&mut self, p: Vector<i32>) -> Result<Option<CellState>> {
        self.dim.cell(p.x, p.y, p.z)
    }

    pub(crate) fn light(&mut self, p: Vector<i32>) -> Result<Option<u8>> {
        Ok(self.cell(p)?.map(|c| c.light(self.kind)))
    }

    pub(crate) fn light_of(&self, cell: &CellState) -> u8 {
        cell.light(self.kind)
    }

    pub(crate) fn set(&mut self, p: Vector<i32>, value: u8) -> Result<()> {
        match self.light(p)? {
            Some(current) if current != value => {
                self.changes += 1;
                self.dim.set_light_at(self.kind, p.x, p.y, p.z, value)
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn emission(&self, cell: &CellState, y: i32) -> u8 {
        match self.kind {
            LightKind::Block => self.blocktypes.brightness(cell.block),
            LightKind::Sky => {
                if y >= cell.height {
                    MAX_LIGHT
                } else {
                    0
                }
            }
        }
    }

    pub(crate) fn opacity(&self, cell: &CellState) -> u8 {
        self.blocktypes.light_opacity(cell.block)
    }

    /// Reset a cell to its own emission.
    pub(crate) fn reset(&mut self, p: Vector<i32>) -> Result<()> {
        if let Some(cell) = self.cell(p)? {
            let emitted = self.emission(&cell, p.y);
            self.set(p, emitted)?;
        }
        Ok(())
    }

    /// Raise a cell to the best value a neighbour can give it. Returns the
    /// resulting light.
    pub(crate) fn draw(&mut self, p: Vector<i32>) -> Result<u8> {
        let Some(cell) = self.cell(p)? else {
            return Ok(0);
        };
        let opacity = self.opacity(&cell);
        let mut light = self.light_of(&cell);
        for face in FACES {
            if let Some(neighbour) = self.light(p + face)? {
                light = light.max(neighbour.saturating_sub(opacity));
            }
        }
        self.set(p, light)?;
        Ok(light)
    }

    /// Neighbours of `p` that can be raised by its current light, with the
    /// value they would get.
    pub(crate) fn spread_targets(&mut self, p: Vector<i32>) -> Result<Vec<(Vector<i32>, u8)>> {
        let mut out = Vec::new();
        let Some(light) = self.light(p)? else {
            return Ok(out);
        };
        if light <= 1 {
            return Ok(out);
        }
        for face in FACES {
            let n = p + face;
            let Some(cell) = self.cell(n)? else {
                continue;
            };
            let value = light.saturating_sub(self.opacity(&cell));
            if value > self.light_of(&cell) {
                out.push((n, value));
            }
        }
        Ok(out)
    }

    /// Every cell whose light is exactly what the given origins would have
    /// handed it through a chain of neighbours, given their old values.
    pub(crate) fn discover_dependents(&mut self, origins: &[(Vector<i32>, u8)]) -> Result<Vec<Vector<i32>>> {
        let mut seen: HashSet<Vector<i32>> = origins.iter().map(|&(p, _)| p).collect();
        let mut queue: VecDeque<(Vector<i32>, u8)> = origins.iter().copied().collect();
        let mut found = Vec::new();
        while let Some((p, old)) = queue.pop_front() {
            for face in FACES {
                let n = p + face;
                if seen.contains(&n) {
                    continue;
                }
                let Some(cell) = self.cell(n)? else {
                    continue;
                };
                let expected = old.saturating_sub(self.opacity(&cell));
                if expected > 0 && self.light_of(&cell) == expected {
                    seen.insert(n);
                    found.push(n);
                    queue.push_back((n, expected));
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocktypes::BlockTypeSet;

    fn dim() -> Dimension {
        let mut d = Dimension::memory(Arc::new(BlockTypeSet::classic()));
        for cx in -1..=1 {
            for cz in -1..=1 {
                d.create_chunk(cx, cz).unwrap();
            }
        }
        d
    }

    #[test]
    fn test_torch_lights_neighbours() {
        for engine in [&ScalarEngine as &dyn LightEngine, &BatchedEngine] {
            let mut d = dim();
            d.set_block_at(0, 10, 0, 50, 0, false).unwrap();
            update_lights_with(&mut d, &[Vector::new(0, 10, 0)], engine).unwrap();
            assert_eq!(d.light_at(LightKind::Block, 0, 10, 0).unwrap(), Some(14), "{}", engine.name());
            assert_eq!(d.light_at(LightKind::Block, 1, 10, 0).unwrap(), Some(13));
            assert_eq!(d.light_at(LightKind::Block, -3, 12, 1).unwrap(), Some(8));
            assert_eq!(d.light_at(LightKind::Block, 0, 24, 0).unwrap(), Some(0));
        }
    }

    #[test]
    fn test_roof_shades_column() {
        let mut d = dim();
        d.set_block_at(4, 20, 4, 1, 0, false).unwrap();
        let report = update_lights_by_coord(&mut d, &[Vector::new(4, 20, 4)]).unwrap();
        assert_eq!(report.columns_changed, 1);
        assert_eq!(d.light_at(LightKind::Sky, 4, 20, 4).unwrap(), Some(0));
        assert_eq!(d.light_at(LightKind::Sky, 4, 21, 4).unwrap(), Some(15));
        // light leaks in from the open neighbouring columns
        assert_eq!(d.light_at(LightKind::Sky, 4, 19, 4).unwrap(), Some(14));
        assert_eq!(d.light_at(LightKind::Sky, 4, 0, 4).unwrap(), Some(14));

        d.set_block_at(4, 20, 4, 0, 0, false).unwrap();
        update_lights_by_coord(&mut d, &[Vector::new(4, 20, 4)]).unwrap();
        assert_eq!(d.light_at(LightKind::Sky, 4, 19, 4).unwrap(), Some(15));
        assert_eq!(d.light_at(LightKind::Sky, 4, 20, 4).unwrap(), Some(15));
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut d = dim();
        let report = update_lights_by_coord(&mut d, &[Vector::new(0, -5, 0), Vector::new(500, 10, 500)]).unwrap();
        assert_eq!(report.requested, 1);
        assert_eq!(report.block_light_changes, 0);
    }

    #[test]
    fn test_dependents_follow_exact_values() {
        let mut d = dim();
        d.set_block_at(0, 30, 0, 89, 0, false).unwrap();
        update_lights_by_coord(&mut d, &[Vector::new(0, 30, 0)]).unwrap();
        let mut grid = LightGrid::new(&mut d, LightKind::Block);
        let found = grid.discover_dependents(&[(Vector::new(0, 30, 0), 15)]).unwrap();
        // every cell within 14 steps got its light from the glowstone
        let expected: usize = (1..=14).map(|r| 4 * r * r + 2).sum();
        assert_eq!(found.len(), expected);
    }
}
