//! Fill and replace blocks inside a selection.

use std::time::Instant;

use crate::blocktypes::{AIR_ID, BlockTypeSet};
use crate::dimension::Dimension;
use crate::error::Result;
use crate::geometry::Vector;
use crate::lighting::{RelightReport, update_lights_by_coord};
use crate::progress::Progress;
use crate::section::{SECTION_SHIFT, Section};
use crate::selection::Selection;

/// What a fill writes into the selected cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Replacement {
    /// Every selected cell becomes this block.
    Fill { id: u16, meta: u8 },
    /// Selected cells holding one of the listed blocks become the paired
    /// block. Other cells are left alone.
    Table(Vec<(Vec<(u16, u8)>, (u16, u8))>),
}

impl Replacement {
    pub fn fill(id: u16, meta: u8) -> Self {
        Replacement::Fill { id, meta }
    }

    /// A fill restricted to cells currently holding one of `only`.
    pub fn fill_only(id: u16, meta: u8, only: Vec<(u16, u8)>) -> Self {
        Replacement::Table(vec![(only, (id, meta))])
    }
}

#[derive(Copy, Clone, Debug)]
pub struct FillOptions {
    pub update_lights: bool,
    /// Allocate missing chunks inside the selection.
    pub create: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self { update_lights: true, create: false }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FillReport {
    pub chunks: usize,
    pub sections_filled: usize,
    pub sections_skipped: usize,
    pub blocks_changed: usize,
    pub failed_chunks: usize,
    pub lighting_affected: bool,
    pub cancelled: bool,
    pub relight: RelightReport,
}

/// Lookup from `(id << 4) | meta` to the replacement block.
struct ReplaceTable {
    entries: Vec<Option<(u16, u8)>>,
}

impl ReplaceTable {
    fn new(pairs: &[(Vec<(u16, u8)>, (u16, u8))], blocktypes: &BlockTypeSet) -> Self {
        let limit = pairs
            .iter()
            .flat_map(|(from, _)| from.iter().map(|&(id, _)| id as usize + 1))
            .max()
            .unwrap_or(0)
            .max(blocktypes.id_limit());
        let mut entries = vec![None; limit << 4];
        for (from, to) in pairs {
            for &(id, meta) in from {
                entries[((id as usize) << 4) | (meta as usize & 0xf)] = Some(*to);
            }
        }
        Self { entries }
    }

    #[inline]
    fn get(&self, id: u16, meta: u8) -> Option<(u16, u8)> {
        self.entries.get(((id as usize) << 4) | (meta as usize & 0xf)).copied().flatten()
    }
}

enum Plan {
    Direct((u16, u8)),
    Table(ReplaceTable),
}

impl Plan {
    #[inline]
    fn apply(&self, id: u16, meta: u8) -> Option<(u16, u8)> {
        match self {
            Plan::Direct(to) => Some(*to),
            Plan::Table(table) => table.get(id, meta),
        }
    }

    /// Whether cells of an unallocated section, which read as air, would
    /// change at all.
    fn touches_air(&self) -> bool {
        matches!(self.apply(AIR_ID, 0), Some(to) if to != (AIR_ID, 0))
    }
}

/// Whether any (old, new) pair changes opacity or brightness.
fn affects_lighting(replacement: &Replacement, blocktypes: &BlockTypeSet) -> bool {
    match replacement {
        // whatever is there now may differ from the target
        Replacement::Fill { .. } => true,
        Replacement::Table(pairs) => pairs
            .iter()
            .any(|(from, to)| from.iter().any(|&(id, _)| blocktypes.lighting_differs(id, to.0))),
    }
}

/// Fill every selected cell with one block.
pub fn fill_blocks(
    dim: &mut Dimension,
    selection: &dyn Selection,
    id: u16,
    meta: u8,
    options: FillOptions,
    progress: &mut dyn Progress,
) -> Result<FillReport> {
    replace_blocks(dim, selection, &Replacement::fill(id, meta), options, progress)
}

pub fn replace_blocks(
    dim: &mut Dimension,
    selection: &dyn Selection,
    replacement: &Replacement,
    options: FillOptions,
    progress: &mut dyn Progress,
) -> Result<FillReport> {
    let start = Instant::now();
    let blocktypes = dim.blocktypes_arc();
    let plan = match replacement {
        Replacement::Fill { id, meta } => Plan::Direct((*id, *meta)),
        Replacement::Table(pairs) => Plan::Table(ReplaceTable::new(pairs, &blocktypes)),
    };

    let mut report = FillReport { lighting_affected: affects_lighting(replacement, &blocktypes), ..Default::default() };
    let relight = options.update_lights && report.lighting_affected;
    let bounds = dim.bounds();
    let positions = selection.chunk_positions();
    let total = positions.len();

    for (i, (cx, cz)) in positions.into_iter().enumerate() {
        if progress.is_cancelled() {
            log::info!("Fill cancelled after {} of {} chunks", i, total);
            report.cancelled = true;
            break;
        }
        progress.update(i, total, "Filling");

        if !dim.chunk_in_bounds(cx, cz) {
            continue;
        }
        if !dim.contains_chunk(cx, cz)? && !(options.create && plan.touches_air()) {
            continue;
        }
        report.chunks += 1;

        for cy in selection.section_positions(cx, cz) {
            let base = Vector::new(cx << SECTION_SHIFT, cy << SECTION_SHIFT, cz << SECTION_SHIFT);
            if base.y < bounds.miny() || base.y >= bounds.maxy() {
                continue;
            }
            let mask = match selection.section_mask(cx, cy, cz) {
                Some(mask) if mask.any() => mask,
                _ => {
                    report.sections_skipped += 1;
                    dim.metrics().record_section_skipped();
                    continue;
                }
            };

            let chunk = match dim.get_chunk(cx, cz, options.create) {
                Ok(chunk) => chunk,
                Err(e) if e.is_recoverable() => {
                    if !e.is_chunk_not_present() {
                        log::warn!("Skipping chunk ({}, {}): {}", cx, cz, e);
                        dim.metrics().record_chunk_failure();
                        report.failed_chunks += 1;
                    }
                    break;
                }
                Err(e) => return Err(e),
            };

            // unallocated sections are air; only allocate when air changes
            let section = if chunk.section(cy).is_some() {
                chunk.section_mut(cy)
            } else if plan.touches_air() {
                Some(chunk.get_or_create_section(cy))
            } else {
                None
            };
            let Some(section) = section else {
                report.sections_skipped += 1;
                dim.metrics().record_section_skipped();
                continue;
            };

            let changed = apply_to_section(section, mask.cells(), &plan, &blocktypes, report.lighting_affected);
            report.sections_filled += 1;
            report.blocks_changed += changed.count;
            dim.metrics().record_section_filled();
            log::debug!("Filled section ({}, {}, {}): {} blocks changed", cx, cy, cz, changed.count);

            if changed.lighting.is_empty() {
                continue;
            }
            let cells: Vec<Vector<i32>> = changed.lighting.iter().map(|&p| p + base).collect();
            if relight {
                report.relight.absorb(update_lights_by_coord(dim, &cells)?);
            } else {
                // keep the height map in step with the blocks
                dim.update_heights(cells.iter().map(|p| (p.x, p.z)))?;
            }
        }
    }
    progress.update(total, total, "Filling");

    log::info!(
        "Filled {} sections ({} skipped, {} blocks changed) in {:?}",
        report.sections_filled,
        report.sections_skipped,
        report.blocks_changed,
        start.elapsed()
    );
    Ok(report)
}

struct SectionChange {
    count: usize,
    /// Section-local cells whose opacity or brightness changed.
    lighting: Vec<Vector<i32>>,
}

fn apply_to_section(
    section: &mut Section,
    mask: &[bool],
    plan: &Plan,
    blocktypes: &BlockTypeSet,
    track_lighting: bool,
) -> SectionChange {
    let mut change = SectionChange { count: 0, lighting: Vec::new() };
    for (i, _) in mask.iter().enumerate().filter(|&(_, &selected)| selected) {
        let (old_id, old_meta) = (section.blocks[i], section.data[i]);
        let Some((id, meta)) = plan.apply(old_id, old_meta) else {
            continue;
        };
        if (id, meta) == (old_id, old_meta) {
            continue;
        }
        section.blocks[i] = id;
        section.data[i] = meta;
        change.count += 1;
        if track_lighting && blocktypes.lighting_differs(old_id, id) {
            let i = i as i32;
            change.lighting.push(Vector::new(i & 0xf, i >> 8, (i >> 4) & 0xf));
        }
    }
    change
}
