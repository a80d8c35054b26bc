//! Copy a selected region between dimensions, converting block ids between
//! palettes.
//!
//! The region moves by a constant offset, `dest_point - selection origin`.
//! Source sections are masked by the selection and by a block type filter,
//! then written into every destination section the shifted source section
//! overlaps. Biomes, entities and tile entities follow the copied cells.

use std::time::Instant;

use crate::accessor::{BlockWrites, Coords, SetOptions, set_blocks};
use crate::blocktypes::{AIR_ID, BlockType};
use crate::chunk::Chunk;
use crate::convert::BlockConverter;
use crate::dimension::Dimension;
use crate::error::Result;
use crate::geometry::{BoundingBox, Vector};
use crate::lighting::{RelightReport, update_lights_by_coord};
use crate::mask::Mask;
use crate::progress::Progress;
use crate::section::{SECTION_AREA, SECTION_EDGE, SECTION_SHIFT, Section, section_index};
use crate::selection::Selection;

/// When light is recomputed for copied cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LightUpdate {
    /// Leave light values as they are.
    None,
    /// Collect every changed cell and relight them once after the copy.
    Deferred,
    /// Relight after each destination section is written.
    Immediate,
}

#[derive(Clone, Debug)]
pub struct CopyOptions {
    /// Copy only these source block ids. Other cells are masked out.
    pub blocks_to_copy: Option<Vec<u16>>,
    pub entities: bool,
    pub biomes: bool,
    /// Allocate destination chunks and sections that do not exist.
    pub create: bool,
    pub update_lights: LightUpdate,
    /// Destination block for source blocks the destination palette lacks.
    /// Without it they become air.
    pub replace_unknown_with: Option<BlockType>,
    /// Write source air over destination blocks.
    pub copy_air: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            blocks_to_copy: None,
            entities: true,
            biomes: false,
            create: false,
            update_lights: LightUpdate::Deferred,
            replace_unknown_with: None,
            copy_air: false,
        }
    }
}

impl CopyOptions {
    /// Copies air and allocates missing destination chunks, so the
    /// destination ends up as an exact image of the selection.
    pub fn overwrite() -> Self {
        Self { create: true, copy_air: true, ..Default::default() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CopyReport {
    pub chunks: usize,
    pub sections_copied: usize,
    pub blocks_copied: usize,
    pub entities_seen: usize,
    pub entities_copied: usize,
    pub tile_entities_copied: usize,
    /// Source (id, meta) keys with no destination equivalent.
    pub unknown_blocks: Vec<(u16, u8)>,
    /// Cells of unknown source blocks left alone because they converted to
    /// air and air is not copied.
    pub unknown_skipped: usize,
    pub failed_chunks: usize,
    pub cancelled: bool,
    pub relight: RelightReport,
}

/// Copy the cells of `selection` in `source` so that the selection's origin
/// lands on `dest_point` in `dest`.
pub fn copy_blocks(
    dest: &mut Dimension,
    source: &mut Dimension,
    selection: &dyn Selection,
    dest_point: Vector<i32>,
    options: &CopyOptions,
    progress: &mut dyn Progress,
) -> Result<CopyReport> {
    let start = Instant::now();
    let offset = dest_point - selection.bounds().origin;
    let mut converter = BlockConverter::between(source.blocktypes(), dest.blocktypes(), options.replace_unknown_with.as_ref());
    let dest_types = dest.blocktypes_arc();

    let mut report = CopyReport::default();
    let mut deferred: Vec<Vec<Vector<i32>>> = Vec::new();
    let positions = selection.chunk_positions();
    let total = positions.len();

    log::info!(
        "Copying {} from {} to {} at {} ({} chunks)",
        selection.bounds(),
        source.name(),
        dest.name(),
        dest_point,
        total
    );

    for (i, (cx, cz)) in positions.into_iter().enumerate() {
        if progress.is_cancelled() {
            log::info!("Copy cancelled after {} of {} chunks", i, total);
            report.cancelled = true;
            break;
        }
        progress.update(i, total, "Copying");

        let src_chunk = match source.try_chunk(cx, cz) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => continue,
            Err(e) if e.is_recoverable() => {
                log::warn!("Skipping source chunk ({}, {}): {}", cx, cz, e);
                source.metrics().record_chunk_failure();
                report.failed_chunks += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        report.chunks += 1;
        let mut columns = vec![false; SECTION_AREA];

        for cy in selection.section_positions(cx, cz) {
            let Some(selected) = selection.section_mask(cx, cy, cz) else {
                continue;
            };
            let air_section;
            let src_section: &Section = match src_chunk.section(cy) {
                Some(section) => section,
                None => {
                    air_section = Section::new(cy);
                    &air_section
                }
            };

            let mask = Mask::from_fn(selected.size(), |x, y, z| {
                if !selected.get(x, y, z) {
                    return false;
                }
                let id = src_section.block(x as usize, y as usize, z as usize);
                match &options.blocks_to_copy {
                    Some(ids) => ids.contains(&id),
                    None => options.copy_air || id != AIR_ID,
                }
            });
            if !mask.any() {
                continue;
            }
            if options.biomes {
                for (c, set) in columns.iter_mut().zip(mask.columns()) {
                    *c |= set;
                }
            }

            let src_box = BoundingBox::section(cx, cy, cz);
            let placement = Placement { src_section, src_box, mask: &mask, offset, copy_air: options.copy_air };
            let mut changed = Vec::new();
            let dest_box = src_box.translate(offset).intersect(&dest.bounds());
            for dcy in dest_box.mincy()..dest_box.maxcy() {
                for dcz in dest_box.mincz()..dest_box.maxcz() {
                    for dcx in dest_box.mincx()..dest_box.maxcx() {
                        let dsec_box = BoundingBox::section(dcx, dcy, dcz);
                        let overlap = dest_box.intersect(&dsec_box);
                        if overlap.is_empty() {
                            continue;
                        }
                        let mut lighting = Vec::new();
                        let written =
                            placement.write(dest, &mut converter, (dcx, dcy, dcz), &overlap, options.create, &mut lighting)?;
                        report.unknown_skipped += written.unknown_skipped;
                        if written.blocks == 0 {
                            continue;
                        }
                        report.blocks_copied += written.blocks;
                        if lighting.is_empty() {
                            continue;
                        }
                        match options.update_lights {
                            LightUpdate::Immediate => {
                                report.relight.absorb(update_lights_by_coord(dest, &lighting)?);
                            }
                            LightUpdate::Deferred => changed.extend(lighting),
                            LightUpdate::None => {
                                dest.update_heights(lighting.iter().map(|p| (p.x, p.z)))?;
                            }
                        }
                    }
                }
            }
            report.sections_copied += 1;
            if options.update_lights == LightUpdate::Deferred && !changed.is_empty() {
                deferred.push(changed);
            }
        }

        if options.biomes && columns.iter().any(|&c| c) {
            copy_biome_columns(dest, src_chunk.biomes.as_slice(), (cx, cz), &columns, offset, options.create)?;
        }

        // entities are matched against the untranslated selection
        if options.entities {
            for entity in &src_chunk.entities {
                report.entities_seen += 1;
                let p = entity.position.floor();
                if !selection.contains(p.x, p.y, p.z) {
                    continue;
                }
                let moved = entity.translated(offset);
                let c = moved.position.chunk_pos();
                if let Some(chunk) = dest_chunk(dest, c.x, c.z, options.create)? {
                    chunk.add_entity(moved);
                    report.entities_copied += 1;
                }
            }
        }
        for tile_entity in &src_chunk.tile_entities {
            let p = tile_entity.position;
            if !selection.contains(p.x, p.y, p.z) {
                continue;
            }
            let moved = tile_entity.translated(offset);
            let c = moved.position.chunk_pos();
            if let Some(chunk) = dest_chunk(dest, c.x, c.z, options.create)? {
                chunk.add_tile_entity(moved);
                report.tile_entities_copied += 1;
            }
        }
    }

    // cells already written are relit even when the copy was cancelled
    if !deferred.is_empty() {
        let batches = deferred.len();
        for (i, cells) in deferred.iter().enumerate() {
            progress.update(i, batches, "Relighting");
            report.relight.absorb(update_lights_by_coord(dest, cells)?);
        }
    }
    progress.update(total, total, "Copying");

    report.unknown_blocks = converter.unknown().iter().copied().collect();
    dest.metrics().record_blocks_copied(report.blocks_copied);
    dest.metrics().record_entities_copied(report.entities_copied, report.tile_entities_copied);
    log::info!(
        "Copied {} blocks, {} of {} entities, {} tile entities in {:?}",
        report.blocks_copied,
        report.entities_copied,
        report.entities_seen,
        report.tile_entities_copied,
        start.elapsed()
    );
    if !report.unknown_blocks.is_empty() {
        log::warn!("{} source block types had no match in {}", report.unknown_blocks.len(), dest_types.name());
    }
    if report.unknown_skipped > 0 {
        log::warn!("Left {} destination blocks in place of unknown source blocks", report.unknown_skipped);
    }
    Ok(report)
}

fn dest_chunk(dest: &mut Dimension, cx: i32, cz: i32, create: bool) -> Result<Option<&mut Chunk>> {
    match dest.get_chunk(cx, cz, create) {
        Ok(chunk) => Ok(Some(chunk)),
        Err(e) if e.is_chunk_not_present() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write the selected biome columns of one source chunk in a single batch.
fn copy_biome_columns(
    dest: &mut Dimension,
    biomes: &[u8],
    (cx, cz): (i32, i32),
    columns: &[bool],
    offset: Vector<i32>,
    create: bool,
) -> Result<()> {
    let mut xs = Vec::new();
    let mut zs = Vec::new();
    let mut values = Vec::new();
    for (i, _) in columns.iter().enumerate().filter(|&(_, &set)| set) {
        let (lx, lz) = ((i % SECTION_EDGE) as i32, (i / SECTION_EDGE) as i32);
        xs.push((cx << SECTION_SHIFT) + lx + offset.x);
        zs.push((cz << SECTION_SHIFT) + lz + offset.z);
        values.push(biomes[i]);
    }
    // biome writes ignore y; any in-bounds y works
    let y = dest.bounds().miny();
    let coords = Coords::broadcast(&xs, &[y], &zs)?;
    let writes = BlockWrites { biomes: Some(values), ..Default::default() };
    set_blocks(dest, &coords, &writes, SetOptions { update_lights: false, create })?;
    Ok(())
}

/// A masked source section and where it lands.
struct Placement<'a> {
    src_section: &'a Section,
    src_box: BoundingBox,
    mask: &'a Mask,
    offset: Vector<i32>,
    copy_air: bool,
}

#[derive(Default)]
struct Written {
    blocks: usize,
    unknown_skipped: usize,
}

impl Placement<'_> {
    /// Copy the masked cells that fall inside `overlap`, a world-space box
    /// within destination section `dsec`. Cells whose opacity or brightness
    /// changed are pushed onto `lighting`.
    fn write(
        &self,
        dest: &mut Dimension,
        converter: &mut BlockConverter,
        (dcx, dcy, dcz): (i32, i32, i32),
        overlap: &BoundingBox,
        create: bool,
        lighting: &mut Vec<Vector<i32>>,
    ) -> Result<Written> {
        let dsec_origin = BoundingBox::section(dcx, dcy, dcz).origin;
        let mut written = Written::default();
        let mut cells = Vec::new();
        for p in overlap.positions() {
            let s = p - self.offset - self.src_box.origin;
            if !self.mask.get(s.x, s.y, s.z) {
                continue;
            }
            let i = section_index(s.x as usize, s.y as usize, s.z as usize);
            let src_id = self.src_section.blocks[i];
            let (id, meta) = converter.convert(src_id, self.src_section.data[i]);
            if id == AIR_ID && src_id != AIR_ID && !self.copy_air {
                written.unknown_skipped += 1;
                continue;
            }
            let d = p - dsec_origin;
            cells.push((section_index(d.x as usize, d.y as usize, d.z as usize), p, id, meta));
        }
        if cells.is_empty() {
            return Ok(written);
        }

        let blocktypes = dest.blocktypes_arc();
        let Some(chunk) = dest_chunk(dest, dcx, dcz, create)? else {
            return Ok(written);
        };
        let section = if chunk.section(dcy).is_some() {
            chunk.section_mut(dcy)
        } else if cells.iter().all(|&(_, _, id, _)| id == AIR_ID) {
            // air into an unallocated section changes nothing
            written.blocks = cells.len();
            return Ok(written);
        } else if create {
            Some(chunk.get_or_create_section(dcy))
        } else {
            None
        };
        let Some(section) = section else {
            return Ok(written);
        };

        for &(i, p, id, meta) in &cells {
            let old = section.blocks[i];
            section.blocks[i] = id;
            section.data[i] = meta;
            if blocktypes.lighting_differs(old, id) {
                lighting.push(p);
            }
        }
        written.blocks = cells.len();
        Ok(written)
    }
}
