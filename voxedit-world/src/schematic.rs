//! Detached copies of a selected region.
//!
//! A schematic is an ordinary memory-backed [`Dimension`] whose origin is the
//! selection's minimum corner. Copies within one dimension go through one so
//! source and destination never alias.

use crate::copy::{CopyOptions, CopyReport, LightUpdate, copy_blocks};
use crate::dimension::{Dimension, DimensionConfig};
use crate::error::Result;
use crate::geometry::Vector;
use crate::progress::{NoProgress, Progress};
use crate::selection::{Selection, TranslatedSelection};

/// Copy the selected cells, entities and biomes of `dim` into a new memory
/// dimension translated so the selection starts at (0, 0, 0).
pub fn extract_schematic(dim: &mut Dimension, selection: &dyn Selection) -> Result<Dimension> {
    let bounds = selection.bounds();
    let config = DimensionConfig {
        name: format!("schematic of {}", dim.name()),
        min_y: 0,
        max_y: bounds.height().max(1),
        cache_capacity: bounds.chunk_count().max(1),
        ..Default::default()
    };
    let mut schematic = Dimension::with_config(config, dim.blocktypes_arc());
    let options = CopyOptions {
        biomes: true,
        update_lights: LightUpdate::None,
        ..CopyOptions::overwrite()
    };
    let report = copy_blocks(&mut schematic, dim, selection, Vector::new(0, 0, 0), &options, &mut NoProgress)?;
    log::debug!(
        "Extracted {} blocks and {} entities from {}",
        report.blocks_copied,
        report.entities_copied,
        bounds
    );
    Ok(schematic)
}

/// Copy a region of `dim` onto another place in the same dimension. The
/// source is read completely before anything is written.
pub fn copy_within(
    dim: &mut Dimension,
    selection: &dyn Selection,
    dest_point: Vector<i32>,
    options: &CopyOptions,
    progress: &mut dyn Progress,
) -> Result<CopyReport> {
    let mut schematic = extract_schematic(dim, selection)?;
    let moved = TranslatedSelection::new(selection, -selection.bounds().origin);
    copy_blocks(dim, &mut schematic, &moved, dest_point, options, progress)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::blocktypes::BlockTypeSet;
    use crate::geometry::BoundingBox;

    fn dim() -> Dimension {
        Dimension::memory(Arc::new(BlockTypeSet::classic()))
    }

    #[test]
    fn test_extract_moves_to_origin() {
        let mut d = dim();
        d.set_block_at(100, 64, -40, 1, 0, true).unwrap();
        d.set_block_at(103, 66, -38, 35, 14, true).unwrap();
        let sel = BoundingBox::from_min_max(Vector::new(100, 64, -40), Vector::new(104, 67, -37));
        let mut schematic = extract_schematic(&mut d, &sel).unwrap();
        assert_eq!(schematic.bounds().height(), 3);
        assert_eq!(schematic.block_at(0, 0, 0).unwrap(), (1, 0));
        assert_eq!(schematic.block_at(3, 2, 2).unwrap(), (35, 14));
    }

    #[test]
    fn test_overlapping_copy_within() {
        let mut d = dim();
        for x in 0..4 {
            d.set_block_at(x, 10, 0, 1 + x as u16, 0, true).unwrap();
        }
        let sel = BoundingBox::new(Vector::new(0, 10, 0), Vector::new(4, 1, 1));
        let report = copy_within(&mut d, &sel, Vector::new(2, 10, 0), &CopyOptions::overwrite(), &mut NoProgress).unwrap();
        assert_eq!(report.blocks_copied, 4);
        let row: Vec<u16> = (0..6).map(|x| d.block_at(x, 10, 0).unwrap().0).collect();
        assert_eq!(row, vec![1, 2, 1, 2, 3, 4]);
    }
}
