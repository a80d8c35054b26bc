use std::collections::HashSet;
use std::sync::Arc;

use voxedit_world::{
    BlockTypeSet, BlockWrites, BoundingBox, Channel, CopyOptions, Coords, Dimension, FillOptions, LightKind,
    LightUpdate, NoProgress, Progress, Replacement, Selection, SetOptions, Shape, ShapedSelection, Vector,
    copy_blocks, fill_blocks, get_blocks, replace_blocks, set_blocks,
};

fn classic() -> Arc<BlockTypeSet> {
    Arc::new(BlockTypeSet::classic())
}

fn renumbered() -> Arc<BlockTypeSet> {
    let json = r#"[
        { "id": 0, "internal_name": "minecraft:air" },
        { "id": 7, "internal_name": "minecraft:stone", "opacity": 15 },
        { "id": 8, "internal_name": "minecraft:wool", "opacity": 15 },
        { "id": 9, "internal_name": "minecraft:sponge", "opacity": 15 }
    ]"#;
    Arc::new(BlockTypeSet::from_json("renumbered", json).unwrap())
}

fn selected_cells(sel: &dyn Selection) -> HashSet<Vector<i32>> {
    let mut cells = HashSet::new();
    for (cx, cz) in sel.chunk_positions() {
        for cy in sel.section_positions(cx, cz) {
            if let Some(mask) = sel.section_mask(cx, cy, cz) {
                let origin = Vector::new(cx << 4, cy << 4, cz << 4);
                cells.extend(mask.positions().map(|p| p + origin));
            }
        }
    }
    cells
}

fn read_blocks(dim: &mut Dimension, points: &[Vector<i32>]) -> Vec<u16> {
    let values = get_blocks(dim, &Coords::from_points(points), &[Channel::Blocks]).unwrap();
    values.blocks.unwrap()
}

/// Lets a fixed number of chunks start, then cancels.
struct StopAfter {
    chunks: usize,
    started: usize,
}

impl StopAfter {
    fn new(chunks: usize) -> Self {
        Self { chunks, started: 0 }
    }
}

impl Progress for StopAfter {
    fn update(&mut self, _done: usize, _total: usize, _status: &str) {
        self.started += 1;
    }

    fn is_cancelled(&self) -> bool {
        self.started >= self.chunks
    }
}

fn read_light(dim: &mut Dimension, points: &[Vector<i32>]) -> (Vec<u8>, Vec<u8>) {
    let values = get_blocks(dim, &Coords::from_points(points), &[Channel::BlockLight, Channel::SkyLight]).unwrap();
    (values.block_light.unwrap(), values.sky_light.unwrap())
}

/// The same blocks written into fresh chunks and lit in one pass.
fn lit_from_scratch(chunks: &[(i32, i32)], blocks: &[(Vector<i32>, u16)]) -> Dimension {
    let mut dim = Dimension::memory(classic());
    for &(cx, cz) in chunks {
        dim.create_chunk(cx, cz).unwrap();
    }
    let points: Vec<Vector<i32>> = blocks.iter().map(|&(p, _)| p).collect();
    let writes = BlockWrites { blocks: Some(blocks.iter().map(|&(_, id)| id).collect()), ..Default::default() };
    set_blocks(&mut dim, &Coords::from_points(&points), &writes, SetOptions { update_lights: true, create: true }).unwrap();
    dim
}

fn assert_same_light(got: &mut Dimension, expected: &mut Dimension, region: &[Vector<i32>], what: &str) {
    let (got_block, got_sky) = read_light(got, region);
    let (want_block, want_sky) = read_light(expected, region);
    for (i, p) in region.iter().enumerate() {
        assert_eq!(got_block[i], want_block[i], "{}: block light at {}", what, p);
        assert_eq!(got_sky[i], want_sky[i], "{}: sky light at {}", what, p);
    }
}

/// Stone, cobblestone, wool and air in a fixed pattern.
fn pattern(p: Vector<i32>) -> u16 {
    [0, 1, 4, 35][((p.x * 7 + p.y * 3 + p.z).rem_euclid(4)) as usize]
}

fn patterned_source(bounds: &BoundingBox) -> Dimension {
    let mut src = Dimension::memory(classic());
    let points: Vec<Vector<i32>> = bounds.positions().collect();
    let writes = BlockWrites { blocks: Some(points.iter().map(|&p| pattern(p)).collect()), ..Default::default() };
    set_blocks(&mut src, &Coords::from_points(&points), &writes, SetOptions { update_lights: false, create: true }).unwrap();
    src
}

#[test]
fn fill_is_idempotent() {
    let mut dim = Dimension::memory(classic());
    for cx in 0..=1 {
        for cz in 0..=1 {
            dim.create_chunk(cx, cz).unwrap();
        }
    }
    let bounds = BoundingBox::new(Vector::new(6, 20, 6), Vector::new(13, 9, 11));
    let sel = ShapedSelection::new(bounds, Shape::Diamond);
    let points: Vec<Vector<i32>> = bounds.expand(2).positions().collect();
    let coords = Coords::from_points(&points);

    let first = fill_blocks(&mut dim, &sel, 4, 0, FillOptions::default(), &mut NoProgress).unwrap();
    assert!(first.blocks_changed > 0);
    let before = get_blocks(&mut dim, &coords, &Channel::ALL).unwrap();

    let second = fill_blocks(&mut dim, &sel, 4, 0, FillOptions::default(), &mut NoProgress).unwrap();
    assert_eq!(second.blocks_changed, 0);
    let after = get_blocks(&mut dim, &coords, &Channel::ALL).unwrap();
    assert_eq!(before, after);
}

#[test]
fn copy_matches_selection_for_every_shape() {
    let bounds = BoundingBox::new(Vector::new(5, 5, 5), Vector::new(9, 7, 11));
    let offset = Vector::new(40, 20, -30);
    let mut selections: Vec<(String, Box<dyn Selection>)> = Shape::ALL
        .iter()
        .map(|&shape| (shape.name().to_string(), Box::new(ShapedSelection::new(bounds, shape)) as Box<dyn Selection>))
        .collect();
    selections.push(("hollow sphere".into(), Box::new(ShapedSelection::new(bounds, Shape::Sphere).hollow(true))));
    selections.push(("sparse cylinder".into(), Box::new(ShapedSelection::new(bounds, Shape::Cylinder).chance(50.0, 7))));

    let points: Vec<Vector<i32>> = bounds.positions().collect();
    let moved: Vec<Vector<i32>> = points.iter().map(|&p| p + offset).collect();

    for (name, sel) in &selections {
        let selected = selected_cells(sel.as_ref());
        assert!(!selected.is_empty(), "{}", name);
        let mut src = patterned_source(&bounds);

        // air is copied: unselected cells stay empty
        let mut dst = Dimension::memory(classic());
        let options = CopyOptions { update_lights: LightUpdate::None, ..CopyOptions::overwrite() };
        copy_blocks(&mut dst, &mut src, sel.as_ref(), bounds.origin + offset, &options, &mut NoProgress).unwrap();
        let got = read_blocks(&mut dst, &moved);
        for (i, &p) in points.iter().enumerate() {
            let expected = if selected.contains(&p) { pattern(p) } else { 0 };
            assert_eq!(got[i], expected, "{} at {}", name, p);
        }

        // air is not copied: glass shows through source air and outside the shape
        let mut dst = Dimension::memory(classic());
        let glass = FillOptions { update_lights: false, create: true };
        fill_blocks(&mut dst, &bounds.translate(offset), 20, 0, glass, &mut NoProgress).unwrap();
        let options = CopyOptions { copy_air: false, update_lights: LightUpdate::None, ..CopyOptions::overwrite() };
        copy_blocks(&mut dst, &mut src, sel.as_ref(), bounds.origin + offset, &options, &mut NoProgress).unwrap();
        let got = read_blocks(&mut dst, &moved);
        for (i, &p) in points.iter().enumerate() {
            let expected = match pattern(p) {
                id if id != 0 && selected.contains(&p) => id,
                _ => 20,
            };
            assert_eq!(got[i], expected, "{} without air at {}", name, p);
        }
    }
}

#[test]
fn copy_converts_between_palettes() {
    let mut src = Dimension::memory(classic());
    src.set_block_at(0, 0, 0, 1, 0, true).unwrap();
    src.set_block_at(1, 0, 0, 35, 0, true).unwrap();
    src.set_block_at(2, 0, 0, 89, 0, true).unwrap();
    let sel = BoundingBox::new(Vector::new(0, 0, 0), Vector::new(3, 1, 1));
    let row: Vec<Vector<i32>> = (0..3).map(|x| Vector::new(x, 0, 0)).collect();

    let mut dst = Dimension::memory(renumbered());
    let report = copy_blocks(&mut dst, &mut src, &sel, Vector::new(0, 0, 0), &CopyOptions::overwrite(), &mut NoProgress).unwrap();
    assert_eq!(read_blocks(&mut dst, &row), vec![7, 8, 0]);
    assert_eq!(report.unknown_blocks, vec![(89, 0)]);

    // without copy_air, unknown blocks leave the destination alone
    let mut dst = Dimension::memory(renumbered());
    dst.set_block_at(2, 0, 0, 7, 0, true).unwrap();
    let options = CopyOptions { create: true, ..Default::default() };
    let report = copy_blocks(&mut dst, &mut src, &sel, Vector::new(0, 0, 0), &options, &mut NoProgress).unwrap();
    assert_eq!(read_blocks(&mut dst, &row), vec![7, 8, 7]);
    assert_eq!(report.unknown_skipped, 1);

    let sponge = dst.blocktypes().by_name("sponge").unwrap().clone();
    let mut dst = Dimension::memory(renumbered());
    let options = CopyOptions { replace_unknown_with: Some(sponge), ..CopyOptions::overwrite() };
    copy_blocks(&mut dst, &mut src, &sel, Vector::new(0, 0, 0), &options, &mut NoProgress).unwrap();
    assert_eq!(read_blocks(&mut dst, &row), vec![7, 8, 9]);
}

#[test]
fn sphere_fill_darkens_and_air_fill_restores_sky() {
    let mut dim = Dimension::memory(classic());
    for cx in 5..=6 {
        for cz in 5..=6 {
            dim.create_chunk(cx, cz).unwrap();
        }
    }
    let bounds = BoundingBox::new(Vector::new(95, 59, 95), Vector::new(11, 11, 11));
    let sphere = ShapedSelection::new(bounds, Shape::Sphere);

    fill_blocks(&mut dim, &sphere, 1, 0, FillOptions::default(), &mut NoProgress).unwrap();
    assert_eq!(dim.block_at(100, 64, 100).unwrap(), (1, 0));
    assert_eq!(dim.light_at(LightKind::Sky, 100, 64, 100).unwrap(), Some(0));
    assert_eq!(dim.light_at(LightKind::Block, 100, 64, 100).unwrap(), Some(0));
    // the corners of the box lie outside the sphere
    assert_eq!(dim.block_at(95, 59, 95).unwrap(), (0, 0));

    fill_blocks(&mut dim, &sphere, 0, 0, FillOptions::default(), &mut NoProgress).unwrap();
    assert_eq!(dim.block_at(100, 64, 100).unwrap(), (0, 0));
    assert_eq!(dim.light_at(LightKind::Sky, 100, 64, 100).unwrap(), Some(15));
}

#[test]
fn cancelled_replace_leaves_filled_sections_lit() {
    let chunks = [(0, 0), (0, 1), (1, 0), (1, 1)];
    let mut dim = Dimension::memory(classic());
    for &(cx, cz) in &chunks {
        dim.create_chunk(cx, cz).unwrap();
    }
    let floor = BoundingBox::new(Vector::new(0, 10, 0), Vector::new(32, 1, 32));
    fill_blocks(&mut dim, &floor, 1, 0, FillOptions::default(), &mut NoProgress).unwrap();

    let table = Replacement::Table(vec![(vec![(1, 0)], (89, 0))]);
    let report = replace_blocks(&mut dim, &floor, &table, FillOptions::default(), &mut StopAfter::new(2)).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.blocks_changed, 512);

    // chunks run X outermost, so the x < 16 half was replaced
    let blocks: Vec<(Vector<i32>, u16)> = floor.positions().map(|p| (p, if p.x < 16 { 89 } else { 1 })).collect();
    let points: Vec<Vector<i32>> = blocks.iter().map(|&(p, _)| p).collect();
    assert_eq!(read_blocks(&mut dim, &points), blocks.iter().map(|&(_, id)| id).collect::<Vec<_>>());

    let region: Vec<Vector<i32>> = BoundingBox::from_min_max(Vector::new(0, 0, 0), Vector::new(32, 28, 32)).positions().collect();
    let mut expected = lit_from_scratch(&chunks, &blocks);
    assert_same_light(&mut dim, &mut expected, &region, "cancelled replace");
}

#[test]
fn cancelled_copy_leaves_written_sections_lit() {
    let sel = BoundingBox::new(Vector::new(0, 10, 0), Vector::new(48, 1, 1));
    let row: Vec<Vector<i32>> = sel.positions().collect();
    let mut src = Dimension::memory(classic());
    let unlit = SetOptions { update_lights: false, create: true };
    set_blocks(&mut src, &Coords::from_points(&row), &BlockWrites::block(89, 0), unlit).unwrap();

    let copied: Vec<Vector<i32>> = row.iter().copied().filter(|p| p.x < 32).collect();
    let region: Vec<Vector<i32>> = BoundingBox::from_min_max(Vector::new(-2, 0, -2), Vector::new(50, 28, 4)).positions().collect();

    for mode in [LightUpdate::None, LightUpdate::Deferred, LightUpdate::Immediate] {
        let mut dst = Dimension::memory(classic());
        let options = CopyOptions { update_lights: mode, ..CopyOptions::overwrite() };
        let report = copy_blocks(&mut dst, &mut src, &sel, sel.origin, &options, &mut StopAfter::new(2)).unwrap();
        assert!(report.cancelled, "{:?}", mode);
        assert_eq!(report.blocks_copied, 32, "{:?}", mode);
        assert_eq!(read_blocks(&mut dst, &copied), vec![89; 32]);
        assert_eq!(read_blocks(&mut dst, &[Vector::new(40, 10, 0)]), vec![0]);

        if mode == LightUpdate::None {
            assert_eq!(report.relight.requested, 0);
            let (block, _) = read_light(&mut dst, &region);
            assert!(block.iter().all(|&v| v == 0));
            continue;
        }
        assert!(report.relight.requested > 0, "{:?}", mode);
        let blocks: Vec<(Vector<i32>, u16)> = copied.iter().map(|&p| (p, 89)).collect();
        let mut expected = lit_from_scratch(&[], &blocks);
        assert_same_light(&mut dst, &mut expected, &region, &format!("{:?}", mode));
    }
}
