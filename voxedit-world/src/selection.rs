//! Selections: sets of block positions queried chunk by chunk and section by
//! section as boolean masks.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::geometry::{BoundingBox, Vector};
use crate::mask::Mask;
use crate::section::{SECTION_EDGE, SectionCoord};
use crate::shape::{ShapeFn, create_selection_mask};

pub trait Selection {
    /// Smallest box containing every selected cell.
    fn bounds(&self) -> BoundingBox;

    /// Whether a single cell is selected.
    fn contains(&self, x: i32, y: i32, z: i32) -> bool;

    /// 16x16x16 mask of the section at (cx, cy, cz), `None` when nothing in
    /// it is selected.
    fn section_mask(&self, cx: i32, cy: i32, cz: i32) -> Option<Mask>;

    fn chunk_positions(&self) -> Vec<(i32, i32)> {
        self.bounds().chunk_positions()
    }

    /// Section y indices of chunk (cx, cz) that may hold selected cells.
    fn section_positions(&self, cx: i32, cz: i32) -> Vec<i32> {
        let b = self.bounds();
        if b.is_empty() || cx < b.mincx() || cx >= b.maxcx() || cz < b.mincz() || cz >= b.maxcz() {
            return Vec::new();
        }
        b.section_ys().collect()
    }
}

impl<S: Selection + ?Sized> Selection for &S {
    fn bounds(&self) -> BoundingBox {
        (**self).bounds()
    }
    fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        (**self).contains(x, y, z)
    }
    fn section_mask(&self, cx: i32, cy: i32, cz: i32) -> Option<Mask> {
        (**self).section_mask(cx, cy, cz)
    }
    fn chunk_positions(&self) -> Vec<(i32, i32)> {
        (**self).chunk_positions()
    }
    fn section_positions(&self, cx: i32, cz: i32) -> Vec<i32> {
        (**self).section_positions(cx, cz)
    }
}

impl<S: Selection + ?Sized> Selection for Box<S> {
    fn bounds(&self) -> BoundingBox {
        (**self).bounds()
    }
    fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        (**self).contains(x, y, z)
    }
    fn section_mask(&self, cx: i32, cy: i32, cz: i32) -> Option<Mask> {
        (**self).section_mask(cx, cy, cz)
    }
    fn chunk_positions(&self) -> Vec<(i32, i32)> {
        (**self).chunk_positions()
    }
    fn section_positions(&self, cx: i32, cz: i32) -> Vec<i32> {
        (**self).section_positions(cx, cz)
    }
}

/// A plain box selects every cell inside it.
impl Selection for BoundingBox {
    fn bounds(&self) -> BoundingBox {
        *self
    }

    fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        BoundingBox::contains(self, x, y, z)
    }

    fn section_mask(&self, cx: i32, cy: i32, cz: i32) -> Option<Mask> {
        let section = BoundingBox::section(cx, cy, cz);
        let overlap = self.intersect(&section);
        if overlap.is_empty() {
            return None;
        }
        let local = overlap.origin - section.origin;
        let edge = SECTION_EDGE as i32;
        let (lo, hi) = (local, local + overlap.size);
        Some(Mask::from_fn(Vector::new(edge, edge, edge), |x, y, z| {
            x >= lo.x && x < hi.x && y >= lo.y && y < hi.y && z >= lo.z && z < hi.z
        }))
    }
}

/// A brush shape evaluated over a box, optionally hollow and sparse.
pub struct ShapedSelection {
    bounds: BoundingBox,
    shape: Box<dyn ShapeFn + Send + Sync>,
    hollow: bool,
    chance: f64,
    seed: u64,
}

impl ShapedSelection {
    pub fn new(bounds: BoundingBox, shape: impl ShapeFn + Send + Sync + 'static) -> Self {
        Self { bounds, shape: Box::new(shape), hollow: false, chance: 100.0, seed: 0 }
    }

    pub fn hollow(mut self, hollow: bool) -> Self {
        self.hollow = hollow;
        self
    }

    /// Keep each shell cell with probability `chance / 100`. Masks are
    /// reproducible for a given seed.
    pub fn chance(mut self, chance: f64, seed: u64) -> Self {
        self.chance = chance;
        self.seed = seed;
        self
    }

    fn section_rng(&self, cx: i32, cy: i32, cz: i32) -> StdRng {
        let key = (cx as u32 as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ (cy as u32 as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f)
            ^ (cz as u32 as u64).wrapping_mul(0x1656_67b1_9e37_79f9);
        StdRng::seed_from_u64(self.seed ^ key)
    }
}

impl Selection for ShapedSelection {
    fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        if !self.bounds.contains(x, y, z) {
            return false;
        }
        let c = SectionCoord::of(x, y, z);
        self.section_mask(c.cx, c.cy, c.cz)
            .is_some_and(|m| m.get(c.lx as i32, c.ly as i32, c.lz as i32))
    }

    fn section_mask(&self, cx: i32, cy: i32, cz: i32) -> Option<Mask> {
        let section = BoundingBox::section(cx, cy, cz);
        if self.bounds.intersect(&section).is_empty() {
            return None;
        }
        let mut rng = self.section_rng(cx, cy, cz);
        let mask = create_selection_mask(&self.bounds, self.shape.as_ref(), &section, self.chance, self.hollow, &mut rng);
        mask.any().then_some(mask)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Combine {
    Union,
    Intersection,
    Difference,
}

/// Boolean combination of two selections.
pub struct CombinedSelection<A, B> {
    op: Combine,
    left: A,
    right: B,
}

impl<A: Selection, B: Selection> CombinedSelection<A, B> {
    pub fn new(op: Combine, left: A, right: B) -> Self {
        Self { op, left, right }
    }

    pub fn union(left: A, right: B) -> Self {
        Self::new(Combine::Union, left, right)
    }

    pub fn intersection(left: A, right: B) -> Self {
        Self::new(Combine::Intersection, left, right)
    }

    /// Cells of `left` that are not in `right`.
    pub fn difference(left: A, right: B) -> Self {
        Self::new(Combine::Difference, left, right)
    }
}

impl<A: Selection, B: Selection> Selection for CombinedSelection<A, B> {
    fn bounds(&self) -> BoundingBox {
        match self.op {
            Combine::Union => self.left.bounds().union(&self.right.bounds()),
            Combine::Intersection => self.left.bounds().intersect(&self.right.bounds()),
            Combine::Difference => self.left.bounds(),
        }
    }

    fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        let l = self.left.contains(x, y, z);
        match self.op {
            Combine::Union => l || self.right.contains(x, y, z),
            Combine::Intersection => l && self.right.contains(x, y, z),
            Combine::Difference => l && !self.right.contains(x, y, z),
        }
    }

    fn section_mask(&self, cx: i32, cy: i32, cz: i32) -> Option<Mask> {
        let left = self.left.section_mask(cx, cy, cz);
        let right = self.right.section_mask(cx, cy, cz);
        let mask = match (self.op, left, right) {
            (Combine::Union, Some(mut l), Some(r)) => {
                l.or(&r);
                l
            }
            (Combine::Union, l, r) => l.or(r)?,
            (Combine::Intersection, Some(mut l), Some(r)) => {
                l.and(&r);
                l
            }
            (Combine::Intersection, _, _) => return None,
            (Combine::Difference, Some(mut l), Some(r)) => {
                l.and_not(&r);
                l
            }
            (Combine::Difference, l, None) => l?,
            (Combine::Difference, None, _) => return None,
        };
        mask.any().then_some(mask)
    }

    fn chunk_positions(&self) -> Vec<(i32, i32)> {
        match self.op {
            Combine::Union => {
                let mut positions = self.left.chunk_positions();
                positions.extend(self.right.chunk_positions());
                positions.sort_unstable();
                positions.dedup();
                positions
            }
            _ => self.bounds().chunk_positions(),
        }
    }
}

/// Another selection moved by a constant offset.
pub struct TranslatedSelection<S> {
    inner: S,
    offset: Vector<i32>,
}

impl<S: Selection> TranslatedSelection<S> {
    pub fn new(inner: S, offset: Vector<i32>) -> Self {
        Self { inner, offset }
    }

    pub fn offset(&self) -> Vector<i32> {
        self.offset
    }
}

impl<S: Selection> Selection for TranslatedSelection<S> {
    fn bounds(&self) -> BoundingBox {
        self.inner.bounds().translate(self.offset)
    }

    fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        self.inner.contains(x - self.offset.x, y - self.offset.y, z - self.offset.z)
    }

    fn section_mask(&self, cx: i32, cy: i32, cz: i32) -> Option<Mask> {
        let dest = BoundingBox::section(cx, cy, cz);
        let source = dest.translate(-self.offset).intersect(&self.inner.bounds());
        if source.is_empty() {
            return None;
        }
        let edge = SECTION_EDGE as i32;
        let mut out = Mask::new(Vector::new(edge, edge, edge));
        // a shifted section straddles up to eight source sections
        for scy in source.mincy()..source.maxcy() {
            for scz in source.mincz()..source.maxcz() {
                for scx in source.mincx()..source.maxcx() {
                    let Some(mask) = self.inner.section_mask(scx, scy, scz) else {
                        continue;
                    };
                    let src_section = BoundingBox::section(scx, scy, scz);
                    let overlap = src_section.intersect(&source);
                    for p in overlap.positions() {
                        let s = p - src_section.origin;
                        if mask.get(s.x, s.y, s.z) {
                            let d = p + self.offset - dest.origin;
                            out.set(d.x, d.y, d.z, true);
                        }
                    }
                }
            }
        }
        out.any().then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    fn cube(origin: (i32, i32, i32), edge: i32) -> BoundingBox {
        BoundingBox::new(Vector::new(origin.0, origin.1, origin.2), Vector::new(edge, edge, edge))
    }

    fn total(sel: &dyn Selection) -> usize {
        let mut n = 0;
        for (cx, cz) in sel.chunk_positions() {
            for cy in sel.section_positions(cx, cz) {
                n += sel.section_mask(cx, cy, cz).map_or(0, |m| m.count());
            }
        }
        n
    }

    #[test]
    fn test_box_selection_masks() {
        let b = cube((-2, 14, 5), 4);
        assert_eq!(total(&b), 64);
        assert!(b.section_mask(5, 0, 5).is_none());
        let m = b.section_mask(-1, 0, 0).unwrap();
        assert!(m.get(14, 14, 5));
        assert!(!m.get(13, 14, 5));
        assert_eq!(b.section_positions(0, 0), vec![0, 1]);
        assert!(b.section_positions(3, 0).is_empty());
    }

    #[test]
    fn test_shaped_selection_agrees_with_contains() {
        let sel = ShapedSelection::new(cube((10, 10, 10), 9), Shape::Sphere);
        for cy in sel.section_positions(0, 0) {
            let Some(m) = sel.section_mask(0, cy, 0) else { continue };
            for p in BoundingBox::section(0, cy, 0).positions() {
                let l = p - Vector::new(0, cy * 16, 0);
                assert_eq!(m.get(l.x, l.y, l.z), sel.contains(p.x, p.y, p.z));
            }
        }
        assert!(sel.contains(14, 14, 14));
        assert!(!sel.contains(10, 10, 10));
    }

    #[test]
    fn test_shaped_chance_is_stable() {
        let sel = ShapedSelection::new(cube((0, 0, 0), 12), Shape::Sphere).chance(50.0, 99);
        assert_eq!(sel.section_mask(0, 0, 0), sel.section_mask(0, 0, 0));
    }

    #[test]
    fn test_combined() {
        let a = cube((0, 0, 0), 4);
        let b = cube((2, 0, 0), 4);
        assert_eq!(total(&CombinedSelection::union(a, b)), 96);
        assert_eq!(total(&CombinedSelection::intersection(a, b)), 32);
        let diff = CombinedSelection::difference(a, b);
        assert_eq!(total(&diff), 32);
        assert!(diff.contains(1, 0, 0));
        assert!(!diff.contains(2, 0, 0));

        let far = cube((100, 0, 100), 2);
        let union = CombinedSelection::union(a, far);
        assert_eq!(union.chunk_positions(), vec![(0, 0), (6, 6)]);
        assert_eq!(total(&union), 72);
    }

    #[test]
    fn test_translated_straddles_sections() {
        let inner = ShapedSelection::new(cube((0, 0, 0), 7), Shape::Diamond);
        let moved = TranslatedSelection::new(&inner, Vector::new(13, 30, -3));
        assert_eq!(total(&moved), total(&inner));
        for p in moved.bounds().positions() {
            let q = p - moved.offset();
            assert_eq!(moved.contains(p.x, p.y, p.z), inner.contains(q.x, q.y, q.z));
        }
    }
}
