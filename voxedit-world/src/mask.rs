//! Dense 3D boolean masks, laid out Y outermost then Z then X like sections.

use crate::geometry::Vector;
use crate::section::SECTION_EDGE;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    size: Vector<i32>,
    cells: Vec<bool>,
}

impl Mask {
    /// All false.
    pub fn new(size: Vector<i32>) -> Self {
        let size = size.map(|c| c.max(0));
        Self { size, cells: vec![false; (size.x * size.y * size.z) as usize] }
    }

    pub fn full(size: Vector<i32>) -> Self {
        let mut mask = Self::new(size);
        mask.cells.fill(true);
        mask
    }

    /// A 16x16x16 mask.
    pub fn section() -> Self {
        let edge = SECTION_EDGE as i32;
        Self::new(Vector::new(edge, edge, edge))
    }

    pub fn from_fn(size: Vector<i32>, mut f: impl FnMut(i32, i32, i32) -> bool) -> Self {
        let mut mask = Self::new(size);
        for y in 0..mask.size.y {
            for z in 0..mask.size.z {
                for x in 0..mask.size.x {
                    let i = mask.index(x, y, z);
                    mask.cells[i] = f(x, y, z);
                }
            }
        }
        mask
    }

    pub fn size(&self) -> Vector<i32> {
        self.size
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    #[inline]
    fn index(&self, x: i32, y: i32, z: i32) -> usize {
        debug_assert!(self.in_range(x, y, z), "({}, {}, {}) outside mask of size {}", x, y, z, self.size);
        ((y * self.size.z + z) * self.size.x + x) as usize
    }

    fn in_range(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0 && y >= 0 && z >= 0 && x < self.size.x && y < self.size.y && z < self.size.z
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> bool {
        self.in_range(x, y, z) && self.cells[self.index(x, y, z)]
    }

    pub fn set(&mut self, x: i32, y: i32, z: i32, value: bool) {
        let i = self.index(x, y, z);
        self.cells[i] = value;
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn any(&self) -> bool {
        self.cells.iter().any(|&c| c)
    }

    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Local coordinates of every set cell, in storage order.
    pub fn positions(&self) -> impl Iterator<Item = Vector<i32>> + '_ {
        let (sx, sz) = (self.size.x, self.size.z);
        self.cells.iter().enumerate().filter(|(_, c)| **c).map(move |(i, _)| {
            let i = i as i32;
            Vector::new(i % sx, i / (sx * sz), (i / sx) % sz)
        })
    }

    fn zip_with(&mut self, other: &Mask, f: impl Fn(bool, bool) -> bool) {
        assert_eq!(self.size, other.size, "mask sizes differ");
        for (a, &b) in self.cells.iter_mut().zip(&other.cells) {
            *a = f(*a, b);
        }
    }

    pub fn and(&mut self, other: &Mask) {
        self.zip_with(other, |a, b| a && b);
    }

    pub fn or(&mut self, other: &Mask) {
        self.zip_with(other, |a, b| a || b);
    }

    pub fn and_not(&mut self, other: &Mask) {
        self.zip_with(other, |a, b| a && !b);
    }

    /// The sub-mask starting at `offset` with `size`. Cells outside this mask
    /// read as false.
    pub fn crop(&self, offset: Vector<i32>, size: Vector<i32>) -> Mask {
        Mask::from_fn(size, |x, y, z| self.get(x + offset.x, y + offset.y, z + offset.z))
    }

    /// Set cells that have at least one unset face neighbour. Cells on the
    /// border count their outside neighbours as unset.
    pub fn shell(&self) -> Mask {
        const FACES: [(i32, i32, i32); 6] = [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)];
        Mask::from_fn(self.size, |x, y, z| {
            self.get(x, y, z) && FACES.iter().any(|&(dx, dy, dz)| !self.get(x + dx, y + dy, z + dz))
        })
    }

    /// Project onto the XZ plane: a column is set when any cell in it is.
    pub fn columns(&self) -> Vec<bool> {
        let mut out = vec![false; (self.size.x * self.size.z) as usize];
        for p in self.positions() {
            out[(p.z * self.size.x + p.x) as usize] = true;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_round_trip() {
        let mut m = Mask::new(Vector::new(3, 4, 5));
        m.set(2, 3, 4, true);
        m.set(0, 1, 2, true);
        let p: Vec<_> = m.positions().collect();
        assert_eq!(p, vec![Vector::new(0, 1, 2), Vector::new(2, 3, 4)]);
        assert_eq!(m.count(), 2);
    }

    #[test]
    fn test_shell_of_cube() {
        let m = Mask::full(Vector::new(3, 3, 3));
        let shell = m.shell();
        assert_eq!(shell.count(), 26);
        assert!(!shell.get(1, 1, 1));
    }

    #[test]
    fn test_crop_and_boolean_ops() {
        let a = Mask::from_fn(Vector::new(4, 4, 4), |x, _, _| x < 2);
        let b = Mask::from_fn(Vector::new(4, 4, 4), |_, y, _| y < 2);
        let mut both = a.clone();
        both.and(&b);
        assert_eq!(both.count(), 16);
        let mut either = a.clone();
        either.or(&b);
        assert_eq!(either.count(), 48);
        let mut only_a = a.clone();
        only_a.and_not(&b);
        assert_eq!(only_a.count(), 16);

        let cropped = a.crop(Vector::new(1, 0, 0), Vector::new(2, 1, 1));
        assert_eq!(cropped.cells(), &[true, false]);
        // past the edge reads false
        assert!(!a.crop(Vector::new(3, 3, 3), Vector::new(2, 2, 2)).get(1, 1, 1));
    }

    #[test]
    fn test_columns() {
        let mut m = Mask::new(Vector::new(2, 3, 2));
        m.set(1, 2, 0, true);
        assert_eq!(m.columns(), vec![false, true, false, false]);
    }
}
