//! Points, rays and axis-aligned boxes in world-block space.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use crate::section::{SECTION_EDGE, SECTION_SHIFT};

/// Axis index used by [`Vector::get`] and [`Ray::at_plane`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// An (x, y, z) triple. Used for both points and directions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector<T = i32> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T: Copy> Vector<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, axis: Axis) -> T {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn with(mut self, axis: Axis, value: T) -> Self {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
        self
    }

    pub fn map<U: Copy>(self, f: impl Fn(T) -> U) -> Vector<U> {
        Vector::new(f(self.x), f(self.y), f(self.z))
    }

    fn zip<U: Copy>(self, other: Self, f: impl Fn(T, T) -> U) -> Vector<U> {
        Vector::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }
}

impl<T: Copy + std::ops::Mul<Output = T>> Vector<T> {
    pub fn scale(self, k: T) -> Self {
        self.map(|c| c * k)
    }

    pub fn mul_elem(self, other: Self) -> Self {
        self.zip(other, |a, b| a * b)
    }
}

impl<T: Copy + std::ops::Div<Output = T>> Vector<T> {
    pub fn div_elem(self, other: Self) -> Self {
        self.zip(other, |a, b| a / b)
    }
}

impl<T: Copy + PartialOrd> Vector<T> {
    pub fn min_elem(self, other: Self) -> Self {
        self.zip(other, |a, b| if b < a { b } else { a })
    }

    pub fn max_elem(self, other: Self) -> Self {
        self.zip(other, |a, b| if b > a { b } else { a })
    }
}

impl<T: Copy + Add<Output = T>> Add for Vector<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a + b)
    }
}

impl<T: Copy + Sub<Output = T>> Sub for Vector<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a - b)
    }
}

impl<T: Copy + Neg<Output = T>> Neg for Vector<T> {
    type Output = Self;
    fn neg(self) -> Self {
        self.map(|c| -c)
    }
}

impl<T: fmt::Display> fmt::Display for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl Vector<i32> {
    /// Chunk/section coordinates of this block position.
    pub fn chunk_pos(self) -> Vector<i32> {
        self.map(|c| c >> SECTION_SHIFT)
    }

    pub fn abs(self) -> Self {
        self.map(i32::abs)
    }

    pub fn as_f64(self) -> Vector<f64> {
        self.map(|c| c as f64)
    }

    pub fn length_squared(self) -> i64 {
        let v = self.map(|c| c as i64);
        v.x * v.x + v.y * v.y + v.z * v.z
    }

    pub fn length(self) -> f64 {
        (self.length_squared() as f64).sqrt()
    }
}

impl Vector<f64> {
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 { self } else { self.map(|c| c / len) }
    }

    pub fn floor(self) -> Vector<i32> {
        self.map(|c| c.floor() as i32)
    }

    pub fn abs(self) -> Self {
        self.map(f64::abs)
    }

    pub fn cross(self, other: Self) -> Self {
        Vector::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn chunk_pos(self) -> Vector<i32> {
        self.floor().chunk_pos()
    }
}

/// Origin plus direction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vector<f64>,
    pub direction: Vector<f64>,
}

impl Ray {
    pub fn new(origin: Vector<f64>, direction: Vector<f64>) -> Self {
        Self { origin, direction }
    }

    /// Ray starting at `from` and pointing through `to`, with a unit direction.
    pub fn from_points(from: Vector<f64>, to: Vector<f64>) -> Self {
        Self::new(from, (to - from).normalize())
    }

    pub fn at(&self, t: f64) -> Vector<f64> {
        self.origin + self.direction.scale(t)
    }

    /// Point where the ray crosses the plane `axis == coord`.
    ///
    /// A ray parallel to the plane yields its origin moved onto the plane; a
    /// plane behind the ray yields the origin unchanged.
    pub fn at_plane(&self, axis: Axis, coord: f64) -> Vector<f64> {
        let d = self.direction.get(axis);
        if d == 0.0 {
            return self.origin.with(axis, coord);
        }
        let t = (coord - self.origin.get(axis)) / d;
        if t < 0.0 {
            return self.origin;
        }
        self.at(t).with(axis, coord)
    }
}

/// Axis-aligned box of whole blocks: `origin` inclusive, `origin + size` exclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub origin: Vector<i32>,
    pub size: Vector<i32>,
}

impl BoundingBox {
    pub fn new(origin: Vector<i32>, size: Vector<i32>) -> Self {
        debug_assert!(size.x >= 0 && size.y >= 0 && size.z >= 0, "negative box size {}", size);
        Self { origin, size: size.map(|c| c.max(0)) }
    }

    pub fn from_min_max(minimum: Vector<i32>, maximum: Vector<i32>) -> Self {
        Self::new(minimum, (maximum - minimum).map(|c| c.max(0)))
    }

    /// The 16x16x16 section at section coordinates (cx, cy, cz).
    pub fn section(cx: i32, cy: i32, cz: i32) -> Self {
        Self::new(
            Vector::new(cx << SECTION_SHIFT, cy << SECTION_SHIFT, cz << SECTION_SHIFT),
            Vector::new(SECTION_EDGE as i32, SECTION_EDGE as i32, SECTION_EDGE as i32),
        )
    }

    pub fn minx(&self) -> i32 {
        self.origin.x
    }

    pub fn miny(&self) -> i32 {
        self.origin.y
    }

    pub fn minz(&self) -> i32 {
        self.origin.z
    }

    pub fn maxx(&self) -> i32 {
        self.origin.x + self.size.x
    }

    pub fn maxy(&self) -> i32 {
        self.origin.y + self.size.y
    }

    pub fn maxz(&self) -> i32 {
        self.origin.z + self.size.z
    }

    pub fn width(&self) -> i32 {
        self.size.x
    }

    pub fn height(&self) -> i32 {
        self.size.y
    }

    pub fn length(&self) -> i32 {
        self.size.z
    }

    pub fn maximum(&self) -> Vector<i32> {
        self.origin + self.size
    }

    pub fn center(&self) -> Vector<f64> {
        self.origin.as_f64() + self.size.as_f64().scale(0.5)
    }

    pub fn volume(&self) -> i64 {
        self.size.x as i64 * self.size.y as i64 * self.size.z as i64
    }

    pub fn is_empty(&self) -> bool {
        self.volume() == 0
    }

    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= self.minx() && x < self.maxx()
            && y >= self.miny() && y < self.maxy()
            && z >= self.minz() && z < self.maxz()
    }

    pub fn contains_point(&self, p: Vector<f64>) -> bool {
        let p = p.floor();
        self.contains(p.x, p.y, p.z)
    }

    /// Overlap of the two boxes. Disjoint boxes give a zero-size box.
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        let minimum = self.origin.max_elem(other.origin);
        let maximum = self.maximum().min_elem(other.maximum());
        if maximum.x <= minimum.x || maximum.y <= minimum.y || maximum.z <= minimum.z {
            return BoundingBox::new(minimum, Vector::default());
        }
        BoundingBox::from_min_max(minimum, maximum)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BoundingBox::from_min_max(
            self.origin.min_elem(other.origin),
            self.maximum().max_elem(other.maximum()),
        )
    }

    pub fn expand(&self, n: i32) -> BoundingBox {
        BoundingBox::new(self.origin - Vector::new(n, n, n), self.size + Vector::new(2 * n, 2 * n, 2 * n))
    }

    pub fn translate(&self, offset: Vector<i32>) -> BoundingBox {
        BoundingBox::new(self.origin + offset, self.size)
    }

    /// Every block position, Y outermost then Z then X.
    pub fn positions(&self) -> impl Iterator<Item = Vector<i32>> + use<> {
        let b = *self;
        (b.miny()..b.maxy()).flat_map(move |y| {
            (b.minz()..b.maxz()).flat_map(move |z| (b.minx()..b.maxx()).map(move |x| Vector::new(x, y, z)))
        })
    }

    pub fn mincx(&self) -> i32 {
        self.minx() >> SECTION_SHIFT
    }

    pub fn mincz(&self) -> i32 {
        self.minz() >> SECTION_SHIFT
    }

    pub fn mincy(&self) -> i32 {
        self.miny() >> SECTION_SHIFT
    }

    /// Exclusive upper chunk bound.
    pub fn maxcx(&self) -> i32 {
        ((self.maxx() - 1) >> SECTION_SHIFT) + 1
    }

    pub fn maxcz(&self) -> i32 {
        ((self.maxz() - 1) >> SECTION_SHIFT) + 1
    }

    pub fn maxcy(&self) -> i32 {
        ((self.maxy() - 1) >> SECTION_SHIFT) + 1
    }

    /// Chunk columns touched by this box, X outermost.
    pub fn chunk_positions(&self) -> Vec<(i32, i32)> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        for cx in self.mincx()..self.maxcx() {
            for cz in self.mincz()..self.maxcz() {
                out.push((cx, cz));
            }
        }
        out
    }

    /// Vertical section indices touched by this box.
    pub fn section_ys(&self) -> std::ops::Range<i32> {
        if self.is_empty() {
            return 0..0;
        }
        self.mincy()..self.maxcy()
    }

    pub fn chunk_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.maxcx() - self.mincx()) * (self.maxcz() - self.mincz())) as usize
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundingBox(origin={}, size={})", self.origin, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_ops() {
        let a = Vector::new(1.0, 2.0, 3.0);
        let b = Vector::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vector::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vector::new(3.0, 3.0, 3.0));
        assert_eq!(-a, Vector::new(-1.0, -2.0, -3.0));
        assert_eq!(a.mul_elem(b), Vector::new(4.0, 10.0, 18.0));
        assert_eq!(b.div_elem(Vector::new(2.0, 5.0, 3.0)), Vector::new(2.0, 1.0, 2.0));
        assert_eq!(Vector::new(1.0, 0.0, 0.0).cross(Vector::new(0.0, 1.0, 0.0)), Vector::new(0.0, 0.0, 1.0));
        assert_eq!(Vector::new(3.0, 4.0, 0.0).length(), 5.0);
        assert_eq!(Vector::new(0.0, 0.0, 7.0).normalize(), Vector::new(0.0, 0.0, 1.0));
        assert_eq!(Vector::new(-0.5, 1.5, -2.0).floor(), Vector::new(-1, 1, -2));
    }

    #[test]
    fn test_chunk_pos_negative() {
        assert_eq!(Vector::new(-1, 15, 16).chunk_pos(), Vector::new(-1, 0, 1));
        assert_eq!(Vector::new(-17, -16, 31).chunk_pos(), Vector::new(-2, -1, 1));
    }

    #[test]
    fn test_ray_at_plane() {
        let ray = Ray::from_points(Vector::new(0.0, 10.0, 0.0), Vector::new(0.0, 0.0, 0.0));
        assert_eq!(ray.at_plane(Axis::Y, 4.0), Vector::new(0.0, 4.0, 0.0));
        // plane behind the ray
        assert_eq!(ray.at_plane(Axis::Y, 20.0), ray.origin);
        // parallel to the plane
        assert_eq!(ray.at_plane(Axis::X, 3.0), Vector::new(3.0, 10.0, 0.0));
    }

    #[test]
    fn test_box_intersect_union() {
        let a = BoundingBox::new(Vector::new(0, 0, 0), Vector::new(10, 10, 10));
        let b = BoundingBox::new(Vector::new(5, 5, 5), Vector::new(10, 10, 10));
        let i = a.intersect(&b);
        assert_eq!(i, BoundingBox::new(Vector::new(5, 5, 5), Vector::new(5, 5, 5)));
        assert_eq!(a.union(&b), BoundingBox::new(Vector::new(0, 0, 0), Vector::new(15, 15, 15)));

        let far = BoundingBox::new(Vector::new(20, 0, 0), Vector::new(1, 1, 1));
        assert!(a.intersect(&far).is_empty());
        assert_eq!(a.intersect(&far).volume(), 0);
    }

    #[test]
    fn test_box_chunks_and_sections() {
        let b = BoundingBox::new(Vector::new(-1, 15, 0), Vector::new(18, 2, 16));
        assert_eq!(b.chunk_positions(), vec![(-1, 0), (0, 0), (1, 0)]);
        assert_eq!(b.section_ys(), 0..2);
        assert_eq!(b.chunk_count(), 3);

        let s = BoundingBox::section(-1, 2, 3);
        assert_eq!(s.origin, Vector::new(-16, 32, 48));
        assert_eq!(s.volume(), 4096);
        assert_eq!(s.chunk_positions(), vec![(-1, 3)]);
    }

    #[test]
    fn test_positions_order() {
        let b = BoundingBox::new(Vector::new(0, 0, 0), Vector::new(2, 2, 1));
        let p: Vec<_> = b.positions().collect();
        assert_eq!(p, vec![
            Vector::new(0, 0, 0), Vector::new(1, 0, 0),
            Vector::new(0, 1, 0), Vector::new(1, 1, 0),
        ]);
    }
}
