//! Shape functions and selection-mask generation.
//!
//! A shape function answers, for the centre of one cell given as an offset
//! from the brush centre, whether the cell is inside a brush of a given size.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::geometry::{BoundingBox, Vector};
use crate::mask::Mask;

pub trait ShapeFn {
    fn contains(&self, offset: Vector<f64>, size: Vector<i32>) -> bool;
}

impl<F: Fn(Vector<f64>, Vector<i32>) -> bool> ShapeFn for F {
    fn contains(&self, offset: Vector<f64>, size: Vector<i32>) -> bool {
        self(offset, size)
    }
}

/// Built-in brush shapes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Ellipsoid inscribed in the brush box, boundary inclusive.
    Sphere,
    /// Axis-aligned box, cells strictly inside the half extents.
    Box,
    /// The whole brush box without any test.
    Square,
    /// Octahedron inscribed in the brush box.
    Diamond,
    /// Elliptic cross-section in X/Z, full height in Y.
    Cylinder,
}

impl Shape {
    pub const ALL: [Shape; 5] = [Shape::Sphere, Shape::Box, Shape::Square, Shape::Diamond, Shape::Cylinder];

    pub fn name(&self) -> &'static str {
        match self {
            Shape::Sphere => "sphere",
            Shape::Box => "box",
            Shape::Square => "square",
            Shape::Diamond => "diamond",
            Shape::Cylinder => "cylinder",
        }
    }
}

impl ShapeFn for Shape {
    fn contains(&self, offset: Vector<f64>, size: Vector<i32>) -> bool {
        if size.x <= 0 || size.y <= 0 || size.z <= 0 {
            return false;
        }
        let half = size.as_f64().scale(0.5);
        match self {
            Shape::Sphere => {
                let n = offset.div_elem(half);
                n.length_squared() <= 1.0
            }
            Shape::Box => {
                let n = offset.div_elem(size.as_f64()).abs();
                n.x.max(n.y).max(n.z) < 0.5
            }
            Shape::Square => true,
            Shape::Diamond => {
                let n = offset.div_elem(half).abs();
                n.x + n.y + n.z <= 1.0
            }
            Shape::Cylinder => {
                let nx = offset.x / half.x;
                let nz = offset.z / half.z;
                let y = offset.y + half.y;
                nx * nx + nz * nz <= 1.0 && y >= 0.0 && y < size.y as f64
            }
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sphere" | "round" | "ovoid" => Ok(Shape::Sphere),
            "box" | "cube" => Ok(Shape::Box),
            "square" => Ok(Shape::Square),
            "diamond" | "octahedron" => Ok(Shape::Diamond),
            "cylinder" => Ok(Shape::Cylinder),
            other => Err(format!("unknown shape '{}'", other)),
        }
    }
}

/// Evaluate `shape` for a brush filling `brush_box` over the cells of
/// `requested`. The result has `requested.size` and the same Y, Z, X layout
/// as sections.
///
/// With `hollow` only cells touching an unselected face neighbour are kept.
/// With `chance` below 100 each of those shell cells survives with
/// probability `chance / 100`; interior cells are kept unless hollow.
pub fn create_selection_mask<R: Rng + ?Sized>(
    brush_box: &BoundingBox,
    shape: &dyn ShapeFn,
    requested: &BoundingBox,
    chance: f64,
    hollow: bool,
    rng: &mut R,
) -> Mask {
    if requested.is_empty() || brush_box.is_empty() {
        return Mask::new(requested.size);
    }
    let sparse = chance < 100.0;
    let padded = sparse || hollow;
    let region = if padded { requested.expand(1) } else { *requested };

    let center = brush_box.center();
    let size = brush_box.size;
    let origin = region.origin.as_f64();
    let raw = Mask::from_fn(region.size, |x, y, z| {
        let world = region.origin + Vector::new(x, y, z);
        if !brush_box.contains(world.x, world.y, world.z) {
            return false;
        }
        let cell = origin + Vector::new(x as f64 + 0.5, y as f64 + 0.5, z as f64 + 0.5);
        shape.contains(cell - center, size)
    });
    if !padded {
        return raw;
    }

    let shell = raw.shell();
    let mut mask = if hollow { shell.clone() } else { raw };
    if sparse {
        let p = (chance / 100.0).clamp(0.0, 1.0);
        for pos in shell.positions() {
            if !rng.gen_bool(p) {
                mask.set(pos.x, pos.y, pos.z, false);
            }
        }
    }
    mask.crop(Vector::new(1, 1, 1), requested.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn brush(origin: (i32, i32, i32), edge: i32) -> BoundingBox {
        BoundingBox::new(Vector::new(origin.0, origin.1, origin.2), Vector::new(edge, edge, edge))
    }

    fn mask(shape: Shape, b: &BoundingBox) -> Mask {
        create_selection_mask(b, &shape, b, 100.0, false, &mut StdRng::seed_from_u64(0))
    }

    #[test]
    fn test_square_selects_everything() {
        let b = brush((0, 0, 0), 5);
        assert_eq!(mask(Shape::Square, &b).count(), 125);
    }

    #[test]
    fn test_sphere_is_symmetric_and_inclusive() {
        let b = brush((95, 59, 95), 11);
        let m = mask(Shape::Sphere, &b);
        assert!(m.get(5, 5, 5));
        // axis extremes are selected
        assert!(m.get(0, 5, 5) && m.get(10, 5, 5));
        assert!(!m.get(0, 0, 0));
        for p in m.positions() {
            assert!(m.get(10 - p.x, 10 - p.y, 10 - p.z));
        }
    }

    #[test]
    fn test_diamond_and_cylinder() {
        let b = brush((0, 0, 0), 3);
        let diamond = mask(Shape::Diamond, &b);
        assert_eq!(diamond.count(), 7);
        let cylinder = mask(Shape::Cylinder, &b);
        // every layer has the same cross-section
        let layer: Vec<_> = (0..3).map(|y| (0..9).filter(|i| cylinder.get(i % 3, y, i / 3)).count()).collect();
        assert_eq!(layer[0], layer[1]);
        assert_eq!(layer[1], layer[2]);
    }

    #[test]
    fn test_box_shape_matches_brush() {
        let b = brush((-8, 0, -8), 4);
        assert_eq!(mask(Shape::Box, &b).count(), 64);
    }

    #[test]
    fn test_hollow_keeps_shell() {
        let b = brush((0, 0, 0), 5);
        let m = create_selection_mask(&b, &Shape::Square, &b, 100.0, true, &mut StdRng::seed_from_u64(1));
        assert_eq!(m.count(), 125 - 27);
        assert!(!m.get(2, 2, 2));
    }

    #[test]
    fn test_requested_box_is_a_window() {
        let b = brush((0, 0, 0), 11);
        let full = mask(Shape::Sphere, &b);
        let window = BoundingBox::new(Vector::new(2, 3, 4), Vector::new(4, 4, 4));
        let part = create_selection_mask(&b, &Shape::Sphere, &window, 100.0, false, &mut StdRng::seed_from_u64(0));
        assert_eq!(part, full.crop(Vector::new(2, 3, 4), Vector::new(4, 4, 4)));

        // hollow masks agree with the full mask at window edges
        let hollow_full = create_selection_mask(&b, &Shape::Sphere, &b, 100.0, true, &mut StdRng::seed_from_u64(0));
        let hollow_part = create_selection_mask(&b, &Shape::Sphere, &window, 100.0, true, &mut StdRng::seed_from_u64(0));
        assert_eq!(hollow_part, hollow_full.crop(Vector::new(2, 3, 4), Vector::new(4, 4, 4)));
    }

    #[test]
    fn test_chance_is_reproducible_and_keeps_interior() {
        let b = brush((0, 0, 0), 9);
        let a = create_selection_mask(&b, &Shape::Sphere, &b, 40.0, false, &mut StdRng::seed_from_u64(7));
        let again = create_selection_mask(&b, &Shape::Sphere, &b, 40.0, false, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, again);

        let solid = mask(Shape::Sphere, &b);
        let interior = {
            let mut m = solid.clone();
            m.and_not(&solid.shell());
            m
        };
        let mut kept = a.clone();
        kept.and(&interior);
        assert_eq!(kept, interior);
        assert!(a.count() < solid.count());
    }

    #[test]
    fn test_degenerate_box() {
        let b = BoundingBox::new(Vector::new(0, 0, 0), Vector::new(0, 4, 4));
        assert!(mask(Shape::Sphere, &b).is_empty());
        assert_eq!(mask(Shape::Sphere, &b).size(), Vector::new(0, 4, 4));
    }

    #[test]
    fn test_closure_shape() {
        let b = brush((0, 0, 0), 4);
        let lower_half = |offset: Vector<f64>, _size: Vector<i32>| offset.y < 0.0;
        let m = create_selection_mask(&b, &lower_half, &b, 100.0, false, &mut StdRng::seed_from_u64(0));
        assert_eq!(m.count(), 32);
        assert_eq!("Cube".parse::<Shape>().unwrap(), Shape::Box);
        assert!("blob".parse::<Shape>().is_err());
    }
}
