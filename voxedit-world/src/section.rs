//! 16x16x16 section storage and the world <-> section coordinate split.

use crate::geometry::Vector;

pub const SECTION_EDGE: usize = 16;
pub const SECTION_SHIFT: i32 = 4;
pub const SECTION_MASK: i32 = 0xf;
pub const SECTION_AREA: usize = SECTION_EDGE * SECTION_EDGE;
pub const SECTION_VOLUME: usize = SECTION_AREA * SECTION_EDGE;

pub const MAX_LIGHT: u8 = 15;

/// Which of the two light arrays an operation works on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LightKind {
    Block,
    Sky,
}

impl LightKind {
    pub const ALL: [LightKind; 2] = [LightKind::Block, LightKind::Sky];
}

/// Index into a section array. Arrays are laid out Y outermost, then Z, then X.
#[inline]
pub fn section_index(x: usize, y: usize, z: usize) -> usize {
    assert!(
        x < SECTION_EDGE && y < SECTION_EDGE && z < SECTION_EDGE,
        "local coordinate ({}, {}, {}) outside section",
        x, y, z
    );
    (y << 8) | (z << 4) | x
}

/// Index into a 16x16 column array (biomes, height map).
#[inline]
pub fn column_index(x: usize, z: usize) -> usize {
    assert!(x < SECTION_EDGE && z < SECTION_EDGE, "local column ({}, {}) outside chunk", x, z);
    (z << 4) | x
}

/// Section coordinates and section-local coordinates of a world block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SectionCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
    pub lx: usize,
    pub ly: usize,
    pub lz: usize,
}

impl SectionCoord {
    pub fn of(x: i32, y: i32, z: i32) -> Self {
        Self {
            cx: x >> SECTION_SHIFT,
            cy: y >> SECTION_SHIFT,
            cz: z >> SECTION_SHIFT,
            lx: (x & SECTION_MASK) as usize,
            ly: (y & SECTION_MASK) as usize,
            lz: (z & SECTION_MASK) as usize,
        }
    }

    pub fn world(&self) -> Vector<i32> {
        Vector::new(
            (self.cx << SECTION_SHIFT) | self.lx as i32,
            (self.cy << SECTION_SHIFT) | self.ly as i32,
            (self.cz << SECTION_SHIFT) | self.lz as i32,
        )
    }

    pub fn index(&self) -> usize {
        section_index(self.lx, self.ly, self.lz)
    }
}

impl From<Vector<i32>> for SectionCoord {
    fn from(p: Vector<i32>) -> Self {
        SectionCoord::of(p.x, p.y, p.z)
    }
}

/// One vertical slice of a chunk.
///
/// Light arrays hold one value (0..=15) per byte; packing into nibbles only
/// happens in the chunk codec.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub y: i32,
    pub blocks: Vec<u16>,
    pub data: Vec<u8>,
    pub block_light: Vec<u8>,
    pub sky_light: Vec<u8>,
}

impl Section {
    /// All air, no light.
    pub fn new(y: i32) -> Self {
        Self {
            y,
            blocks: vec![0; SECTION_VOLUME],
            data: vec![0; SECTION_VOLUME],
            block_light: vec![0; SECTION_VOLUME],
            sky_light: vec![0; SECTION_VOLUME],
        }
    }

    pub fn from_arrays(y: i32, blocks: Vec<u16>, data: Vec<u8>, block_light: Vec<u8>, sky_light: Vec<u8>) -> Self {
        assert_eq!(blocks.len(), SECTION_VOLUME, "Blocks array has wrong length");
        assert_eq!(data.len(), SECTION_VOLUME, "Data array has wrong length");
        assert_eq!(block_light.len(), SECTION_VOLUME, "BlockLight array has wrong length");
        assert_eq!(sky_light.len(), SECTION_VOLUME, "SkyLight array has wrong length");
        Self { y, blocks, data, block_light, sky_light }
    }

    #[inline]
    pub fn block(&self, x: usize, y: usize, z: usize) -> u16 {
        self.blocks[section_index(x, y, z)]
    }

    #[inline]
    pub fn block_data(&self, x: usize, y: usize, z: usize) -> u8 {
        self.data[section_index(x, y, z)]
    }

    pub fn set_block(&mut self, x: usize, y: usize, z: usize, id: u16, meta: u8) {
        let i = section_index(x, y, z);
        self.blocks[i] = id;
        self.data[i] = meta;
    }

    pub fn light_array(&self, kind: LightKind) -> &[u8] {
        match kind {
            LightKind::Block => &self.block_light,
            LightKind::Sky => &self.sky_light,
        }
    }

    pub fn light_array_mut(&mut self, kind: LightKind) -> &mut [u8] {
        match kind {
            LightKind::Block => &mut self.block_light,
            LightKind::Sky => &mut self.sky_light,
        }
    }

    #[inline]
    pub fn light(&self, kind: LightKind, x: usize, y: usize, z: usize) -> u8 {
        self.light_array(kind)[section_index(x, y, z)]
    }

    pub fn set_light(&mut self, kind: LightKind, x: usize, y: usize, z: usize, value: u8) {
        debug_assert!(value <= MAX_LIGHT);
        self.light_array_mut(kind)[section_index(x, y, z)] = value;
    }

    /// True when every cell is air.
    pub fn is_air(&self) -> bool {
        self.blocks.iter().all(|&b| b == 0)
    }
}

/// Pack one-value-per-byte arrays into nibbles, low nibble first.
pub fn pack_nibbles(values: &[u8]) -> Vec<i8> {
    values
        .chunks(2)
        .map(|pair| {
            let lo = pair[0] & 0xf;
            let hi = pair.get(1).copied().unwrap_or(0) & 0xf;
            (lo | (hi << 4)) as i8
        })
        .collect()
}

pub fn unpack_nibbles(packed: &[i8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for &b in packed {
        let b = b as u8;
        out.push(b & 0xf);
        out.push(b >> 4);
    }
    out.resize(len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_round_trip() {
        let samples = [
            (0, 0, 0),
            (15, 15, 15),
            (16, 16, 16),
            (-1, -1, -1),
            (-16, 255, 17),
            (i32::MAX, 100, i32::MIN),
            (i32::MIN, -64, i32::MAX),
            (123_456, 77, -987_654),
        ];
        for (x, y, z) in samples {
            let c = SectionCoord::of(x, y, z);
            assert!(c.lx < 16 && c.ly < 16 && c.lz < 16);
            assert_eq!(c.world(), Vector::new(x, y, z), "round trip of ({}, {}, {})", x, y, z);
        }
    }

    #[test]
    fn test_decompose_negative() {
        let c = SectionCoord::of(-1, -17, 31);
        assert_eq!((c.cx, c.cy, c.cz), (-1, -2, 1));
        assert_eq!((c.lx, c.ly, c.lz), (15, 15, 15));
    }

    #[test]
    fn test_index_layout() {
        assert_eq!(section_index(0, 0, 0), 0);
        assert_eq!(section_index(1, 0, 0), 1);
        assert_eq!(section_index(0, 0, 1), 16);
        assert_eq!(section_index(0, 1, 0), 256);
        assert_eq!(section_index(15, 15, 15), 4095);
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range_panics() {
        section_index(16, 0, 0);
    }

    #[test]
    fn test_section_get_set() {
        let mut s = Section::new(3);
        assert!(s.is_air());
        s.set_block(1, 2, 3, 300, 7);
        s.set_light(LightKind::Sky, 1, 2, 3, 12);
        assert_eq!(s.block(1, 2, 3), 300);
        assert_eq!(s.block_data(1, 2, 3), 7);
        assert_eq!(s.light(LightKind::Sky, 1, 2, 3), 12);
        assert_eq!(s.light(LightKind::Block, 1, 2, 3), 0);
        assert!(!s.is_air());
    }

    #[test]
    fn test_nibbles() {
        let values: Vec<u8> = (0..SECTION_VOLUME).map(|i| (i % 16) as u8).collect();
        let packed = pack_nibbles(&values);
        assert_eq!(packed.len(), SECTION_VOLUME / 2);
        assert_eq!(packed[0] as u8, 0x10);
        assert_eq!(unpack_nibbles(&packed, SECTION_VOLUME), values);
    }
}
