//! A 16-wide column of sections plus its per-column and per-entity data.

use std::collections::{BTreeMap, HashMap};

use crate::blocktypes::BlockTypeSet;
use crate::geometry::{BoundingBox, Vector};
use crate::section::{LightKind, MAX_LIGHT, SECTION_AREA, SECTION_EDGE, SECTION_SHIFT, Section, column_index};

/// Free-moving entity. Everything besides id and position is carried opaquely.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: String,
    pub position: Vector<f64>,
    pub tags: HashMap<String, fastnbt::Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, position: Vector<f64>) -> Self {
        Self { id: id.into(), position, tags: HashMap::new() }
    }

    pub fn translated(&self, offset: Vector<i32>) -> Self {
        Self { position: self.position + offset.as_f64(), ..self.clone() }
    }
}

/// Metadata bound to a single block position (chest contents, sign text...).
#[derive(Clone, Debug, PartialEq)]
pub struct TileEntity {
    pub id: String,
    pub position: Vector<i32>,
    pub tags: HashMap<String, fastnbt::Value>,
}

impl TileEntity {
    pub fn new(id: impl Into<String>, position: Vector<i32>) -> Self {
        Self { id: id.into(), position, tags: HashMap::new() }
    }

    pub fn translated(&self, offset: Vector<i32>) -> Self {
        Self { position: self.position + offset, ..self.clone() }
    }
}

pub struct Chunk {
    pub cx: i32,
    pub cz: i32,
    min_y: i32,
    sections: BTreeMap<i32, Section>,
    /// One biome id per column, indexed `z * 16 + x`.
    pub biomes: Vec<u8>,
    /// Lowest y at which the column is open to the sky, indexed `z * 16 + x`.
    height_map: Vec<i32>,
    pub entities: Vec<Entity>,
    pub tile_entities: Vec<TileEntity>,
    dirty: bool,
}

impl Chunk {
    /// An empty chunk. Every column starts open to the sky from `min_y` up.
    pub fn new(cx: i32, cz: i32, min_y: i32) -> Self {
        Self {
            cx,
            cz,
            min_y,
            sections: BTreeMap::new(),
            biomes: vec![0; SECTION_AREA],
            height_map: vec![min_y; SECTION_AREA],
            entities: Vec::new(),
            tile_entities: Vec::new(),
            dirty: false,
        }
    }

    pub(crate) fn from_parts(
        cx: i32,
        cz: i32,
        min_y: i32,
        sections: Vec<Section>,
        biomes: Vec<u8>,
        height_map: Vec<i32>,
        entities: Vec<Entity>,
        tile_entities: Vec<TileEntity>,
    ) -> Self {
        let mut chunk = Self::new(cx, cz, min_y);
        chunk.sections = sections.into_iter().map(|s| (s.y, s)).collect();
        if biomes.len() == SECTION_AREA {
            chunk.biomes = biomes;
        }
        if height_map.len() == SECTION_AREA {
            chunk.height_map = height_map;
        }
        chunk.entities = entities;
        chunk.tile_entities = tile_entities;
        chunk
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn bounds(&self, miny: i32, maxy: i32) -> BoundingBox {
        BoundingBox::new(
            Vector::new(self.cx << SECTION_SHIFT, miny, self.cz << SECTION_SHIFT),
            Vector::new(SECTION_EDGE as i32, maxy - miny, SECTION_EDGE as i32),
        )
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn section_ys(&self) -> impl Iterator<Item = i32> + '_ {
        self.sections.keys().copied()
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn section(&self, cy: i32) -> Option<&Section> {
        self.sections.get(&cy)
    }

    /// Mutable access to an allocated section. Marks the chunk dirty.
    pub fn section_mut(&mut self, cy: i32) -> Option<&mut Section> {
        let section = self.sections.get_mut(&cy)?;
        self.dirty = true;
        Some(section)
    }

    /// Allocate the section when missing. New sections are air with sky light
    /// matching the height map.
    pub fn get_or_create_section(&mut self, cy: i32) -> &mut Section {
        self.dirty = true;
        if !self.sections.contains_key(&cy) {
            let mut section = Section::new(cy);
            let base_y = cy << SECTION_SHIFT;
            for lz in 0..SECTION_EDGE {
                for lx in 0..SECTION_EDGE {
                    let height = self.height_map[column_index(lx, lz)];
                    for ly in 0..SECTION_EDGE {
                        if base_y + ly as i32 >= height {
                            section.set_light(LightKind::Sky, lx, ly, lz, MAX_LIGHT);
                        }
                    }
                }
            }
            self.sections.insert(cy, section);
        }
        self.sections.entry(cy).or_insert_with(|| Section::new(cy))
    }

    pub fn remove_section(&mut self, cy: i32) -> Option<Section> {
        let removed = self.sections.remove(&cy);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn biome(&self, lx: usize, lz: usize) -> u8 {
        self.biomes[column_index(lx, lz)]
    }

    pub fn set_biome(&mut self, lx: usize, lz: usize, biome: u8) {
        self.biomes[column_index(lx, lz)] = biome;
        self.dirty = true;
    }

    pub fn height(&self, lx: usize, lz: usize) -> i32 {
        self.height_map[column_index(lx, lz)]
    }

    pub fn height_map(&self) -> &[i32] {
        &self.height_map
    }

    /// Sky light of a cell in an unallocated section.
    pub fn implicit_sky_light(&self, lx: usize, y: i32, lz: usize) -> u8 {
        if y >= self.height(lx, lz) { MAX_LIGHT } else { 0 }
    }

    /// Block id at chunk-local x/z and world y; unallocated sections are air.
    pub fn block(&self, lx: usize, y: i32, lz: usize) -> u16 {
        self.section(y >> SECTION_SHIFT)
            .map(|s| s.block(lx, (y & 0xf) as usize, lz))
            .unwrap_or(0)
    }

    /// Scan the column from the top for the first block that stops sky light
    /// and store the height just above it. Returns (old, new).
    pub fn update_height(&mut self, lx: usize, lz: usize, blocktypes: &BlockTypeSet) -> (i32, i32) {
        let old = self.height(lx, lz);
        let mut new = self.min_y;
        'scan: for (cy, section) in self.sections.iter().rev() {
            for ly in (0..SECTION_EDGE).rev() {
                if blocktypes.opacity(section.block(lx, ly, lz)) > 0 {
                    new = (cy << SECTION_SHIFT) + ly as i32 + 1;
                    break 'scan;
                }
            }
        }
        let new = new.max(self.min_y);
        if new != old {
            self.height_map[column_index(lx, lz)] = new;
            self.dirty = true;
        }
        (old, new)
    }

    /// Height the column would have if nothing at or above `y` stopped sky
    /// light: just above the highest opaque block below `y`, or `min_y`.
    pub fn height_below(&self, lx: usize, y: i32, lz: usize, blocktypes: &BlockTypeSet) -> i32 {
        for (cy, section) in self.sections.range(..=(y >> SECTION_SHIFT)).rev() {
            let base = cy << SECTION_SHIFT;
            let top = (y - base).min(SECTION_EDGE as i32);
            for ly in (0..top).rev() {
                if blocktypes.opacity(section.block(lx, ly as usize, lz)) > 0 {
                    return base + ly + 1;
                }
            }
        }
        self.min_y
    }

    pub fn recompute_height_map(&mut self, blocktypes: &BlockTypeSet) {
        for lz in 0..SECTION_EDGE {
            for lx in 0..SECTION_EDGE {
                self.update_height(lx, lz, blocktypes);
            }
        }
    }

    /// Replace any tile entity at the same position.
    pub fn add_tile_entity(&mut self, tile_entity: TileEntity) {
        self.tile_entities.retain(|t| t.position != tile_entity.position);
        self.tile_entities.push(tile_entity);
        self.dirty = true;
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
        self.dirty = true;
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("cx", &self.cx)
            .field("cz", &self.cz)
            .field("sections", &self.sections.keys().collect::<Vec<_>>())
            .field("entities", &self.entities.len())
            .field("tile_entities", &self.tile_entities.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
