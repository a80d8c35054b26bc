//! A named world space: chunk cache, block palette and vertical bounds.

use std::num::NonZeroUsize;
use std::sync::Arc;

use voxedit_benchmark::EditMetrics;
use voxedit_storage::{ChunkStorage, MemoryStorage};

use crate::blocktypes::{AIR_ID, BlockTypeSet};
use crate::cache::ChunkCache;
use crate::chunk::Chunk;
use crate::error::{Result, WorldError};
use crate::geometry::{BoundingBox, Vector};
use crate::section::{LightKind, MAX_LIGHT, SECTION_EDGE, SECTION_SHIFT, Section, SectionCoord};

/// Chunks beyond this distance from the origin are outside every dimension.
pub const DEFAULT_HORIZONTAL_LIMIT: i32 = 1_875_000;

#[derive(Clone, Debug)]
pub struct DimensionConfig {
    pub name: String,
    pub min_y: i32,
    /// Exclusive.
    pub max_y: i32,
    /// Chunk coordinates must lie in `-limit..limit`.
    pub horizontal_limit: i32,
    pub cache_capacity: usize,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            name: "overworld".to_string(),
            min_y: 0,
            max_y: 256,
            horizontal_limit: DEFAULT_HORIZONTAL_LIMIT,
            cache_capacity: 256,
        }
    }
}

impl DimensionConfig {
    pub fn bounds(&self) -> BoundingBox {
        let edge = self.horizontal_limit << SECTION_SHIFT;
        BoundingBox::from_min_max(Vector::new(-edge, self.min_y, -edge), Vector::new(edge, self.max_y, edge))
    }
}

/// Everything a cell contributes to lighting, read in one lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellState {
    pub block: u16,
    pub data: u8,
    pub block_light: u8,
    pub sky_light: u8,
    /// Height map value of the cell's column.
    pub height: i32,
}

impl CellState {
    pub fn light(&self, kind: LightKind) -> u8 {
        match kind {
            LightKind::Block => self.block_light,
            LightKind::Sky => self.sky_light,
        }
    }
}

pub struct Dimension {
    name: String,
    bounds: BoundingBox,
    blocktypes: Arc<BlockTypeSet>,
    cache: ChunkCache,
    storage: Arc<dyn ChunkStorage>,
    metrics: Arc<EditMetrics>,
}

impl Dimension {
    pub fn new(
        config: DimensionConfig,
        blocktypes: Arc<BlockTypeSet>,
        storage: Arc<dyn ChunkStorage>,
        metrics: Arc<EditMetrics>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let cache = ChunkCache::new(storage.clone(), capacity, config.min_y, metrics.clone());
        log::debug!(
            "Dimension {} spans y {}..{} with a cache of {} chunks",
            config.name, config.min_y, config.max_y, capacity
        );
        Self { name: config.name.clone(), bounds: config.bounds(), blocktypes, cache, storage, metrics }
    }

    /// A dimension with default bounds kept entirely in memory.
    pub fn memory(blocktypes: Arc<BlockTypeSet>) -> Self {
        Self::with_config(DimensionConfig::default(), blocktypes)
    }

    pub fn with_config(config: DimensionConfig, blocktypes: Arc<BlockTypeSet>) -> Self {
        let summary = format!("{} (memory)", config.name);
        Self::new(config, blocktypes, Arc::new(MemoryStorage::new()), Arc::new(EditMetrics::new(summary)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn blocktypes(&self) -> &BlockTypeSet {
        &self.blocktypes
    }

    pub fn blocktypes_arc(&self) -> Arc<BlockTypeSet> {
        self.blocktypes.clone()
    }

    pub fn metrics(&self) -> &Arc<EditMetrics> {
        &self.metrics
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn chunk_in_bounds(&self, cx: i32, cz: i32) -> bool {
        let x = cx << SECTION_SHIFT;
        let z = cz << SECTION_SHIFT;
        x >= self.bounds.minx() && x < self.bounds.maxx() && z >= self.bounds.minz() && z < self.bounds.maxz()
    }

    /// Whether the cell can hold blocks at all.
    pub fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        self.bounds.contains(x, y, z)
    }

    pub fn contains_chunk(&self, cx: i32, cz: i32) -> Result<bool> {
        if !self.chunk_in_bounds(cx, cz) {
            return Ok(false);
        }
        if self.cache.is_loaded(cx, cz) {
            return Ok(true);
        }
        self.storage.contains_chunk(cx, cz).map_err(WorldError::Storage)
    }

    /// The chunk, or `ChunkNotPresent` when it does not exist and `create` is
    /// false. Chunks outside the horizontal bounds are never created.
    pub fn get_chunk(&mut self, cx: i32, cz: i32, create: bool) -> Result<&mut Chunk> {
        if !self.chunk_in_bounds(cx, cz) {
            return Err(WorldError::ChunkNotPresent { cx, cz });
        }
        if create {
            return self.cache.get_or_create(cx, cz);
        }
        self.cache.get(cx, cz)?.ok_or(WorldError::ChunkNotPresent { cx, cz })
    }

    /// Read path variant of [`get_chunk`](Self::get_chunk): absent chunks are `None`.
    pub fn try_chunk(&mut self, cx: i32, cz: i32) -> Result<Option<&mut Chunk>> {
        if !self.chunk_in_bounds(cx, cz) {
            return Ok(None);
        }
        self.cache.get(cx, cz)
    }

    pub fn create_chunk(&mut self, cx: i32, cz: i32) -> Result<&mut Chunk> {
        self.get_chunk(cx, cz, true)
    }

    pub fn delete_chunk(&mut self, cx: i32, cz: i32) -> Result<()> {
        self.cache.discard(cx, cz);
        self.storage.delete_chunk(cx, cz).map_err(WorldError::Storage)
    }

    /// Every chunk in storage or in the cache, sorted.
    pub fn chunk_positions(&self) -> Result<Vec<(i32, i32)>> {
        let mut positions = self.storage.list_chunks().map_err(WorldError::Storage)?;
        positions.extend(self.cache.loaded_positions());
        positions.sort_unstable();
        positions.dedup();
        Ok(positions)
    }

    pub fn get_section(&mut self, cx: i32, cy: i32, cz: i32) -> Result<Option<&Section>> {
        Ok(self.try_chunk(cx, cz)?.and_then(|chunk| chunk.section(cy)))
    }

    /// Mutable section access. With `create`, the chunk and the section are
    /// allocated when missing; otherwise absence is `None`.
    pub fn get_section_mut(&mut self, cx: i32, cy: i32, cz: i32, create: bool) -> Result<Option<&mut Section>> {
        if create {
            let chunk = self.get_chunk(cx, cz, true)?;
            return Ok(Some(chunk.get_or_create_section(cy)));
        }
        Ok(self.try_chunk(cx, cz)?.and_then(|chunk| chunk.section_mut(cy)))
    }

    /// Write back every dirty chunk.
    pub fn flush(&mut self) -> Result<usize> {
        let written = self.cache.flush()?;
        log::info!("Dimension {}: flushed {} chunks", self.name, written);
        Ok(written)
    }

    /// Block, data and light at a cell. `None` when the cell is out of bounds
    /// or its chunk does not exist. Unallocated sections read as air with
    /// implicit light.
    pub fn cell(&mut self, x: i32, y: i32, z: i32) -> Result<Option<CellState>> {
        if !self.in_bounds(x, y, z) {
            return Ok(None);
        }
        let c = SectionCoord::of(x, y, z);
        let Some(chunk) = self.try_chunk(c.cx, c.cz)? else {
            return Ok(None);
        };
        let height = chunk.height(c.lx, c.lz);
        let state = match chunk.section(c.cy) {
            Some(section) => {
                let i = c.index();
                CellState {
                    block: section.blocks[i],
                    data: section.data[i],
                    block_light: section.block_light[i],
                    sky_light: section.sky_light[i],
                    height,
                }
            }
            None => CellState {
                block: AIR_ID,
                data: 0,
                block_light: 0,
                sky_light: chunk.implicit_sky_light(c.lx, y, c.lz),
                height,
            },
        };
        Ok(Some(state))
    }

    pub fn block_at(&mut self, x: i32, y: i32, z: i32) -> Result<(u16, u8)> {
        Ok(self.cell(x, y, z)?.map(|s| (s.block, s.data)).unwrap_or((AIR_ID, 0)))
    }

    pub fn light_at(&mut self, kind: LightKind, x: i32, y: i32, z: i32) -> Result<Option<u8>> {
        Ok(self.cell(x, y, z)?.map(|s| s.light(kind)))
    }

    /// Set one block without relighting. Air written into an unallocated
    /// section allocates nothing.
    pub fn set_block_at(&mut self, x: i32, y: i32, z: i32, id: u16, meta: u8, create: bool) -> Result<()> {
        if !self.in_bounds(x, y, z) {
            return Ok(());
        }
        let c = SectionCoord::of(x, y, z);
        let chunk = match self.get_chunk(c.cx, c.cz, create) {
            Ok(chunk) => chunk,
            Err(e) if e.is_chunk_not_present() => return Ok(()),
            Err(e) => return Err(e),
        };
        if id == AIR_ID && chunk.section(c.cy).is_none() {
            return Ok(());
        }
        chunk.get_or_create_section(c.cy).set_block(c.lx, c.ly, c.lz, id, meta);
        Ok(())
    }

    /// Set a light value. Chunks are never created; a section is only
    /// allocated when the value differs from its implicit one.
    pub fn set_light_at(&mut self, kind: LightKind, x: i32, y: i32, z: i32, value: u8) -> Result<()> {
        if !self.in_bounds(x, y, z) {
            return Ok(());
        }
        let c = SectionCoord::of(x, y, z);
        let Some(chunk) = self.try_chunk(c.cx, c.cz)? else {
            return Ok(());
        };
        if chunk.section(c.cy).is_none() {
            let implicit = match kind {
                LightKind::Block => 0,
                LightKind::Sky => chunk.implicit_sky_light(c.lx, y, c.lz),
            };
            if value == implicit {
                return Ok(());
            }
        }
        chunk.get_or_create_section(c.cy).set_light(kind, c.lx, c.ly, c.lz, value.min(MAX_LIGHT));
        Ok(())
    }

    /// Recompute the height map of the column containing (x, z).
    /// Returns (old, new) or `None` when the chunk is absent.
    pub fn update_height(&mut self, x: i32, z: i32) -> Result<Option<(i32, i32)>> {
        let blocktypes = self.blocktypes.clone();
        let cx = x >> SECTION_SHIFT;
        let cz = z >> SECTION_SHIFT;
        let lx = (x as usize) & (SECTION_EDGE - 1);
        let lz = (z as usize) & (SECTION_EDGE - 1);
        Ok(self.try_chunk(cx, cz)?.map(|chunk| chunk.update_height(lx, lz, &blocktypes)))
    }

    /// Refresh the height map of every column in `columns`. Returns how many
    /// columns changed height.
    pub fn update_heights(&mut self, columns: impl IntoIterator<Item = (i32, i32)>) -> Result<usize> {
        let mut columns: Vec<(i32, i32)> = columns.into_iter().collect();
        columns.sort_unstable();
        columns.dedup();
        let mut changed = 0;
        for (x, z) in columns {
            if let Some((old, new)) = self.update_height(x, z)? {
                changed += usize::from(old != new);
            }
        }
        Ok(changed)
    }

    /// See [`Chunk::height_below`]. `None` when the chunk is absent.
    pub fn height_below(&mut self, x: i32, y: i32, z: i32) -> Result<Option<i32>> {
        let blocktypes = self.blocktypes.clone();
        let c = SectionCoord::of(x, y, z);
        Ok(self.try_chunk(c.cx, c.cz)?.map(|chunk| chunk.height_below(c.lx, y, c.lz, &blocktypes)))
    }

    pub fn biome_at(&mut self, x: i32, z: i32) -> Result<Option<u8>> {
        let cx = x >> SECTION_SHIFT;
        let cz = z >> SECTION_SHIFT;
        let lx = (x as usize) & (SECTION_EDGE - 1);
        let lz = (z as usize) & (SECTION_EDGE - 1);
        Ok(self.try_chunk(cx, cz)?.map(|chunk| chunk.biome(lx, lz)))
    }
}

impl std::fmt::Debug for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dimension")
            .field("name", &self.name)
            .field("bounds", &self.bounds)
            .field("blocktypes", &self.blocktypes)
            .field("loaded_chunks", &self.cache.len())
            .finish()
    }
}
