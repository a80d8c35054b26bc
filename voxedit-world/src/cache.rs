//! Bounded write-back cache of decoded chunks.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use rayon::prelude::*;
use voxedit_benchmark::EditMetrics;
use voxedit_storage::ChunkStorage;

use crate::chunk::Chunk;
use crate::error::{Result, WorldError};
use crate::nbt;

/// Loaded chunks keyed by (cx, cz). Dirty chunks are encoded and written to
/// storage when evicted or flushed, never dropped.
pub struct ChunkCache {
    chunks: LruCache<(i32, i32), Chunk>,
    storage: Arc<dyn ChunkStorage>,
    metrics: Arc<EditMetrics>,
    min_y: i32,
}

impl ChunkCache {
    pub fn new(storage: Arc<dyn ChunkStorage>, capacity: NonZeroUsize, min_y: i32, metrics: Arc<EditMetrics>) -> Self {
        Self { chunks: LruCache::new(capacity), storage, metrics, min_y }
    }

    pub fn capacity(&self) -> usize {
        self.chunks.cap().get()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn is_loaded(&self, cx: i32, cz: i32) -> bool {
        self.chunks.contains(&(cx, cz))
    }

    pub fn loaded_positions(&self) -> Vec<(i32, i32)> {
        self.chunks.iter().map(|(k, _)| *k).collect()
    }

    pub fn dirty_count(&self) -> usize {
        self.chunks.iter().filter(|(_, c)| c.is_dirty()).count()
    }

    /// The chunk, loading it from storage on a miss. `None` when storage has
    /// no such chunk.
    pub fn get(&mut self, cx: i32, cz: i32) -> Result<Option<&mut Chunk>> {
        let key = (cx, cz);
        if self.chunks.contains(&key) {
            self.metrics.record_cache_hit();
        } else {
            self.metrics.record_cache_miss();
            match self.load(cx, cz)? {
                Some(chunk) => self.insert(chunk)?,
                None => return Ok(None),
            }
        }
        Ok(self.chunks.get_mut(&key))
    }

    /// Like [`get`](Self::get) but allocates an empty dirty chunk when storage
    /// has none.
    pub fn get_or_create(&mut self, cx: i32, cz: i32) -> Result<&mut Chunk> {
        let key = (cx, cz);
        if self.get(cx, cz)?.is_none() {
            let mut chunk = Chunk::new(cx, cz, self.min_y);
            chunk.mark_dirty();
            self.insert(chunk)?;
        }
        self.chunks.get_mut(&key).ok_or(WorldError::ChunkNotPresent { cx, cz })
    }

    /// Put a chunk in the cache, evicting (and writing back) the least
    /// recently used one when full.
    pub fn insert(&mut self, chunk: Chunk) -> Result<()> {
        let key = (chunk.cx, chunk.cz);
        if !self.chunks.contains(&key) && self.chunks.len() >= self.capacity() {
            if let Some((old_key, old)) = self.chunks.pop_lru() {
                self.metrics.record_cache_eviction();
                if old.is_dirty() {
                    if let Err(e) = self.write_back(&old) {
                        log::error!("Failed to write back chunk ({}, {}) on eviction: {}", old_key.0, old_key.1, e);
                        self.chunks.push(old_key, old);
                        return Err(e);
                    }
                }
                log::debug!("Evicted chunk ({}, {})", old_key.0, old_key.1);
            }
        }
        self.chunks.put(key, chunk);
        Ok(())
    }

    /// Drop a chunk from the cache without writing it back.
    pub fn discard(&mut self, cx: i32, cz: i32) -> Option<Chunk> {
        self.chunks.pop(&(cx, cz))
    }

    /// Write every dirty chunk back to storage. Encoding runs in parallel.
    /// Returns the number of chunks written.
    pub fn flush(&mut self) -> Result<usize> {
        let storage = &self.storage;
        let metrics = &self.metrics;
        let mut dirty: Vec<&mut Chunk> = self.chunks.iter_mut().map(|(_, c)| c).filter(|c| c.is_dirty()).collect();
        if dirty.is_empty() {
            return Ok(0);
        }

        let results: Vec<Result<()>> = dirty
            .par_iter_mut()
            .map(|chunk| {
                write_chunk(storage.as_ref(), metrics, chunk)?;
                chunk.mark_clean();
                Ok(())
            })
            .collect();

        let written = results.iter().filter(|r| r.is_ok()).count();
        log::debug!("Flushed {} of {} dirty chunks", written, results.len());
        match results.into_iter().find_map(|r| r.err()) {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    fn load(&self, cx: i32, cz: i32) -> Result<Option<Chunk>> {
        let start = Instant::now();
        let Some(bytes) = self.storage.read_chunk(cx, cz).map_err(WorldError::Storage)? else {
            return Ok(None);
        };
        let mut chunk = nbt::decode_chunk(&bytes, self.min_y).map_err(|source| WorldError::Codec { cx, cz, source })?;
        if (chunk.cx, chunk.cz) != (cx, cz) {
            log::warn!(
                "Chunk stored at ({}, {}) claims position ({}, {})",
                cx, cz, chunk.cx, chunk.cz
            );
            chunk.cx = cx;
            chunk.cz = cz;
        }
        self.metrics.record_load(start.elapsed());
        Ok(Some(chunk))
    }

    fn write_back(&self, chunk: &Chunk) -> Result<()> {
        write_chunk(self.storage.as_ref(), &self.metrics, chunk)
    }
}

fn write_chunk(storage: &dyn ChunkStorage, metrics: &EditMetrics, chunk: &Chunk) -> Result<()> {
    let start = Instant::now();
    let bytes = nbt::encode_chunk(chunk).map_err(|source| WorldError::Codec { cx: chunk.cx, cz: chunk.cz, source })?;
    storage.write_chunk(chunk.cx, chunk.cz, &bytes).map_err(WorldError::Storage)?;
    metrics.record_save(start.elapsed());
    Ok(())
}
