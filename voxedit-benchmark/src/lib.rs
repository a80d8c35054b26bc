use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct EditMetrics {
    // Storage Stats
    pub total_chunks_loaded: AtomicUsize,
    pub total_load_time_us: AtomicU64,
    pub total_chunks_saved: AtomicUsize,
    pub total_save_time_us: AtomicU64,
    pub total_chunks_failed: AtomicUsize,

    // Cache
    pub total_cache_hits: AtomicUsize,
    pub total_cache_misses: AtomicUsize,
    pub total_cache_evictions: AtomicUsize,

    // Fill
    pub total_sections_filled: AtomicUsize,
    pub total_sections_skipped: AtomicUsize,

    // Copy
    pub total_blocks_copied: AtomicUsize,
    pub total_entities_copied: AtomicUsize,
    pub total_tile_entities_copied: AtomicUsize,

    // Lighting
    pub total_relight_calls: AtomicUsize,
    pub total_cells_relit: AtomicUsize,
    pub total_relight_time_us: AtomicU64,
    pub max_relight_time_us: AtomicU64,

    // Session
    pub start_time: Option<Instant>,
    pub config_summary: String,
}

impl EditMetrics {
    pub fn new(config_summary: String) -> Self {
        Self {
            start_time: Some(Instant::now()),
            config_summary,
            ..Default::default()
        }
    }

    pub fn record_load(&self, duration: Duration) {
        self.total_chunks_loaded.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_save(&self, duration: Duration) {
        self.total_chunks_saved.fetch_add(1, Ordering::Relaxed);
        self.total_save_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_chunk_failure(&self) {
        self.total_chunks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.total_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.total_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_eviction(&self) {
        self.total_cache_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_section_filled(&self) {
        self.total_sections_filled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_section_skipped(&self) {
        self.total_sections_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocks_copied(&self, count: usize) {
        self.total_blocks_copied.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_entities_copied(&self, entities: usize, tile_entities: usize) {
        self.total_entities_copied.fetch_add(entities, Ordering::Relaxed);
        self.total_tile_entities_copied.fetch_add(tile_entities, Ordering::Relaxed);
    }

    pub fn record_relight(&self, duration: Duration, cells: usize) {
        self.total_relight_calls.fetch_add(1, Ordering::Relaxed);
        self.total_cells_relit.fetch_add(cells, Ordering::Relaxed);
        let us = duration.as_micros() as u64;
        self.total_relight_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_relight_time_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.total_cache_hits.load(Ordering::Relaxed);
        let misses = self.total_cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total > 0 { (hits as f64 / total as f64) * 100.0 } else { 0.0 }
    }

    pub fn generate_report(&self) -> String {
        let uptime = self.start_time.unwrap_or_else(Instant::now).elapsed();

        let loaded = self.total_chunks_loaded.load(Ordering::Relaxed);
        let load_time = self.total_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let load_avg = if loaded > 0 { load_time / loaded as f64 } else { 0.0 };

        let saved = self.total_chunks_saved.load(Ordering::Relaxed);
        let save_time = self.total_save_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let save_avg = if saved > 0 { save_time / saved as f64 } else { 0.0 };
        let failed = self.total_chunks_failed.load(Ordering::Relaxed);

        let hits = self.total_cache_hits.load(Ordering::Relaxed);
        let misses = self.total_cache_misses.load(Ordering::Relaxed);
        let evictions = self.total_cache_evictions.load(Ordering::Relaxed);

        let filled = self.total_sections_filled.load(Ordering::Relaxed);
        let skipped = self.total_sections_skipped.load(Ordering::Relaxed);

        let copied = self.total_blocks_copied.load(Ordering::Relaxed);
        let entities = self.total_entities_copied.load(Ordering::Relaxed);
        let tile_entities = self.total_tile_entities_copied.load(Ordering::Relaxed);

        let relights = self.total_relight_calls.load(Ordering::Relaxed);
        let relit = self.total_cells_relit.load(Ordering::Relaxed);
        let relight_time = self.total_relight_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let relight_max = self.max_relight_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let relight_avg = if relights > 0 { relight_time / relights as f64 } else { 0.0 };

        format!(
            "VoxEdit Session Report\n\
             ======================\n\
             Configuration: {}\n\
             Session Duration: {:.2?}\n\n\
             [Storage Read]\n\
             Chunks Loaded: {}\n\
             Avg Time: {:.2} ms/chunk\n\n\
             [Storage Write]\n\
             Chunks Saved: {}\n\
             Avg Time: {:.2} ms/chunk\n\
             Failed Chunks: {}\n\n\
             [Cache]\n\
             Hits: {}\n\
             Misses: {}\n\
             Evictions: {}\n\
             Hit Rate: {:.1}%\n\n\
             [Fill]\n\
             Sections Filled: {}\n\
             Sections Skipped: {}\n\n\
             [Copy]\n\
             Blocks Copied: {}\n\
             Entities Copied: {}\n\
             Tile Entities Copied: {}\n\n\
             [Lighting]\n\
             Relight Passes: {}\n\
             Cells Relit: {}\n\
             Avg Time: {:.2} ms/pass\n\
             Max Time: {:.2} ms\n",
            self.config_summary,
            uptime,
            loaded, load_avg,
            saved, save_avg, failed,
            hits, misses, evictions, self.cache_hit_rate(),
            filled, skipped,
            copied, entities, tile_entities,
            relights, relit, relight_avg, relight_max
        )
    }
}
